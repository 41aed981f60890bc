//! The ingestd daemon.

mod app;
mod bootstrap;
mod config;
#[cfg(test)]
mod config_test;
mod containers;
#[cfg(test)]
mod containers_test;
mod error;
mod pipeline;
mod storage;
mod topics;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::prelude::*;

use crate::app::App;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Setup tracing/logging system.
    tracing_subscriber::registry()
        // Filter spans based on the RUST_LOG env var.
        .with(tracing_subscriber::EnvFilter::from_default_env())
        // Send a copy of all spans to stdout in compact form.
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
        )
        // Install this registry as the global tracing registry.
        .try_init()
        .context("error initializing logging/tracing system")?;

    let cfg = Arc::new(Config::new()?);
    tracing::info!(
        kafka_broker = %cfg.kafka_broker,
        group_id = %cfg.group_id,
        mongo_db_name = %cfg.mongo_db_name,
        topics = ?cfg.topics,
        "starting ingestd",
    );
    let res = App::new(cfg).await?.spawn().await.context("error joining app task")?;

    // Ensure any pending output is flushed.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    res
}
