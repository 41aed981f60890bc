//! A fire-and-forget publisher of fixed sample records.
//!
//! Not a retry-aware or backpressure-aware producer; it exists only to put test records on
//! the stream.

use std::time::Duration;

use anyhow::{Context, Result};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing_subscriber::prelude::*;

/// The fixed sample records to publish, as `(topic, value)` pairs.
const SAMPLES: [(&str, &str); 4] = [
    ("payments", "Payment message 1"),
    ("payments", "Payment message 2"),
    ("sales", "Sale message 1"),
    ("sales", "Sale message 2"),
];

/// Timeout applied to each send while the delivery is in flight.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("error initializing logging/tracing system")?;

    let broker = std::env::var("KAFKA_BROKER").unwrap_or_else(|_| "localhost:29092".into());
    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &broker)
        .create()
        .context("error building broker producer")?;

    for (topic, value) in SAMPLES {
        producer
            .send(FutureRecord::<(), str>::to(topic).payload(value), SEND_TIMEOUT)
            .await
            .map_err(|(err, _msg)| err)
            .with_context(|| format!("error publishing sample record to {}", topic))?;
        tracing::info!(%topic, value, "sample record published");
    }

    tracing::info!(%broker, "all sample records published");
    Ok(())
}
