use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::StreamExt;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, SignalStream};
use tokio_stream::StreamMap;

use crate::bootstrap::Bootstrap;
use crate::config::Config;
use crate::pipeline::IngestCtl;
use crate::storage::Storage;

/// The application object for when ingestd is running as a daemon.
pub struct App {
    /// The application's runtime config.
    _config: Arc<Config>,
    /// The application's document store handle.
    _storage: Storage,

    /// A channel used for triggering graceful shutdown.
    shutdown_tx: broadcast::Sender<()>,
    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,

    /// The join handle of the ingestion pipeline.
    pipeline_handle: JoinHandle<Result<()>>,
}

impl App {
    /// Create a new instance.
    ///
    /// This drives the full bootstrap sequence before the pipeline takes over: container
    /// startup is best-effort, while topic provisioning and the storage and consumer group
    /// connections are all fatal on failure.
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        Bootstrap::new(config.clone()).run().await?;

        let storage = Storage::connect(&config.mongodb_uri, &config.mongo_db_name)
            .await
            .context("error connecting to document store")?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let pipeline = IngestCtl::new(config.clone(), Arc::new(storage.clone()), shutdown_tx.subscribe())
            .await
            .context("error setting up ingestion pipeline")?;
        let pipeline_handle = pipeline.spawn();

        Ok(Self {
            _config: config,
            _storage: storage,
            shutdown_rx: BroadcastStream::new(shutdown_tx.subscribe()),
            shutdown_tx,
            pipeline_handle,
        })
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        let mut signals = StreamMap::new();
        signals.insert("sigterm", SignalStream::new(signal(SignalKind::terminate()).context("error building signal stream")?));
        signals.insert("sigint", SignalStream::new(signal(SignalKind::interrupt()).context("error building signal stream")?));

        loop {
            tokio::select! {
                Some((_, sig)) = signals.next() => {
                    tracing::debug!(signal = ?sig, "signal received, beginning graceful shutdown");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = self.shutdown_rx.next() => break,
            }
        }

        // Begin shutdown routine.
        tracing::debug!("ingestd is shutting down");
        if let Err(err) = self.pipeline_handle.await.context("error joining ingestion pipeline handle").and_then(|res| res) {
            tracing::error!(error = ?err, "error shutting down ingestion pipeline");
        }

        tracing::debug!("ingestd shutdown complete");
        Ok(())
    }
}
