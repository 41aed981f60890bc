//! Ingestion pipeline.
//!
//! Consumes the configured topic set as a consumer group and persists every delivered record
//! into the document store collection named after its topic. Records are handled strictly
//! sequentially, so within a partition the stored order matches delivery order. An offset
//! becomes eligible for the client's auto-commit only once its record's handling has
//! completed, giving at-least-once delivery: a crash between insert and commit may replay
//! records, and duplicate stored documents are acceptable.


use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::StreamExt;
use mongodb::bson::{doc, Bson, DateTime, Document};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::ClientConfig;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;

use crate::config::Config;
use crate::error::StepOutcome;
use crate::storage::DocumentSink;

/// The field under which an undecodable payload is stored verbatim.
const RAW_PAYLOAD_FIELD: &str = "raw";

/// Timeout applied to the initial broker connectivity probe.
const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// A controller encapsulating all logic for consuming records and persisting them.
pub struct IngestCtl {
    /// The application's runtime config.
    config: Arc<Config>,
    /// The document store sink shared across all topics.
    sink: Arc<dyn DocumentSink>,
    /// The consumer group session with the broker.
    consumer: StreamConsumer,
    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,
}

impl IngestCtl {
    /// Create a new instance, establishing the consumer group session.
    ///
    /// A failure here is fatal: without a broker session there is nothing useful to do.
    pub async fn new(config: Arc<Config>, sink: Arc<dyn DocumentSink>, shutdown_rx: broadcast::Receiver<()>) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_broker)
            .set("group.id", &config.group_id)
            // Fresh groups replay the full retained history; previously seen groups resume
            // from their committed offsets.
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            // With the store left on its default, the client marks each offset for commit
            // the moment it is delivered, and the commit timer can then skip past a record
            // whose insert never ran. Offsets are stored by hand after handling instead.
            .set("enable.auto.offset.store", "false")
            .create()
            .context("error building broker consumer")?;
        // The client connects lazily; probe the broker here so a dead broker fails startup
        // instead of surfacing as an endless receive-error stream. The probe blocks, so it
        // runs off the async runtime.
        let consumer = tokio::task::spawn_blocking(move || -> Result<StreamConsumer> {
            consumer
                .fetch_metadata(None, CONNECT_TIMEOUT)
                .context("error establishing broker consumer session")?;
            Ok(consumer)
        })
        .await
        .context("error joining broker probe task")??;
        let topic_refs: Vec<&str> = config.topics.iter().map(|topic| topic.as_str()).collect();
        consumer.subscribe(&topic_refs).context("error subscribing to topics")?;
        for topic in &config.topics {
            tracing::info!(%topic, "subscribed to topic");
        }

        Ok(Self {
            config,
            sink,
            consumer,
            shutdown_rx: BroadcastStream::new(shutdown_rx),
        })
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        tracing::info!(broker = %self.config.kafka_broker, group_id = %self.config.group_id, "ingestion pipeline started");

        loop {
            tokio::select! {
                msg_res = self.consumer.recv() => self.handle_record(msg_res).await,
                _ = self.shutdown_rx.next() => break,
            }
        }

        // Deregister from the consumer group before exit so the broker reassigns partitions
        // promptly instead of waiting out the session timeout.
        self.consumer.unsubscribe();
        tracing::info!("ingestion pipeline shutdown complete");
        Ok(())
    }

    /// Handle a single delivered record.
    ///
    /// Both receive errors and insert failures for a single record are logged and skipped,
    /// never halting consumption of the records behind them.
    #[tracing::instrument(level = "trace", skip(self, msg_res))]
    async fn handle_record(&self, msg_res: KafkaResult<BorrowedMessage<'_>>) {
        let msg = match msg_res {
            Ok(msg) => msg,
            Err(err) => {
                tracing::error!(error = ?err, "error receiving record from broker");
                return;
            }
        };
        let (topic, partition, offset) = (msg.topic(), msg.partition(), msg.offset());
        tracing::info!(%topic, partition, offset, "record received");

        match process_record(self.sink.as_ref(), &self.consumer, topic, partition, offset, msg.payload().unwrap_or_default()).await {
            StepOutcome::Success => tracing::info!(%topic, offset, "record stored"),
            StepOutcome::Recoverable(err) => tracing::error!(error = ?err, %topic, offset, "error inserting record into document store"),
        }
    }
}

/// A store of processed-record positions.
///
/// Fed only once a record's handling has completed, so a crash mid-handling replays the
/// record instead of skipping it.
pub trait OffsetTracker: Send + Sync {
    /// Mark the record at the given position as processed, making its offset eligible for
    /// the next auto-commit.
    fn mark_processed(&self, topic: &str, partition: i32, offset: i64) -> Result<()>;
}

impl OffsetTracker for StreamConsumer {
    fn mark_processed(&self, topic: &str, partition: i32, offset: i64) -> Result<()> {
        self.store_offset(topic, partition, offset).context("error storing processed offset")?;
        Ok(())
    }
}

/// Handle a delivered record end to end: persist its document, then mark it processed.
///
/// The offset is marked on both outcomes, since an insert failure is skipped rather than
/// retried; what matters for delivery semantics is that the mark never precedes the insert
/// attempt.
pub async fn process_record(
    sink: &dyn DocumentSink, offsets: &dyn OffsetTracker, topic: &str, partition: i32, offset: i64, payload: &[u8],
) -> StepOutcome {
    let outcome = store_record(sink, topic, partition, offset, payload).await;
    if let Err(err) = offsets.mark_processed(topic, partition, offset) {
        tracing::error!(error = ?err, %topic, offset, "error storing processed offset");
    }
    outcome
}

/// Transform a delivered record into its stored document and persist it.
///
/// An insert failure is reported as a recoverable outcome so the caller can keep the stream
/// moving past the affected record.
pub async fn store_record(sink: &dyn DocumentSink, topic: &str, partition: i32, offset: i64, payload: &[u8]) -> StepOutcome {
    let document = build_document(partition, offset, payload);
    match sink.insert(topic, document).await {
        Ok(()) => StepOutcome::Success,
        Err(err) => StepOutcome::Recoverable(err),
    }
}

/// Build the stored document for a delivered record.
///
/// Exactly one document is produced per record. The receipt timestamp is assigned here, not
/// by the broker.
pub fn build_document(partition: i32, offset: i64, payload: &[u8]) -> Document {
    doc! {
        "kafkaOffset": offset,
        "partition": partition,
        "receivedAt": DateTime::now(),
        "payload": decode_payload(payload),
    }
}

/// Decode a record payload as JSON, falling back to wrapping the raw bytes.
///
/// The payload is never dropped for being undecodable.
fn decode_payload(payload: &[u8]) -> Bson {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|value| mongodb::bson::to_bson(&value).ok())
        .unwrap_or_else(|| {
            let mut fallback = Document::new();
            fallback.insert(RAW_PAYLOAD_FIELD, String::from_utf8_lossy(payload).into_owned());
            Bson::Document(fallback)
        })
}
