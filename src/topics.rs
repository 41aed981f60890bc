//! Topic provisioning.

use std::collections::HashSet;
use std::time::Duration;

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;

use crate::error::ProvisionError;

/// Timeout applied to the broker metadata fetch.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Ensure every required topic exists on the broker, creating any which are missing.
///
/// Safe to invoke repeatedly: topics which already exist are left untouched, and a concurrent
/// creation racing this one is treated as success. Failure to reach the broker's admin
/// interface is fatal, as the pipeline can not function without its topics.
pub async fn ensure_topics(broker: &str, required: &[String]) -> Result<(), ProvisionError> {
    tracing::info!(%broker, "connecting to broker admin interface");
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new().set("bootstrap.servers", broker).create()?;

    // The metadata fetch blocks, so it runs off the async runtime.
    let (admin, existing) = tokio::task::spawn_blocking(move || -> Result<(AdminClient<DefaultClientContext>, HashSet<String>), ProvisionError> {
        let metadata = admin.inner().fetch_metadata(None, METADATA_TIMEOUT)?;
        let existing: HashSet<String> = metadata.topics().iter().map(|topic| topic.name().to_string()).collect();
        Ok((admin, existing))
    })
    .await??;

    let missing = missing_topics(&existing, required);
    if missing.is_empty() {
        tracing::info!("all topics ready");
        return Ok(());
    }

    let specs: Vec<NewTopic> = missing
        .iter()
        .map(|&name| NewTopic {
            name,
            num_partitions: 1,
            // Defer to the broker's default replication factor.
            replication: TopicReplication::Fixed(-1),
            config: vec![],
        })
        .collect();
    let results = admin.create_topics(specs.iter(), &AdminOptions::new()).await?;
    for result in results {
        match result {
            Ok(topic) => tracing::info!(%topic, "created topic"),
            Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                tracing::debug!(%topic, "topic already exists, continuing");
            }
            Err((topic, code)) => return Err(ProvisionError::Create { topic, code }),
        }
    }
    tracing::info!("all topics ready");
    Ok(())
}

/// Compute the subset of required topics not already present, preserving required order.
pub fn missing_topics<'a>(existing: &HashSet<String>, required: &'a [String]) -> Vec<&'a str> {
    required.iter().filter(|name| !existing.contains(name.as_str())).map(|name| name.as_str()).collect()
}
