//! Runtime configuration.

use anyhow::{Context, Result};
use serde::Deserialize;

/// The prefix used when deriving a consumer group ID from the local user identity.
const GROUP_ID_PREFIX: &str = "app-consumer-group";

/// The default set of topics.
///
/// A single set drives both the provisioning and the consumption phase.
const DEFAULT_TOPICS: [&str; 9] = [
    "age_analysis",
    "payments",
    "purchases",
    "sales_transactions",
    "customer",
    "products",
    "representative",
    "suppliers",
    "sales",
];

/// Runtime configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The daemon's logging config, which uses Rust's `env_logger` directives.
    #[serde(default = "Config::default_rust_log")]
    pub rust_log: String,

    /// The broker bootstrap address.
    ///
    /// Defaults to the host-side listener of the broker container which this daemon bootstraps.
    #[serde(default = "Config::default_kafka_broker")]
    pub kafka_broker: String,
    /// The consumer group ID.
    ///
    /// When not given, a group ID is derived from the local user identity so that each
    /// developer machine gets its own offset tracking.
    #[serde(default)]
    pub group_id: String,
    /// The set of topics to provision and consume.
    ///
    /// Given as a comma-separated list; when absent the default topic set is used.
    #[serde(default)]
    pub topics: Vec<String>,

    /// The document store connection URI. Required.
    pub mongodb_uri: String,
    /// The document store database name.
    #[serde(default = "Config::default_mongo_db_name")]
    pub mongo_db_name: String,

    /// Readiness budget in seconds after starting the coordination service.
    #[serde(default = "Config::default_dependency_wait")]
    pub dependency_wait_seconds: u64,
    /// Readiness budget in seconds after starting the broker.
    #[serde(default = "Config::default_broker_wait")]
    pub broker_wait_seconds: u64,
}

impl Config {
    /// Create a new config instance.
    ///
    /// Currently this routine just parses the runtime environment and builds the application
    /// config from that. In the future, this may take into account an optional config file as
    /// well.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        let config: Config = envy::from_env().context("error building config from env")?;
        Ok(config.finalize(local_user_identity()))
    }

    /// Fill in derived values which can not come directly from the environment parse.
    pub(crate) fn finalize(mut self, user_identity: String) -> Self {
        if self.group_id.is_empty() {
            self.group_id = format!("{}-{}", GROUP_ID_PREFIX, user_identity);
        }
        if self.topics.is_empty() {
            self.topics = DEFAULT_TOPICS.iter().map(|val| val.to_string()).collect();
        } else {
            self.topics = self.topics.iter().map(|val| val.trim().to_string()).filter(|val| !val.is_empty()).collect();
        }
        self
    }

    fn default_rust_log() -> String {
        "info".into()
    }

    fn default_kafka_broker() -> String {
        "localhost:29092".into()
    }

    fn default_mongo_db_name() -> String {
        "kafka_db".into()
    }

    fn default_dependency_wait() -> u64 {
        10
    }

    fn default_broker_wait() -> u64 {
        20
    }
}

/// Resolve a local user identity for deriving a per-user consumer group.
fn local_user_identity() -> String {
    ["CONSUMER_GROUP", "USER", "USERNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|val| !val.is_empty()))
        .unwrap_or_else(|| "local".into())
}
