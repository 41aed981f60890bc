//! Bootstrap orchestration.
//!
//! Brings up the broker's coordination service and the broker itself inside managed
//! containers, gates on readiness between dependent steps, provisions the required topics,
//! then hands off to the ingestion pipeline. Transitions are strictly sequential and
//! forward-only: there is no retry or rollback, container steps are best-effort, and only
//! topic provisioning is fatal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bollard::Docker;
use tokio::time::Instant;

use crate::config::Config;
use crate::containers::{self, ContainerSpec};
use crate::topics;

/// The coordination service container.
const ZOOKEEPER: ContainerSpec = ContainerSpec {
    name: "zookeeper",
    image: "confluentinc/cp-zookeeper:7.4.1",
    ports: &[(2181, 2181)],
    env: &["ZOOKEEPER_CLIENT_PORT=2181", "ZOOKEEPER_TICK_TIME=2000"],
};

/// The broker container, exposing both the in-network and host-side listeners.
const KAFKA: ContainerSpec = ContainerSpec {
    name: "kafka",
    image: "confluentinc/cp-kafka:7.4.1",
    ports: &[(9092, 9092), (29092, 29092)],
    env: &[
        "KAFKA_BROKER_ID=1",
        "KAFKA_ZOOKEEPER_CONNECT=zookeeper:2181",
        "KAFKA_LISTENERS=PLAINTEXT://0.0.0.0:9092,PLAINTEXT_HOST://0.0.0.0:29092",
        "KAFKA_ADVERTISED_LISTENERS=PLAINTEXT://kafka:9092,PLAINTEXT_HOST://localhost:29092",
        "KAFKA_LISTENER_SECURITY_PROTOCOL_MAP=PLAINTEXT:PLAINTEXT,PLAINTEXT_HOST:PLAINTEXT",
        "KAFKA_INTER_BROKER_LISTENER_NAME=PLAINTEXT",
        "KAFKA_OFFSETS_TOPIC_REPLICATION_FACTOR=1",
    ],
};

/// The host-side address probed for coordination service readiness.
const ZOOKEEPER_PROBE_ADDR: &str = "localhost:2181";
/// The interval between readiness probe attempts.
const PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// The states of the bootstrap sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootstrapState {
    Init,
    DependencyStarting,
    DependencyWaiting,
    PrimaryStarting,
    PrimaryWaiting,
    Provisioning,
    IngestionHandoff,
    Running,
}

impl BootstrapState {
    /// The state following this one. `Running` is terminal.
    pub fn next(self) -> Self {
        match self {
            Self::Init => Self::DependencyStarting,
            Self::DependencyStarting => Self::DependencyWaiting,
            Self::DependencyWaiting => Self::PrimaryStarting,
            Self::PrimaryStarting => Self::PrimaryWaiting,
            Self::PrimaryWaiting => Self::Provisioning,
            Self::Provisioning => Self::IngestionHandoff,
            Self::IngestionHandoff => Self::Running,
            Self::Running => Self::Running,
        }
    }
}

/// The bootstrap orchestrator.
///
/// Once `run` returns the orchestrator has no further responsibilities: it does not supervise
/// the pipeline it hands off to.
pub struct Bootstrap {
    /// The application's runtime config.
    config: Arc<Config>,
    /// The current state of the sequence.
    state: BootstrapState,
}

impl Bootstrap {
    /// Create a new instance.
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            state: BootstrapState::Init,
        }
    }

    /// Drive the bootstrap sequence through to ingestion handoff.
    pub async fn run(mut self) -> Result<()> {
        // A failure to reach the container runtime makes the container steps recoverable
        // no-ops; the services may already be externally managed.
        let docker = match connect_docker() {
            Ok(docker) => Some(docker),
            Err(err) => {
                tracing::error!(error = ?err, "error connecting to container runtime, skipping container steps");
                None
            }
        };

        while self.state != BootstrapState::IngestionHandoff {
            self.state = self.state.next();
            tracing::debug!(state = ?self.state, "bootstrap advancing");
            match self.state {
                BootstrapState::DependencyStarting => {
                    if let Some(docker) = &docker {
                        containers::ensure_running(docker, &ZOOKEEPER).await.log("start zookeeper");
                    }
                }
                BootstrapState::DependencyWaiting => {
                    await_ready(ZOOKEEPER_PROBE_ADDR, Duration::from_secs(self.config.dependency_wait_seconds)).await;
                }
                BootstrapState::PrimaryStarting => {
                    if let Some(docker) = &docker {
                        containers::ensure_running(docker, &KAFKA).await.log("start kafka");
                    }
                }
                BootstrapState::PrimaryWaiting => {
                    await_ready(&self.config.kafka_broker, Duration::from_secs(self.config.broker_wait_seconds)).await;
                }
                BootstrapState::Provisioning => {
                    topics::ensure_topics(&self.config.kafka_broker, &self.config.topics)
                        .await
                        .context("error provisioning topics")?;
                }
                _ => (),
            }
        }

        tracing::info!("bootstrap complete, handing off to ingestion pipeline");
        Ok(())
    }
}

/// Connect to the container runtime.
fn connect_docker() -> Result<Docker> {
    #[cfg(unix)]
    let docker = Docker::connect_with_socket_defaults().context("error connecting to docker socket")?;
    #[cfg(windows)]
    let docker = Docker::connect_with_local_defaults().context("error connecting to docker")?;
    Ok(docker)
}

/// Poll the given address until it accepts a TCP connection or the budget is exhausted.
///
/// Exhausting the budget only logs a warning; orchestration proceeds regardless, since a
/// slow-starting service may still come up before it is first used.
async fn await_ready(target: &str, budget: Duration) {
    let deadline = Instant::now() + budget;
    loop {
        match tokio::net::TcpStream::connect(target).await {
            Ok(_conn) => {
                tracing::info!(%target, "service is accepting connections");
                return;
            }
            Err(err) => {
                if Instant::now() >= deadline {
                    tracing::warn!(%target, error = ?err, "readiness budget exhausted, proceeding anyway");
                    return;
                }
                tokio::time::sleep(PROBE_INTERVAL).await;
            }
        }
    }
}
