//! Error abstractions.

use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;

/// Errors from topic provisioning.
///
/// These are fatal to orchestration: without its topics the pipeline can not function.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The broker's admin interface could not be reached or queried.
    #[error("error reaching broker admin interface: {0}")]
    Admin(#[from] KafkaError),
    /// The broker rejected creation of a topic for a reason other than it already existing.
    #[error("error creating topic {topic}: {code}")]
    Create { topic: String, code: RDKafkaErrorCode },
    /// A blocking broker call could not be joined.
    #[error("error joining blocking broker call: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The outcome of a best-effort orchestration step.
///
/// Steps which are allowed to fail without halting orchestration report their failure here
/// instead of logging and swallowing it, so the caller decides policy. Fatal failures are
/// returned as errors instead.
pub enum StepOutcome {
    /// The step completed successfully.
    Success,
    /// The step failed, though orchestration may proceed.
    Recoverable(anyhow::Error),
}

impl StepOutcome {
    /// Log a recoverable failure under the given step name, consuming the outcome.
    pub fn log(self, step: &str) {
        if let Self::Recoverable(err) = self {
            tracing::error!(error = ?err, step, "best-effort step failed, continuing");
        }
    }
}
