use super::MessageId;
use crate::batch::Collected;

/// The failure of a single message within a batch.
#[derive(Debug)]
#[non_exhaustive]
pub struct MessageError {
    pub message_id: MessageId,
    pub error: anyhow::Error,
    /// Whether the message was handed back for redelivery; if not,
    /// it was acknowledged and dropped.
    pub retried: bool,
}

/// A summary of one batch.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct BatchProcessingResult {
    pub total: usize,
    pub successful: usize,
    /// Messages acknowledged without being handled successfully.
    pub failed: usize,
    pub retried: usize,
    /// Every failure, retried or not, in the order it happened.
    pub errors: Vec<MessageError>,
}

impl BatchProcessingResult {
    /// Whether every message in the batch was handled successfully.
    #[must_use]
    pub fn is_success(&self) -> bool { self.successful == self.total }
}

impl From<Collected<(), MessageError>> for BatchProcessingResult {
    fn from(collected: Collected<(), MessageError>) -> Self {
        let errors = collected
            .errors
            .into_iter()
            .map(|error| error.source)
            .collect::<Vec<_>>();
        let retried = errors.iter().filter(|error| error.retried).count();

        Self {
            total: collected.total,
            successful: collected.successful,
            failed: collected.failed - retried,
            retried,
            errors,
        }
    }
}
