use thiserror::Error;

/// Errors a notifier adapter's `deliver` call can fail with.
///
/// The transient/permanent split drives retry: transient failures (network
/// blips, rate limiting) are retried with backoff; permanent failures
/// (invalid recipient, rejected message) are logged and dropped.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("transient delivery error: {0}")]
    Transient(String),

    #[error("permanent delivery error: {0}")]
    Permanent(String),
}

impl NotifierError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
