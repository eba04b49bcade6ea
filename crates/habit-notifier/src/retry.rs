use std::future::Future;
use std::time::Duration;

use crate::error::NotifierError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(2);

/// Retry a delivery attempt with capped exponential backoff: 3 attempts
/// total, delays of `2s, 4s` between them. Only [`NotifierError::Transient`]
/// failures are retried; a permanent failure returns immediately.
pub async fn with_backoff<F, Fut, T>(mut attempt: F) -> Result<T, NotifierError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NotifierError>>,
{
    let mut delay = BASE_DELAY;
    for attempt_no in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt_no < MAX_ATTEMPTS => {
                tracing::warn!(attempt_no, delay_secs = delay.as_secs(), error = %err, "retrying notifier delivery");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("loop always returns on its final iteration")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = with_backoff(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(NotifierError::Transient("blip".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_stops_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), NotifierError> = with_backoff(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(NotifierError::Permanent("rejected".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), NotifierError> = with_backoff(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(NotifierError::Transient("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
