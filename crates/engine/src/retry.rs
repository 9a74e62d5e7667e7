//! Retry-with-backoff for operations that lost an optimistic race.
//!
//! The engine never retries internally. Callers wrap a whole operation, so
//! each attempt re-reads current state before re-validating.

use std::future::Future;
use std::time::Duration;

use coordination::{CoordinationError, RetryPolicy};

use crate::RetrySettings;

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `settings.max_attempts` is exhausted.
///
/// The delay before attempt `n + 1` is the error's own minimum back-off when
/// it names one, otherwise `base_backoff * 2^(n - 1)`.
pub async fn retry_on_conflict<T, F, Fut>(
    settings: &RetrySettings,
    mut operation: F,
) -> Result<T, CoordinationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoordinationError>>,
{
    let attempts = settings.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let RetryPolicy::Retryable { after } = err.retry_policy() else {
                    return Err(err);
                };
                if attempt >= attempts {
                    tracing::warn!(attempt, error = %err, "giving up after retryable failures");
                    return Err(err);
                }
                let delay = after.unwrap_or_else(|| backoff(settings.base_backoff, attempt));
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying operation"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1 << (attempt - 1).min(16))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use coordination::MatterId;

    use super::*;

    fn conflict() -> CoordinationError {
        CoordinationError::Conflict {
            matter: MatterId::new_random(),
            expected: 1,
            actual: 2,
        }
    }

    fn fast() -> RetrySettings {
        RetrySettings {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn conflicts_are_retried_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_on_conflict(&fast(), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(conflict())
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_on_conflict(&fast(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(conflict())
        })
        .await;
        assert!(matches!(result, Err(CoordinationError::Conflict { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_return_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_on_conflict(&fast(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoordinationError::validation("bad input"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles() {
        let base = Duration::from_millis(10);
        assert_eq!(backoff(base, 1), Duration::from_millis(10));
        assert_eq!(backoff(base, 3), Duration::from_millis(40));
    }
}
