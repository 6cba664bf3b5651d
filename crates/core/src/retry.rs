use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::ApplicationError;

/// Re-runs a whole operation after a transient store failure. Each attempt must open its own
/// session; nothing is resumed mid-sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff }
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, ApplicationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApplicationError>>,
    {
        let mut attempt_number = 1;
        loop {
            match attempt().await {
                Err(error) if error.is_retryable() && attempt_number < self.max_attempts => {
                    warn!(
                        event_name = "store.retrying",
                        operation,
                        attempt = attempt_number,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "transient store failure, re-running operation"
                    );
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff * attempt_number).await;
                    }
                    attempt_number += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::RetryPolicy;
    use crate::errors::{ApplicationError, StoreError};

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result = policy
            .run("test", || async {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call < 3 {
                    Err(ApplicationError::from(StoreError::Conflict("database is locked".into())))
                } else {
                    Ok(call)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO);

        let result: Result<(), _> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApplicationError::from(StoreError::Unavailable("pool timed out".into())))
            })
            .await;

        assert!(matches!(result, Err(ApplicationError::Store(StoreError::Unavailable(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn business_errors_are_never_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let result: Result<(), _> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApplicationError::NoPendingApproval)
            })
            .await;

        assert_eq!(result, Err(ApplicationError::NoPendingApproval));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
