//! Retrying transient storage failures.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::Retryable as _;

use crate::error::ProjectError;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for ProjectError {
    fn is_transient(&self) -> bool {
        matches!(self, ProjectError::TransientStore(_))
    }
}

/// Re-runs an operation after transient failures.
///
/// Attempt `n` that fails transiently is followed by a pause of
/// `n * base_delay`. Permanent failures are returned at once.
///
/// Each attempt runs the whole operation again, including reading the
/// project and computing its diff. If another writer got in between
/// attempts, the retry diffs against the newer state, so a mutation is
/// applied at least once against *some* current snapshot rather than exactly
/// once against the snapshot the caller saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Pause after failed attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// The pauses between attempts: `base_delay`, `2 * base_delay`, ... one
    /// fewer than the total number of attempts.
    fn backoff(&self) -> impl Iterator<Item = Duration> + Send + Sync + Unpin {
        let base_delay = self.base_delay;
        (1..self.max_attempts.max(1)).map(move |attempt| base_delay * attempt)
    }

    pub async fn run<F, Fut, T, E>(&self, operation: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;
        let result = op
            .retry(self.backoff())
            .when(|err: &E| err.is_transient())
            .notify(|err: &E, delay: Duration| {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                attempt += 1;
            })
            .await;

        if let Err(err) = &result {
            if err.is_transient() {
                tracing::error!(operation, attempts = attempt, error = %err, "retries exhausted");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn transient() -> ProjectError {
        StoreError::Timeout("socket timeout".into()).into()
    }

    #[test]
    fn backoff_pauses_once_between_each_attempt() {
        let delays: Vec<Duration> = RetryPolicy::default().backoff().collect();
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);

        let single = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_secs(1),
        };
        assert_eq!(single.backoff().count(), 0);
    }

    #[test]
    fn delay_grows_with_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn succeeds_after_fewer_failures_than_attempts() {
        let calls = AtomicU32::new(0);
        let result = fast()
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;
        assert!(matches!(result, Err(ProjectError::TransientStore(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProjectError::InvalidId("x".into()))
            })
            .await;
        assert!(matches!(result, Err(ProjectError::InvalidId(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lock_timeouts_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProjectError::ConcurrencyTimeout {
                    id: uuid::Uuid::new_v4(),
                    waited: Duration::from_millis(1),
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            base_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let _: Result<(), _> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
