//! Bounded retry with a fixed delay between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::RetryExhausted;

/// Retry wrapper applied to fetch and storage operations.
///
/// Any failure is retried while attempts remain. Total attempts are
/// `max_attempts`; the wait between two attempts is always `delay`. The policy
/// never returns an empty success after giving up: the caller gets
/// [`RetryExhausted`] carrying the last error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run an async operation under the policy, sleeping on the tokio timer.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => {
                    self.log_success(operation, attempt);
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(operation, attempt, &error) {
                        return Err(RetryExhausted::new(operation, attempt, error));
                    }
                    tokio::time::sleep(self.delay).await;
                }
            }
            attempt += 1;
        }
    }

    /// Run a synchronous operation under the policy. The delay blocks the
    /// calling thread; async callers should use [`RetryPolicy::run`] instead.
    pub fn run_blocking<T, E, F>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => {
                    self.log_success(operation, attempt);
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(operation, attempt, &error) {
                        return Err(RetryExhausted::new(operation, attempt, error));
                    }
                    std::thread::sleep(self.delay);
                }
            }
            attempt += 1;
        }
    }

    fn should_retry<E>(&self, operation: &'static str, attempt: u32, failure: &E) -> bool
    where
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        if attempt >= max_attempts {
            error!(operation, attempts = attempt, error = %failure, "all attempts failed");
            return false;
        }
        warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = self.delay.as_millis() as u64,
            error = %failure,
            "attempt failed, retrying"
        );
        true
    }

    fn log_success(&self, operation: &'static str, attempt: u32) {
        if attempt > 1 {
            info!(operation, attempt, "succeeded after retry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PersistenceError, TransportError};
    use std::cell::Cell;

    fn unavailable() -> TransportError {
        TransportError::Status {
            status: 503,
            snippet: String::new(),
        }
    }

    #[test]
    fn default_policy_is_three_attempts_five_seconds_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(5));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn blocking_run_returns_first_success() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let value = policy
            .run_blocking("lookup", || {
                calls.set(calls.get() + 1);
                if calls.get() < 2 {
                    Err(unavailable())
                } else {
                    Ok(42)
                }
            })
            .expect("second attempt succeeds");

        assert_eq!(value, 42);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn blocking_run_reports_exhaustion_with_the_last_error() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let error = policy
            .run_blocking("lookup", || -> Result<(), TransportError> {
                calls.set(calls.get() + 1);
                Err(TransportError::Request(format!("attempt {}", calls.get())))
            })
            .expect_err("never succeeds");

        assert_eq!(calls.get(), 3);
        assert_eq!(error.attempts(), 3);
        assert_eq!(error.operation(), "lookup");
        assert_eq!(error.last_error(), &TransportError::Request("attempt 3".into()));
    }

    #[test]
    fn storage_errors_use_the_full_attempt_budget() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let error = policy
            .run_blocking("query", || -> Result<(), PersistenceError> {
                calls.set(calls.get() + 1);
                Err(PersistenceError::QueryRejected("not a select".into()))
            })
            .expect_err("rejected");

        assert_eq!(calls.get(), 3);
        assert_eq!(error.attempts(), 3);
    }

    #[tokio::test]
    async fn client_error_statuses_are_retried_like_any_other_failure() {
        for status in [403, 404, 502] {
            let calls = Cell::new(0);
            let policy = RetryPolicy::new(3, Duration::ZERO);

            let error = policy
                .run("fetch_raw", || {
                    calls.set(calls.get() + 1);
                    async move {
                        Err::<(), _>(TransportError::Status {
                            status,
                            snippet: String::new(),
                        })
                    }
                })
                .await
                .expect_err("always failing");

            assert_eq!(calls.get(), 3, "status {status}");
            assert_eq!(error.attempts(), 3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn async_run_waits_the_fixed_delay_between_attempts() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::default();
        let started = tokio::time::Instant::now();

        let error = policy
            .run("fetch_raw", || {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(unavailable()) }
            })
            .await
            .expect_err("exhausted");

        assert_eq!(calls.get(), 3);
        assert_eq!(error.attempts(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10), "two delays expected, got {elapsed:?}");
        assert!(elapsed < Duration::from_secs(15), "no third delay expected, got {elapsed:?}");
    }
}
