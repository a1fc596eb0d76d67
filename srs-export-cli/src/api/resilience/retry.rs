//! Bounded retry for workbook saves that hit a lock conflict
//!
//! Only lock conflicts are retried. Every other result, success or failure,
//! ends the loop immediately.

use log::{debug, warn};
use std::future::Future;

use super::config::RetryConfig;

/// Result of running an operation under a [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryReport<T> {
    /// Result of the last attempt
    pub value: T,
    /// Attempts made, starting at 1
    pub attempts: u32,
    /// True when the last attempt still hit a lock
    pub exhausted: bool,
}

impl<T> RetryReport<T> {
    /// Retries beyond the first attempt
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Run `operation` until `is_locked` rejects its result or attempts run out.
    ///
    /// The attempt number (1-based) is passed to the operation for logging.
    pub async fn run<T, F, Fut, P>(&self, mut operation: F, is_locked: P) -> RetryReport<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            debug!("Attempt {} of {}", attempt, max_attempts);
            let value = operation(attempt).await;

            if !is_locked(&value) {
                return RetryReport {
                    value,
                    attempts: attempt,
                    exhausted: false,
                };
            }

            if attempt >= max_attempts {
                warn!("Still locked after {} attempts, giving up", attempt);
                return RetryReport {
                    value,
                    attempts: attempt,
                    exhausted: true,
                };
            }

            warn!(
                "Lock conflict on attempt {}, retrying in {:?}",
                attempt, self.config.lock_backoff
            );
            if !self.config.lock_backoff.is_zero() {
                tokio::time::sleep(self.config.lock_backoff).await;
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            lock_backoff: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let report = policy(3).run(|_| async { "ok" }, |v| *v == "locked").await;

        assert_eq!(report.value, "ok");
        assert_eq!(report.attempts, 1);
        assert_eq!(report.retries(), 0);
        assert!(!report.exhausted);
    }

    #[tokio::test]
    async fn test_lock_twice_then_success() {
        let script = RefCell::new(vec!["ok", "locked", "locked"]);

        let report = policy(3)
            .run(
                |_| {
                    let next = script.borrow_mut().pop().unwrap();
                    async move { next }
                },
                |v| *v == "locked",
            )
            .await;

        assert_eq!(report.value, "ok");
        assert_eq!(report.attempts, 3);
        assert_eq!(report.retries(), 2);
        assert!(!report.exhausted);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let calls = RefCell::new(0);

        let report = policy(3)
            .run(
                |_| {
                    *calls.borrow_mut() += 1;
                    async { "locked" }
                },
                |v| *v == "locked",
            )
            .await;

        assert_eq!(*calls.borrow(), 3);
        assert_eq!(report.attempts, 3);
        assert!(report.exhausted);
    }

    #[tokio::test]
    async fn test_other_failure_is_not_retried() {
        let calls = RefCell::new(0);

        let report = policy(3)
            .run(
                |_| {
                    *calls.borrow_mut() += 1;
                    async { Err::<(), &str>("forbidden") }
                },
                |v| matches!(v, Err("locked")),
            )
            .await;

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(report.value, Err("forbidden"));
    }

    #[tokio::test]
    async fn test_attempt_numbers_passed_to_operation() {
        let seen = RefCell::new(Vec::new());

        policy(2)
            .run(
                |attempt| {
                    seen.borrow_mut().push(attempt);
                    async { true }
                },
                |locked| *locked,
            )
            .await;

        assert_eq!(*seen.borrow(), vec![1, 2]);
    }
}
