//! Exponential backoff for calls to the payout producer.
//!
//! The policy is a value injected into the client: how many attempts, how long to
//! wait after each failed one, and which errors are worth another attempt. The
//! default is 3 attempts on the 1s, 2s, 4s schedule; no wait follows the final
//! attempt.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::UpstreamError;

#[derive(Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Wait after the first failed attempt.
    pub initial_backoff: Duration,

    /// Growth factor applied per attempt.
    pub multiplier: u32,

    /// Decides whether an error earns another attempt.
    pub retryable: fn(&UpstreamError) -> bool,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(max_attempts: u32, initial_backoff: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            multiplier: multiplier.max(1),
            retryable: UpstreamError::is_retryable,
        }
    }

    pub fn with_predicate(mut self, retryable: fn(&UpstreamError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Wait after failed attempt `attempt` (1-indexed).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.initial_backoff
            .saturating_mul(self.multiplier.saturating_pow(exponent))
    }

    /// The full backoff series, one entry per attempt.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts).map(|a| self.backoff_after(a)).collect()
    }

    /// Runs `operation` until it succeeds, hits a non-retryable error, or the
    /// attempt budget is spent. Log lines pick up the caller's span fields.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation(attempt).await {
                Ok(value) => return RetryOutcome::Success { value, attempts: attempt },
                Err(e) => e,
            };

            if !(self.retryable)(&error) {
                warn!(attempt, error = %error, "Permanent upstream error, not retrying");
                return RetryOutcome::Permanent { error, attempts: attempt };
            }

            if attempt >= self.max_attempts {
                warn!(
                    attempts = attempt,
                    error = %error,
                    "Upstream call failed, retries exhausted"
                );
                return RetryOutcome::Exhausted { last_error: error, attempts: attempt };
            }

            let backoff = self.backoff_after(attempt);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Upstream call failed, backing off"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Duration::from_secs(1), 2)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("multiplier", &self.multiplier)
            .field("schedule", &self.schedule())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Exhausted { last_error: UpstreamError, attempts: u32 },
    Permanent { error: UpstreamError, attempts: u32 },
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn failing() -> UpstreamError {
        UpstreamError::Status {
            status: 500,
            body: "This API sometimes fails".to_string(),
        }
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(
            policy.schedule(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_three_attempts_with_backoff() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let outcome: RetryOutcome<()> = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(failing()) }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second, none after the last.
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failure() {
        let policy = RetryPolicy::default();

        let outcome = policy
            .run(|attempt| async move {
                if attempt == 1 {
                    Err(failing())
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Success { value: 2, attempts: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_stops_immediately() {
        let policy = RetryPolicy::default().with_predicate(|_| false);
        let started = tokio::time::Instant::now();

        let outcome: RetryOutcome<()> = policy
            .run(|_| async { Err(UpstreamError::NotApplied) })
            .await;

        assert!(matches!(outcome, RetryOutcome::Permanent { attempts: 1, .. }));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
