//! Delivery budget for forwarding one alert.
//!
//! An alert gets a few attempts inside one overall time budget. When the
//! attempts or the budget run out the alert is given up; nothing is kept
//! for a later retry.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_retry;

/// Attempts and time allowed for one alert.
///
/// The budget should stay below the alert consumer's drain deadline so a
/// struggling sink cannot hold the whole drain on a single alert.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Wait after the first failure; doubles after each further failure
    pub backoff: Duration,
    /// Wall time from the first attempt after which delivery is abandoned
    pub budget: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
            budget: Duration::from_millis(1500),
        }
    }
}

impl DeliveryPolicy {
    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
        };
        Self {
            max_attempts: std::env::var("SIREN_SINK_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_attempts),
            backoff: millis("SIREN_SINK_BACKOFF_MS").unwrap_or(defaults.backoff),
            budget: millis("SIREN_SINK_BUDGET_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.budget),
        }
    }

    /// One attempt, bounded by the budget.
    pub fn single_attempt(budget: Duration) -> Self {
        Self {
            max_attempts: 1,
            budget,
            ..Default::default()
        }
    }

    fn delay_after(&self, failures: u32) -> Duration {
        let doublings = failures.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << doublings)
    }
}

/// Run `attempt` until it succeeds, fails permanently, or the policy is spent.
///
/// Each attempt is cut off at the remaining budget. A retry that could not
/// start before the budget expires is not started; the last error is
/// returned instead.
pub async fn deliver_within<F, Fut>(policy: &DeliveryPolicy, sink: &str, mut attempt: F) -> StoreResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<()>>,
{
    let deadline = Instant::now() + policy.budget;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let error = match tokio::time::timeout_at(deadline, attempt()).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(_) => return Err(StoreError::BudgetExhausted(attempts)),
        };

        if !error.is_retryable() || attempts >= policy.max_attempts.max(1) {
            return Err(error);
        }

        let delay = policy.delay_after(attempts);
        if Instant::now() + delay >= deadline {
            debug!(sink, attempts, "No delivery budget left for another attempt");
            return Err(error);
        }

        warn!(
            sink,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Alert delivery failed, retrying: {}",
            error
        );
        record_retry(sink);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::assert_err;

    fn policy(max_attempts: u32, backoff_ms: u64, budget_ms: u64) -> DeliveryPolicy {
        DeliveryPolicy {
            max_attempts,
            backoff: Duration::from_millis(backoff_ms),
            budget: Duration::from_millis(budget_ms),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = policy(5, 100, 10_000);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_until_delivered() {
        let calls = AtomicU32::new(0);

        let result = deliver_within(&policy(3, 100, 1500), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::from_http_status(503, "warming up"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        tokio_test::assert_ok!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_capped() {
        let calls = AtomicU32::new(0);

        let err = assert_err!(
            deliver_within(&policy(2, 10, 10_000), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::from_http_status(502, "bad gateway")) }
            })
            .await
        );

        assert!(matches!(err, StoreError::ServerError(502, _)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_stops_retries() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        // 400ms then 800ms of backoff would overrun the 1s budget
        let err = assert_err!(
            deliver_within(&policy(10, 400, 1000), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::unavailable("disk full")) }
            })
            .await
        );

        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_cut_off_at_budget() {
        let started = Instant::now();

        let err = assert_err!(
            deliver_within(&DeliveryPolicy::single_attempt(Duration::from_secs(1)), "test", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
        );

        assert!(matches!(err, StoreError::BudgetExhausted(1)));
        assert!(!err.is_retryable());
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let calls = AtomicU32::new(0);

        assert_err!(
            deliver_within(&DeliveryPolicy::default(), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::rejected("schema")) }
            })
            .await
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
