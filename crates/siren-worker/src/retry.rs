//! Reconnect helpers for source feeds.
//!
//! Feeds are retried forever with a fixed backoff; these helpers keep the
//! retry loop cancellable and its logs quiet during long outages.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

/// Sleep for the reconnect backoff unless shutdown is signalled first.
///
/// Returns `false` when shutdown interrupted the wait.
pub async fn backoff_or_shutdown(backoff: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(backoff) => true,
        changed = shutdown.changed() => {
            // A dropped sender means the session is gone
            changed.is_ok() && !*shutdown.borrow()
        }
    }
}

/// State tracker for repeated operations that may fail intermittently.
///
/// Suppresses log spam once a feed has failed many times in a row.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Record a successful operation (resets failure count).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 && self.suppressed {
            debug!(
                "Feed recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failed operation.
    ///
    /// Returns `true` if this failure should be logged (not suppressed).
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else if self.consecutive_failures == self.max_logged_failures + 1 {
            self.suppressed = true;
            warn!(
                "Suppressing further failure logs after {} consecutive failures",
                self.max_logged_failures
            );
            false
        } else {
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether this failure streak was long enough to trigger suppression.
    pub fn was_suppressed(&self) -> bool {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_tracker_suppression() {
        let mut tracker = FailureTracker::new(3);

        assert!(tracker.record_failure());
        assert!(tracker.record_failure());
        assert!(tracker.record_failure());

        // 4th failure triggers suppression message (returns false)
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(tracker.was_suppressed());

        tracker.record_success();
        assert_eq!(tracker.failure_count(), 0);
        assert!(tracker.record_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_completes() {
        let (_tx, mut rx) = watch::channel(false);
        let start = tokio::time::Instant::now();

        assert!(backoff_or_shutdown(Duration::from_secs(1), &mut rx).await);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_interrupted_by_shutdown() {
        let (tx, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            backoff_or_shutdown(Duration::from_secs(60), &mut rx).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send_replace(true);

        assert!(!handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_backoff_skipped_when_already_stopping() {
        let (_tx, mut rx) = watch::channel(true);
        assert!(!backoff_or_shutdown(Duration::from_secs(60), &mut rx).await);
    }
}
