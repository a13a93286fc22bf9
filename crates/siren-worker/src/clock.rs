//! Time source for the monitoring core.

use chrono::{DateTime, Duration, Utc};

/// Supplies `now` to every state-machine call.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock time anchored to the tokio timer.
///
/// Follows tokio's paused/advanced time, which makes cooldowns and signal
/// cycling reproducible under `start_paused` tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: tokio::time::Instant::now(),
        }
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.started.elapsed();
        self.anchor + Duration::milliseconds(elapsed.as_millis() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::default();
        let start = clock.now();

        tokio::time::advance(std::time::Duration::from_secs(7)).await;
        assert_eq!(clock.now() - start, Duration::seconds(7));
    }
}
