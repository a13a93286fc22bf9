//! Alert pipeline error types.

use thiserror::Error;

/// Why an alert was not queued. Drops are non-fatal backpressure signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("Alert queue full (capacity {0})")]
    QueueFull(usize),

    #[error("Alert pipeline closed")]
    Closed,
}

impl DropReason {
    /// Short label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::QueueFull(_) => "queue_full",
            DropReason::Closed => "closed",
        }
    }
}
