//! The alert persistence/notification collaborator.
//!
//! The concrete sink is chosen once when the monitoring session is built;
//! nothing checks backend capabilities at runtime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use siren_models::{AlertEvent, AlertId};

use crate::error::StoreResult;
use crate::metrics::record_request;

/// Receives each alert exactly once from the pipeline consumer.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Persist or forward one alert.
    async fn record(&self, alert: &AlertEvent) -> StoreResult<()>;

    /// Name used in logs and metric labels.
    fn name(&self) -> &'static str;
}

/// Record an alert through a sink while timing it for metrics.
pub async fn record_timed(sink: &dyn AlertSink, alert: &AlertEvent) -> StoreResult<()> {
    let started = Instant::now();
    let result = sink.record(alert).await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    record_request(sink.name(), outcome, started.elapsed().as_secs_f64() * 1000.0);
    result
}

// =============================================================================
// In-memory sink
// =============================================================================

/// Alerts a memory sink keeps unless told otherwise.
pub const DEFAULT_MEMORY_SINK_CAPACITY: usize = 1000;

/// Keeps the most recent alerts in process memory. Used when no external
/// backend is configured; the oldest alert is evicted once `capacity` is reached.
pub struct MemoryAlertSink {
    alerts: RwLock<VecDeque<AlertEvent>>,
    capacity: usize,
    evicted: AtomicU64,
}

impl Default for MemoryAlertSink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_SINK_CAPACITY)
    }
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            alerts: RwLock::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            evicted: AtomicU64::new(0),
        }
    }

    /// Capacity from `SIREN_MEMORY_SINK_CAPACITY`.
    pub fn from_env() -> Self {
        Self::with_capacity(
            std::env::var("SIREN_MEMORY_SINK_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MEMORY_SINK_CAPACITY),
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Alerts pushed out by newer ones.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Snapshot of the retained alerts in delivery order.
    pub async fn alerts(&self) -> Vec<AlertEvent> {
        self.alerts.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.read().await.is_empty()
    }

    pub async fn find(&self, alert_id: &AlertId) -> Option<AlertEvent> {
        self.alerts
            .read()
            .await
            .iter()
            .find(|a| &a.alert_id == alert_id)
            .cloned()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn record(&self, alert: &AlertEvent) -> StoreResult<()> {
        info!(
            alert_id = %alert.alert_id,
            source_id = %alert.source_id,
            "ALERT: {}", alert.summary()
        );
        let mut alerts = self.alerts.write().await;
        if alerts.len() >= self.capacity {
            alerts.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        alerts.push_back(alert.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Fan-out sink
// =============================================================================

/// Forwards every alert to several sinks in order.
///
/// Every sink is attempted even if an earlier one fails; the first error is returned.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AlertSink for FanoutSink {
    async fn record(&self, alert: &AlertEvent) -> StoreResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = record_timed(sink.as_ref(), alert).await {
                debug!(sink = sink.name(), alert_id = %alert.alert_id, "Fan-out target failed: {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "fanout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::Utc;
    use siren_models::{FrameRef, LocationId, SourceId};
    use tokio_test::{assert_err, assert_ok};

    struct BrokenSink;

    #[async_trait]
    impl AlertSink for BrokenSink {
        async fn record(&self, _alert: &AlertEvent) -> StoreResult<()> {
            Err(StoreError::unavailable("disk full"))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn alert() -> AlertEvent {
        let now = Utc::now();
        AlertEvent::new(
            SourceId::from("cam-1"),
            LocationId::from("main-st"),
            "Main Street",
            90.0,
            now,
            FrameRef {
                source_id: SourceId::from("cam-1"),
                sequence: 1,
                captured_at: now,
                size_bytes: 4,
            },
        )
    }

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = MemoryAlertSink::new();
        let a = alert();
        assert_ok!(sink.record(&a).await);

        assert_eq!(sink.len().await, 1);
        assert_eq!(sink.find(&a.alert_id).await, Some(a));
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_most_recent() {
        let sink = MemoryAlertSink::with_capacity(3);
        let mut ids = Vec::new();
        for _ in 0..10 {
            let a = alert();
            ids.push(a.alert_id.clone());
            assert_ok!(sink.record(&a).await);
        }

        assert_eq!(sink.len().await, 3);
        assert_eq!(sink.evicted(), 7);
        let kept: Vec<AlertId> = sink.alerts().await.into_iter().map(|a| a.alert_id).collect();
        assert_eq!(kept, ids[7..].to_vec());
        assert!(sink.find(&ids[0]).await.is_none());
    }

    #[tokio::test]
    async fn test_fanout_attempts_every_sink() {
        let memory = Arc::new(MemoryAlertSink::new());
        let fanout = FanoutSink::new(vec![Arc::new(BrokenSink), memory.clone()]);

        let err = assert_err!(fanout.record(&alert()).await);
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(memory.len().await, 1);
    }
}
