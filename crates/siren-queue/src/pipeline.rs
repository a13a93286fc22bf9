//! Bounded alert queue with many publishers and one consumer.
//!
//! Publishing never waits: when the queue is full the alert is dropped and
//! counted. The consumer pops with a bounded wait, forwards each alert to the
//! configured sink, logs failures and keeps going. Delivery is at-most-once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use siren_models::AlertEvent;
use siren_store::{record_timed, AlertSink};

use crate::error::DropReason;
use crate::metrics;

/// Alert pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum queued alerts
    pub capacity: usize,
    /// Bounded wait for the consumer's pop; on expiry it simply polls again
    pub poll_interval: Duration,
    /// How long shutdown keeps delivering queued alerts before discarding the rest
    pub drain_deadline: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            poll_interval: Duration::from_millis(500),
            drain_deadline: Duration::from_secs(2),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            capacity: std::env::var("SIREN_ALERT_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64),
            poll_interval: Duration::from_millis(
                std::env::var("SIREN_ALERT_POLL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            drain_deadline: Duration::from_millis(
                std::env::var("SIREN_ALERT_DRAIN_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
        }
    }
}

/// Shared counters for one pipeline.
#[derive(Debug, Default)]
struct PipelineStats {
    published: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

/// Point-in-time view of pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineSnapshot {
    pub published: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
    pub discarded: u64,
    pub pending: usize,
}

/// Result of a publish attempt.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Queued,
    Dropped(DropReason),
}

impl PublishOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, PublishOutcome::Queued)
    }
}

/// Create a pipeline, returning the cloneable publisher and the single consumer.
pub fn alert_pipeline(config: PipelineConfig) -> (AlertPublisher, AlertConsumer) {
    let capacity = config.capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let stats = Arc::new(PipelineStats::default());

    let publisher = AlertPublisher {
        tx,
        stats: Arc::clone(&stats),
        capacity,
    };
    let consumer = AlertConsumer { rx, config, stats };
    (publisher, consumer)
}

/// Producer handle. Cheap to clone; one per source worker.
#[derive(Clone)]
pub struct AlertPublisher {
    tx: mpsc::Sender<AlertEvent>,
    stats: Arc<PipelineStats>,
    capacity: usize,
}

impl AlertPublisher {
    /// Queue an alert without waiting. A full or closed queue drops it.
    pub fn publish(&self, alert: AlertEvent) -> PublishOutcome {
        let source_id = alert.source_id.clone();
        let alert_id = alert.alert_id.clone();

        let reason = match self.tx.try_send(alert) {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                metrics::record_published(source_id.as_str());
                metrics::set_queue_depth(self.pending());
                debug!(source_id = %source_id, alert_id = %alert_id, "Alert queued");
                return PublishOutcome::Queued;
            }
            Err(TrySendError::Full(_)) => DropReason::QueueFull(self.capacity),
            Err(TrySendError::Closed(_)) => DropReason::Closed,
        };

        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_dropped(source_id.as_str(), reason.as_str());
        warn!(source_id = %source_id, alert_id = %alert_id, "Alert dropped: {}", reason);
        PublishOutcome::Dropped(reason)
    }

    /// Alerts dropped by backpressure or closure so far.
    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    /// Alerts waiting for the consumer.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            published: self.stats.published.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            discarded: self.stats.discarded.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }
}

/// What the consumer did over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerReport {
    pub delivered: u64,
    pub failed: u64,
    /// Alerts delivered or attempted during the shutdown drain
    pub drained: u64,
    /// Alerts left in the queue when the drain deadline expired
    pub discarded: u64,
}

/// The single consumer draining the queue into a sink.
pub struct AlertConsumer {
    rx: mpsc::Receiver<AlertEvent>,
    config: PipelineConfig,
    stats: Arc<PipelineStats>,
}

impl AlertConsumer {
    /// Run until shutdown is signalled or every publisher is gone.
    ///
    /// On shutdown the queue is closed to new alerts, queued alerts are
    /// delivered until the drain deadline, and anything left is discarded.
    pub async fn run(
        mut self,
        sink: Arc<dyn AlertSink>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ConsumerReport {
        info!(
            sink = sink.name(),
            capacity = self.config.capacity,
            "Starting alert consumer"
        );

        let mut report = ConsumerReport::default();

        if !*shutdown.borrow() {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Shutdown signal received, draining alert queue");
                            break;
                        }
                    }
                    received = tokio::time::timeout(self.config.poll_interval, self.rx.recv()) => {
                        match received {
                            // Bounded wait elapsed with nothing queued
                            Err(_) => continue,
                            Ok(Some(alert)) => self.deliver(sink.as_ref(), &alert, &mut report).await,
                            Ok(None) => {
                                info!("All alert publishers gone, consumer exiting");
                                return report;
                            }
                        }
                    }
                }
            }
        }

        self.drain(sink.as_ref(), &mut report).await;
        report
    }

    async fn drain(&mut self, sink: &dyn AlertSink, report: &mut ConsumerReport) {
        self.rx.close();
        let deadline = Instant::now() + self.config.drain_deadline;

        loop {
            if Instant::now() >= deadline {
                break;
            }
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(alert)) => {
                    self.deliver(sink, &alert, report).await;
                    report.drained += 1;
                }
                Ok(None) | Err(_) => break,
            }
        }

        while self.rx.try_recv().is_ok() {
            report.discarded += 1;
        }
        metrics::set_queue_depth(0);

        if report.discarded > 0 {
            self.stats.discarded.fetch_add(report.discarded, Ordering::Relaxed);
            metrics::record_discarded(report.discarded);
            warn!(
                discarded = report.discarded,
                "Drain deadline reached, discarding queued alerts"
            );
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            drained = report.drained,
            "Alert consumer stopped"
        );
    }

    async fn deliver(&self, sink: &dyn AlertSink, alert: &AlertEvent, report: &mut ConsumerReport) {
        match record_timed(sink, alert).await {
            Ok(()) => {
                report.delivered += 1;
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                metrics::record_delivered(sink.name());
            }
            Err(e) => {
                report.failed += 1;
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_failed(sink.name(), e.kind());
                error!(
                    alert_id = %alert.alert_id,
                    source_id = %alert.source_id,
                    sink = sink.name(),
                    "Failed to record alert: {}", e
                );
            }
        }
    }
}
