//! Alert pipeline metrics.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const ALERTS_PUBLISHED_TOTAL: &str = "siren_alerts_published_total";
    pub const ALERTS_DROPPED_TOTAL: &str = "siren_alerts_dropped_total";
    pub const ALERTS_DELIVERED_TOTAL: &str = "siren_alerts_delivered_total";
    pub const ALERTS_FAILED_TOTAL: &str = "siren_alerts_failed_total";
    pub const ALERTS_DISCARDED_TOTAL: &str = "siren_alerts_discarded_total";
    pub const ALERT_QUEUE_DEPTH: &str = "siren_alert_queue_depth";
}

pub fn record_published(source_id: &str) {
    let labels = [("source", source_id.to_string())];
    counter!(names::ALERTS_PUBLISHED_TOTAL, &labels).increment(1);
}

pub fn record_dropped(source_id: &str, reason: &str) {
    let labels = [
        ("source", source_id.to_string()),
        ("reason", reason.to_string()),
    ];
    counter!(names::ALERTS_DROPPED_TOTAL, &labels).increment(1);
}

pub fn record_delivered(sink: &str) {
    let labels = [("sink", sink.to_string())];
    counter!(names::ALERTS_DELIVERED_TOTAL, &labels).increment(1);
}

pub fn record_failed(sink: &str, kind: &str) {
    let labels = [("sink", sink.to_string()), ("kind", kind.to_string())];
    counter!(names::ALERTS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_discarded(count: u64) {
    counter!(names::ALERTS_DISCARDED_TOTAL).increment(count);
}

pub fn set_queue_depth(depth: usize) {
    gauge!(names::ALERT_QUEUE_DEPTH).set(depth as f64);
}
