//! Monitoring core metrics.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_PROCESSED_TOTAL: &str = "siren_frames_processed_total";
    pub const DETECTION_EDGES_TOTAL: &str = "siren_detection_edges_total";
    pub const ALERTS_SUPPRESSED_TOTAL: &str = "siren_alerts_suppressed_total";
    pub const ACTIVE_EMERGENCIES: &str = "siren_active_emergencies";
    pub const FEED_RECONNECTS_TOTAL: &str = "siren_feed_reconnects_total";
    pub const DEGRADED_SOURCES: &str = "siren_degraded_sources";
    pub const SIGNAL_OVERRIDES_TOTAL: &str = "siren_signal_overrides_total";
    pub const SIGNAL_PHASE_CHANGES_TOTAL: &str = "siren_signal_phase_changes_total";
    pub const TRANSITIONS_TOTAL: &str = "siren_transitions_total";
}

pub fn record_frame(source_id: &str) {
    let labels = [("source", source_id.to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(1);
}

pub fn record_edge(source_id: &str, edge: &str) {
    let labels = [("source", source_id.to_string()), ("edge", edge.to_string())];
    counter!(names::DETECTION_EDGES_TOTAL, &labels).increment(1);
}

pub fn record_alert_suppressed(source_id: &str) {
    let labels = [("source", source_id.to_string())];
    counter!(names::ALERTS_SUPPRESSED_TOTAL, &labels).increment(1);
}

pub fn set_active_emergencies(count: usize) {
    gauge!(names::ACTIVE_EMERGENCIES).set(count as f64);
}

pub fn record_reconnect(source_id: &str) {
    let labels = [("source", source_id.to_string())];
    counter!(names::FEED_RECONNECTS_TOTAL, &labels).increment(1);
}

pub fn set_degraded_sources(count: usize) {
    gauge!(names::DEGRADED_SOURCES).set(count as f64);
}

pub fn record_override(location: &str) {
    let labels = [("location", location.to_string())];
    counter!(names::SIGNAL_OVERRIDES_TOTAL, &labels).increment(1);
}

pub fn record_phase_change(location: &str, phase: &str) {
    let labels = [("location", location.to_string()), ("phase", phase.to_string())];
    counter!(names::SIGNAL_PHASE_CHANGES_TOTAL, &labels).increment(1);
}

pub fn record_transition() {
    counter!(names::TRANSITIONS_TOTAL).increment(1);
}
