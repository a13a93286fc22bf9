//! Alert sink metrics collection.
//!
//! - Request counters by sink and status
//! - Latency histograms
//! - Retry counters
//! - Dispatch counters by service kind

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total sink writes by sink and outcome.
    pub const SINK_REQUESTS_TOTAL: &str = "siren_sink_requests_total";

    /// Total delivery retries by sink.
    pub const SINK_RETRIES_TOTAL: &str = "siren_sink_retries_total";

    /// Sink write latency in seconds by sink.
    pub const SINK_LATENCY_SECONDS: &str = "siren_sink_latency_seconds";

    /// Simulated dispatches by service kind.
    pub const DISPATCHES_TOTAL: &str = "siren_dispatches_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed sink write.
pub fn record_request(sink: &str, outcome: &str, latency_ms: f64) {
    counter!(
        names::SINK_REQUESTS_TOTAL,
        "sink" => sink.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::SINK_LATENCY_SECONDS,
        "sink" => sink.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a delivery retry.
pub fn record_retry(sink: &str) {
    counter!(
        names::SINK_RETRIES_TOTAL,
        "sink" => sink.to_string()
    )
    .increment(1);
}

/// Record a simulated dispatch.
pub fn record_dispatch(service: &str) {
    counter!(
        names::DISPATCHES_TOTAL,
        "service" => service.to_string()
    )
    .increment(1);
}
