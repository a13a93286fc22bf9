//! Cross-source movement records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::SourceId;

/// One rising-edge detection retained by the movement tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackerEntry {
    pub timestamp: DateTime<Utc>,
    pub source_id: SourceId,
    pub location_name: String,
    pub confidence: f64,
}

impl TrackerEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        source_id: SourceId,
        location_name: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            timestamp,
            source_id,
            location_name: location_name.into(),
            confidence,
        }
    }
}

/// Inferred movement of an emergency vehicle between two sources.
///
/// This is a nearest-in-time heuristic, not a verified identity match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    pub from_source: SourceId,
    pub from_location: String,
    pub to_source: SourceId,
    pub to_location: String,
    pub departed_at: DateTime<Utc>,
    pub arrived_at: DateTime<Utc>,
}

impl Transition {
    /// Build from the earlier and later entry of a correlated pair.
    pub fn between(previous: &TrackerEntry, latest: &TrackerEntry) -> Self {
        Self {
            from_source: previous.source_id.clone(),
            from_location: previous.location_name.clone(),
            to_source: latest.source_id.clone(),
            to_location: latest.location_name.clone(),
            departed_at: previous.timestamp,
            arrived_at: latest.timestamp,
        }
    }

    /// Seconds between the two detections.
    pub fn elapsed_secs(&self) -> f64 {
        (self.arrived_at - self.departed_at).num_milliseconds() as f64 / 1000.0
    }
}
