//! Alert events produced on a source's rising edge.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{FrameRef, LocationId, SourceId};

/// Unique identifier for an alert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AlertId(pub String);

impl AlertId {
    /// Generate a new random alert ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An emergency detection to be persisted and forwarded.
///
/// Immutable once built; consumed exactly once by the alert pipeline consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlertEvent {
    pub alert_id: AlertId,
    pub source_id: SourceId,
    pub location_id: LocationId,
    pub location_name: String,
    /// Classifier confidence of the frame that armed the detection
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub payload: FrameRef,
}

impl AlertEvent {
    pub fn new(
        source_id: SourceId,
        location_id: LocationId,
        location_name: impl Into<String>,
        confidence: f64,
        timestamp: DateTime<Utc>,
        payload: FrameRef,
    ) -> Self {
        Self {
            alert_id: AlertId::new(),
            source_id,
            location_id,
            location_name: location_name.into(),
            confidence,
            timestamp,
            payload,
        }
    }

    /// One-line description used in logs and notifications.
    pub fn summary(&self) -> String {
        format!(
            "Emergency vehicle detected at {} (source {}) with {:.2}% confidence",
            self.location_name, self.source_id, self.confidence
        )
    }
}
