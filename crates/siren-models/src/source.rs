//! Source and location identifiers, plus per-source feed health.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one sensor feed (one camera).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a monitored intersection. One signal controller exists per location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LocationId(pub String);

impl LocationId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LocationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LocationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Static description of a registered source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceSpec {
    pub source_id: SourceId,
    /// Intersection whose signal this source feeds
    pub location_id: LocationId,
    /// Human readable location, carried on alerts and tracker entries
    pub location_name: String,
}

impl SourceSpec {
    pub fn new(
        source_id: impl Into<SourceId>,
        location_id: impl Into<LocationId>,
        location_name: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            location_id: location_id.into(),
            location_name: location_name.into(),
        }
    }
}

/// Connection status of a source feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    /// Feed has not produced a frame yet
    #[default]
    Connecting,
    /// Feed is delivering frames
    Online,
    /// Feed failed and is waiting out the reconnect backoff
    Reconnecting,
    /// Feed has failed too many times in a row; still retried, reported for operators
    Degraded,
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Connecting => "connecting",
            FeedStatus::Online => "online",
            FeedStatus::Reconnecting => "reconnecting",
            FeedStatus::Degraded => "degraded",
        }
    }
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health snapshot for one source feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct SourceHealth {
    pub status: FeedStatus,
    /// Consecutive read failures since the last delivered frame
    pub consecutive_failures: u32,
    /// Total reconnect attempts over the session
    pub reconnects: u64,
    pub last_frame_at: Option<DateTime<Utc>>,
}

impl SourceHealth {
    /// Record a delivered frame. Clears the failure streak.
    pub fn record_frame(&mut self, at: DateTime<Utc>) {
        self.status = FeedStatus::Online;
        self.consecutive_failures = 0;
        self.last_frame_at = Some(at);
    }

    /// Record a read failure. Returns true when this failure crossed the degraded threshold.
    pub fn record_failure(&mut self, degraded_after: u32) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.reconnects += 1;
        if self.consecutive_failures >= degraded_after {
            let newly_degraded = self.status != FeedStatus::Degraded;
            self.status = FeedStatus::Degraded;
            newly_degraded
        } else {
            self.status = FeedStatus::Reconnecting;
            false
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == FeedStatus::Degraded
    }
}
