//! Traffic signal state snapshots.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal phase for the monitored approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignalPhase {
    #[default]
    Red,
    Green,
}

impl SignalPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalPhase::Red => "red",
            SignalPhase::Green => "green",
        }
    }

    /// The other phase.
    pub fn flipped(&self) -> Self {
        match self {
            SignalPhase::Red => SignalPhase::Green,
            SignalPhase::Green => SignalPhase::Red,
        }
    }
}

impl fmt::Display for SignalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only snapshot of one location's signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignalState {
    pub phase: SignalPhase,
    pub phase_started_at: DateTime<Utc>,
    /// Seconds the current phase lasts when no override holds it
    pub current_phase_duration: f64,
    pub priority_override_active: bool,
}

impl SignalState {
    /// Seconds spent in the current phase as of `now`.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        ((now - self.phase_started_at).num_milliseconds() as f64 / 1000.0).max(0.0)
    }
}
