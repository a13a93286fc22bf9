//! Per-source detection debouncing.
//!
//! A [`SourceMonitor`] turns a noisy per-frame classification stream into a
//! stable emergency signal for one source. Arming needs `required_hits`
//! qualifying frames; disarming needs the hit counter to decay to zero *and*
//! the cooldown since the last qualifying frame to elapse, so a single missed
//! frame never cancels an active emergency.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use siren_ml_client::FrameClassifier;
use siren_models::{ClassificationResult, Frame, LocationId, SourceId, SourceSpec};

use crate::config::MonitorConfig;

/// Change in the debounced signal caused by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// No change
    Steady,
    /// Latch armed on this frame
    Rising,
    /// Latch released on this frame
    Falling,
}

impl Edge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Steady => "steady",
            Edge::Rising => "rising",
            Edge::Falling => "falling",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of processing one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorOutcome {
    pub emergency_active: bool,
    /// Classifier confidence for this frame
    pub confidence: f64,
    pub edge: Edge,
}

impl MonitorOutcome {
    pub fn as_pair(&self) -> (bool, f64) {
        (self.emergency_active, self.confidence)
    }
}

/// Debounce state for one source. Only its monitor mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceState {
    pub source_id: SourceId,
    pub location_id: LocationId,
    pub location_name: String,
    pub consecutive_hits: u32,
    pub emergency_active: bool,
    pub last_detection_time: Option<DateTime<Utc>>,
    pub last_alert_time: Option<DateTime<Utc>>,
    pub confidence_threshold: f64,
    pub required_hits: u32,
    pub cooldown_secs: f64,
}

impl SourceState {
    pub fn new(spec: &SourceSpec, config: &MonitorConfig) -> Self {
        Self {
            source_id: spec.source_id.clone(),
            location_id: spec.location_id.clone(),
            location_name: spec.location_name.clone(),
            consecutive_hits: 0,
            emergency_active: false,
            last_detection_time: None,
            last_alert_time: None,
            confidence_threshold: config.confidence_threshold,
            required_hits: config.required_hits.max(1),
            cooldown_secs: config.cooldown_secs,
        }
    }

    /// Apply one classification. Pure state transition; no I/O.
    pub fn observe(&mut self, result: &ClassificationResult, now: DateTime<Utc>) -> MonitorOutcome {
        if result.qualifies(self.confidence_threshold) {
            self.consecutive_hits = (self.consecutive_hits + 1).min(self.required_hits);
            self.last_detection_time = Some(now);
        } else {
            self.consecutive_hits = self.consecutive_hits.saturating_sub(1);
        }

        let edge = if !self.emergency_active && self.consecutive_hits == self.required_hits {
            self.emergency_active = true;
            Edge::Rising
        } else if self.emergency_active && self.consecutive_hits == 0 && self.hold_expired(now) {
            self.emergency_active = false;
            Edge::Falling
        } else {
            Edge::Steady
        };

        MonitorOutcome {
            emergency_active: self.emergency_active,
            confidence: result.confidence,
            edge,
        }
    }

    /// Claim the right to publish an alert at `now`.
    ///
    /// Succeeds at most once per cooldown window and records the claim.
    pub fn try_claim_alert(&mut self, now: DateTime<Utc>) -> bool {
        let allowed = match self.last_alert_time {
            None => true,
            Some(last) => now > last && seconds_between(last, now) >= self.cooldown_secs,
        };
        if allowed {
            self.last_alert_time = Some(now);
        }
        allowed
    }

    fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        match self.last_detection_time {
            Some(last) => seconds_between(last, now) >= self.cooldown_secs,
            None => true,
        }
    }
}

fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

/// Wraps one source: classifies each frame and debounces the result.
pub struct SourceMonitor {
    state: SourceState,
    classifier: Arc<dyn FrameClassifier>,
}

impl SourceMonitor {
    pub fn new(spec: &SourceSpec, config: &MonitorConfig, classifier: Arc<dyn FrameClassifier>) -> Self {
        Self {
            state: SourceState::new(spec, config),
            classifier,
        }
    }

    /// Classify a frame and update the latch.
    ///
    /// Classifier failures count as a Normal frame at zero confidence.
    pub async fn process(&mut self, frame: &Frame, now: DateTime<Utc>) -> MonitorOutcome {
        let result = self.classifier.classify(frame).await;
        self.state.observe(&result, now)
    }

    pub fn try_claim_alert(&mut self, now: DateTime<Utc>) -> bool {
        self.state.try_claim_alert(now)
    }

    pub fn state(&self) -> &SourceState {
        &self.state
    }

    pub fn source_id(&self) -> &SourceId {
        &self.state.source_id
    }

    pub fn is_active(&self) -> bool {
        self.state.emergency_active
    }
}
