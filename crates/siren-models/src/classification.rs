//! Per-frame classifier output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class assigned to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Emergency,
    #[default]
    Normal,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Emergency => "emergency",
            Label::Normal => "normal",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Label plus confidence percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidence: f64,
}

impl ClassificationResult {
    /// Create a result, clamping confidence into `[0, 100]`. NaN becomes 0.
    pub fn new(label: Label, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 100.0)
        };
        Self { label, confidence }
    }

    pub fn emergency(confidence: f64) -> Self {
        Self::new(Label::Emergency, confidence)
    }

    pub fn normal(confidence: f64) -> Self {
        Self::new(Label::Normal, confidence)
    }

    /// Lowest-confidence Normal result, used whenever classification fails.
    pub fn fallback() -> Self {
        Self::normal(0.0)
    }

    /// True when this frame counts toward arming an emergency.
    pub fn qualifies(&self, threshold: f64) -> bool {
        self.label == Label::Emergency && self.confidence >= threshold
    }
}
