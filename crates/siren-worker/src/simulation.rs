//! Synthetic sources for running the worker without cameras.
//!
//! [`SyntheticFeed`] produces frames at a fixed rate with periodic emergency
//! bursts. Each frame carries a two-byte marker (kind, confidence) that
//! [`MarkerClassifier`] decodes, standing in for a real model.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use siren_ml_client::{ClassifierError, ClassifierResult, FrameClassifier};
use siren_models::{ClassificationResult, Frame, SourceId};

use crate::feed::{FeedError, FeedResult, FrameSource};

const MARKER_NORMAL: u8 = 0;
const MARKER_EMERGENCY: u8 = 1;

/// Encode a marker frame payload.
pub fn marker_payload(emergency: bool, confidence: u8) -> Vec<u8> {
    let kind = if emergency { MARKER_EMERGENCY } else { MARKER_NORMAL };
    vec![kind, confidence.min(100)]
}

/// Synthetic feed settings.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub frame_interval: Duration,
    /// Frames per cycle
    pub cycle_frames: u64,
    /// Leading frames of each cycle that show an emergency vehicle
    pub burst_frames: u64,
    /// Fail a read every N frames to exercise reconnects
    pub dropout_every: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(200),
            cycle_frames: 300,
            burst_frames: 25,
            dropout_every: None,
        }
    }
}

impl SyntheticConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frame_interval: Duration::from_millis(
                std::env::var("SIREN_SYNTHETIC_FRAME_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(200),
            ),
            cycle_frames: std::env::var("SIREN_SYNTHETIC_CYCLE_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u64| *n > 0)
                .unwrap_or(defaults.cycle_frames),
            burst_frames: std::env::var("SIREN_SYNTHETIC_BURST_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.burst_frames),
            dropout_every: std::env::var("SIREN_SYNTHETIC_DROPOUT_EVERY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u64| *n > 0),
        }
    }
}

pub struct SyntheticFeed {
    source_id: SourceId,
    config: SyntheticConfig,
    /// Shifts the burst so sources do not fire in lockstep
    phase_offset: u64,
    sequence: u64,
    ticks: u64,
}

impl SyntheticFeed {
    pub fn new(source_id: SourceId, config: SyntheticConfig, phase_offset: u64) -> Self {
        Self {
            source_id,
            config,
            phase_offset,
            sequence: 0,
            ticks: 0,
        }
    }

    fn is_burst(&self) -> bool {
        let cycle = self.config.cycle_frames.max(1);
        (self.sequence + self.phase_offset) % cycle < self.config.burst_frames
    }

    fn confidence(&self) -> u8 {
        // Deterministic wobble in 80..=97
        80 + ((self.sequence * 7 + self.phase_offset) % 18) as u8
    }
}

#[async_trait]
impl FrameSource for SyntheticFeed {
    async fn next_frame(&mut self) -> FeedResult<Option<Frame>> {
        tokio::time::sleep(self.config.frame_interval).await;
        self.ticks += 1;

        if let Some(every) = self.config.dropout_every {
            if self.ticks % every == 0 {
                return Err(FeedError::disconnected("synthetic dropout"));
            }
        }

        let payload = if self.is_burst() {
            marker_payload(true, self.confidence())
        } else {
            marker_payload(false, 90)
        };
        let frame = Frame::new(self.source_id.clone(), self.sequence, Utc::now(), payload);
        self.sequence += 1;
        Ok(Some(frame))
    }

    async fn reconnect(&mut self) -> FeedResult<()> {
        Ok(())
    }
}

/// Decodes synthetic marker frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerClassifier;

#[async_trait]
impl FrameClassifier for MarkerClassifier {
    async fn try_classify(&self, frame: &Frame) -> ClassifierResult<ClassificationResult> {
        match &frame.data[..] {
            [] => Err(ClassifierError::EmptyFrame),
            [MARKER_EMERGENCY, confidence, ..] => Ok(ClassificationResult::emergency(f64::from(*confidence))),
            [MARKER_NORMAL, confidence, ..] => Ok(ClassificationResult::normal(f64::from(*confidence))),
            _ => Err(ClassifierError::invalid_response("unrecognised frame marker")),
        }
    }

    fn name(&self) -> &'static str {
        "marker"
    }
}
