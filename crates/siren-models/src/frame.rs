//! Frames delivered by ingestion feeds.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::SourceId;

/// One raw frame pulled from a source feed.
///
/// The pixel payload is opaque to the monitoring core; only the classifier
/// looks inside it. The buffer is reference counted so an alert can keep the
/// frame alive without copying it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub source_id: SourceId,
    /// Per-source sequence number, monotonically increasing in arrival order
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub data: Arc<[u8]>,
}

impl Frame {
    pub fn new(source_id: SourceId, sequence: u64, captured_at: DateTime<Utc>, data: Vec<u8>) -> Self {
        Self {
            source_id,
            sequence,
            captured_at,
            data: data.into(),
        }
    }

    /// Opaque reference to this frame for inclusion in alerts.
    pub fn reference(&self) -> FrameRef {
        FrameRef {
            source_id: self.source_id.clone(),
            sequence: self.sequence,
            captured_at: self.captured_at,
            size_bytes: self.data.len(),
        }
    }
}

/// Serializable handle to a frame that triggered an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameRef {
    pub source_id: SourceId,
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub size_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_carries_identity() {
        let now = Utc::now();
        let frame = Frame::new(SourceId::from("cam-2"), 17, now, vec![0u8; 32]);
        let r = frame.reference();

        assert_eq!(r.source_id.as_str(), "cam-2");
        assert_eq!(r.sequence, 17);
        assert_eq!(r.captured_at, now);
        assert_eq!(r.size_bytes, 32);
    }
}
