//! Shared data models for the emergency vehicle monitoring core.
//!
//! This crate provides Serde-serializable types for:
//! - Sources, locations and feed health
//! - Frames and classifier results
//! - Alert events and dispatch records
//! - Movement tracker entries and inferred transitions
//! - Traffic signal state snapshots

pub mod alert;
pub mod classification;
pub mod dispatch;
pub mod frame;
pub mod movement;
pub mod signal;
pub mod source;

// Re-export common types
pub use alert::{AlertEvent, AlertId};
pub use classification::{ClassificationResult, Label};
pub use dispatch::{DispatchRecord, DispatchStage, ServiceKind};
pub use frame::{Frame, FrameRef};
pub use movement::{TrackerEntry, Transition};
pub use signal::{SignalPhase, SignalState};
pub use source::{FeedStatus, LocationId, SourceHealth, SourceId, SourceSpec};
