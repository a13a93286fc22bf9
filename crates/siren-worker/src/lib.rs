//! Emergency vehicle monitoring worker.
//!
//! This crate provides:
//! - Per-source detection debouncing with a cooldown latch
//! - Hysteretic signal control with priority override
//! - A sliding-window movement tracker
//! - The coordinator wiring sources, alerts and signals together
//! - Reconnect with fixed backoff and degraded-source reporting

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod retry;
pub mod signal;
pub mod simulation;
pub mod status;
pub mod tracker;

pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{CoordinatorConfig, FeedConfig, MonitorConfig, SignalConfig, TrackerConfig};
pub use coordinator::{Coordinator, MonitoringSession, SessionHandle, SessionReport};
pub use error::{WorkerError, WorkerResult};
pub use feed::{FeedError, FeedResult, FeedStep, FrameSource, ScriptedFeed};
pub use logging::{init_tracing, SourceLogger};
pub use monitor::{Edge, MonitorOutcome, SourceMonitor, SourceState};
pub use signal::{SignalController, SignalEvent};
pub use simulation::{marker_payload, MarkerClassifier, SyntheticConfig, SyntheticFeed};
pub use status::{log_status, StatusSnapshot};
pub use tracker::{CorrelationStrategy, MovementTracker, NearestInTime};
