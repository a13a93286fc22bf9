//! Alert pipeline.
//!
//! This crate provides:
//! - A bounded, non-blocking alert queue shared by all source workers
//! - A single consumer forwarding alerts to an `AlertSink`
//! - Drop counting for backpressure and a deadline-bounded shutdown drain

pub mod error;
pub mod metrics;
pub mod pipeline;

pub use error::DropReason;
pub use pipeline::{
    alert_pipeline, AlertConsumer, AlertPublisher, ConsumerReport, PipelineConfig,
    PipelineSnapshot, PublishOutcome,
};
