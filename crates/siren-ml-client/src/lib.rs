//! Frame classifier capability.
//!
//! This crate provides:
//! - The `FrameClassifier` trait with fail-safe classification
//! - An HTTP client for a remote inference service
//! - A scripted classifier for tests and replays

pub mod classifier;
pub mod error;
pub mod http;

pub use classifier::{FrameClassifier, ScriptedClassifier};
pub use error::{ClassifierError, ClassifierResult};
pub use http::{ConfidenceScale, HttpClassifier, HttpClassifierConfig};
