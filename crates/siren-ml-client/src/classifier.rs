//! The frame classifier capability.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use metrics::counter;
use tracing::warn;

use siren_models::{ClassificationResult, Frame};

use crate::error::{ClassifierError, ClassifierResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const CLASSIFIER_FAILURES_TOTAL: &str = "siren_classifier_failures_total";
}

/// Black-box image classifier.
///
/// Implementors report failures through `try_classify`; callers use
/// `classify`, which never fails and degrades to the lowest-confidence
/// Normal result.
#[async_trait]
pub trait FrameClassifier: Send + Sync {
    /// Classify a frame, surfacing any internal failure.
    async fn try_classify(&self, frame: &Frame) -> ClassifierResult<ClassificationResult>;

    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Classify a frame, treating every failure as "no detection".
    async fn classify(&self, frame: &Frame) -> ClassificationResult {
        match self.try_classify(frame).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    source_id = %frame.source_id,
                    sequence = frame.sequence,
                    classifier = self.name(),
                    "Classification failed, treating frame as normal: {}", e
                );
                counter!(
                    names::CLASSIFIER_FAILURES_TOTAL,
                    "kind" => e.kind()
                )
                .increment(1);
                ClassificationResult::fallback()
            }
        }
    }
}

/// Classifier that replays a fixed script of results.
///
/// Once the script is exhausted every frame gets `exhausted`.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<ClassifierResult<ClassificationResult>>>,
    exhausted: ClassificationResult,
}

impl ScriptedClassifier {
    pub fn new(results: impl IntoIterator<Item = ClassificationResult>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().map(Ok).collect()),
            exhausted: ClassificationResult::fallback(),
        }
    }

    /// Build from raw steps, including failures.
    pub fn with_steps(steps: impl IntoIterator<Item = ClassifierResult<ClassificationResult>>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            exhausted: ClassificationResult::fallback(),
        }
    }

    /// Result returned after the script runs out.
    pub fn then_always(mut self, result: ClassificationResult) -> Self {
        self.exhausted = result;
        self
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl FrameClassifier for ScriptedClassifier {
    async fn try_classify(&self, _frame: &Frame) -> ClassifierResult<ClassificationResult> {
        let next = self
            .script
            .lock()
            .map_err(|_| ClassifierError::request_failed("script lock poisoned"))?
            .pop_front();
        next.unwrap_or(Ok(self.exhausted))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use siren_models::{Label, SourceId};

    fn frame() -> Frame {
        Frame::new(SourceId::from("cam-1"), 0, Utc::now(), vec![1, 2, 3])
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let classifier = ScriptedClassifier::new([
            ClassificationResult::emergency(92.0),
            ClassificationResult::normal(60.0),
        ]);

        assert_eq!(classifier.classify(&frame()).await, ClassificationResult::emergency(92.0));
        assert_eq!(classifier.classify(&frame()).await, ClassificationResult::normal(60.0));
        assert_eq!(classifier.remaining(), 0);
        assert_eq!(classifier.classify(&frame()).await, ClassificationResult::fallback());
    }

    #[tokio::test]
    async fn test_failure_degrades_to_fallback() {
        let classifier = ScriptedClassifier::with_steps([
            Err(ClassifierError::request_failed("model crashed")),
            Ok(ClassificationResult::emergency(80.0)),
        ]);

        let degraded = classifier.classify(&frame()).await;
        assert_eq!(degraded.label, Label::Normal);
        assert_eq!(degraded.confidence, 0.0);
        assert_eq!(classifier.classify(&frame()).await.label, Label::Emergency);
    }

    #[tokio::test]
    async fn test_then_always() {
        let classifier =
            ScriptedClassifier::new([]).then_always(ClassificationResult::emergency(99.0));
        assert_eq!(classifier.classify(&frame()).await.confidence, 99.0);
        assert_eq!(classifier.classify(&frame()).await.confidence, 99.0);
    }
}
