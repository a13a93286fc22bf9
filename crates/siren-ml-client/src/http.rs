//! HTTP client for a remote inference service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use siren_models::{ClassificationResult, Frame, Label};

use crate::classifier::FrameClassifier;
use crate::error::{ClassifierError, ClassifierResult};

/// Unit the inference service reports confidence in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidenceScale {
    /// `[0, 100]`
    #[default]
    Percent,
    /// `[0, 1]`
    Probability,
}

impl ConfidenceScale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "percent" | "percentage" => Some(Self::Percent),
            "probability" | "unit" => Some(Self::Probability),
            _ => None,
        }
    }

    /// Convert a wire value to a percentage, rejecting values outside the scale.
    pub fn to_percent(self, raw: f64) -> ClassifierResult<f64> {
        let (max, factor) = match self {
            Self::Percent => (100.0, 1.0),
            Self::Probability => (1.0, 100.0),
        };
        if !raw.is_finite() || !(0.0..=max).contains(&raw) {
            return Err(ClassifierError::invalid_response(format!(
                "confidence {} outside [0, {}]",
                raw, max
            )));
        }
        Ok(raw * factor)
    }
}

/// Configuration for the inference service client.
#[derive(Debug, Clone)]
pub struct HttpClassifierConfig {
    /// Base URL, e.g. `http://ml:8001`
    pub base_url: String,
    /// Per-frame request timeout
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub confidence_scale: ConfidenceScale,
}

impl Default for HttpClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_millis(800),
            connect_timeout: Duration::from_secs(2),
            confidence_scale: ConfidenceScale::Percent,
        }
    }
}

impl HttpClassifierConfig {
    /// Create config from environment variables. Returns None when no service is configured.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SIREN_CLASSIFIER_URL").ok()?;
        Some(Self {
            base_url,
            timeout: Duration::from_millis(
                std::env::var("SIREN_CLASSIFIER_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(800),
            ),
            confidence_scale: std::env::var("SIREN_CLASSIFIER_CONFIDENCE_SCALE")
                .ok()
                .and_then(|s| ConfidenceScale::parse(&s))
                .unwrap_or_default(),
            ..Default::default()
        })
    }
}

/// Response body of `POST /classify`.
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: Label,
    /// In the configured [`ConfidenceScale`]
    confidence: f64,
}

/// Classifier backed by a remote inference service.
///
/// Frames are posted as raw bytes; the service answers with a label and confidence.
pub struct HttpClassifier {
    http: Client,
    endpoint: String,
    scale: ConfidenceScale,
}

impl HttpClassifier {
    pub fn new(config: HttpClassifierConfig) -> ClassifierResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("siren-ml-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/classify", config.base_url.trim_end_matches('/')),
            scale: config.confidence_scale,
        })
    }
}

#[async_trait]
impl FrameClassifier for HttpClassifier {
    async fn try_classify(&self, frame: &Frame) -> ClassifierResult<ClassificationResult> {
        if frame.data.is_empty() {
            return Err(ClassifierError::EmptyFrame);
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/octet-stream")
            .header("x-source-id", frame.source_id.as_str())
            .header("x-frame-sequence", frame.sequence.to_string())
            .body(frame.data.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::ServerError(status.as_u16(), body));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::invalid_response(e.to_string()))?;

        let confidence = self.scale.to_percent(body.confidence)?;

        debug!(
            source_id = %frame.source_id,
            sequence = frame.sequence,
            label = %body.label,
            confidence,
            "Frame classified"
        );

        Ok(ClassificationResult::new(body.label, confidence))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
