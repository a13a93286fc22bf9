//! Classifier error types.

use thiserror::Error;

pub type ClassifierResult<T> = Result<T, ClassifierError>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Inference request failed: {0}")]
    RequestFailed(String),

    #[error("Inference service returned {0}: {1}")]
    ServerError(u16, String),

    #[error("Invalid inference response: {0}")]
    InvalidResponse(String),

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ClassifierError {
    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifierError::RequestFailed(_) => "request_failed",
            ClassifierError::ServerError(_, _) => "server_error",
            ClassifierError::InvalidResponse(_) => "invalid_response",
            ClassifierError::EmptyFrame => "empty_frame",
            ClassifierError::Network(_) => "network",
        }
    }
}
