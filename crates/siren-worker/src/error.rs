//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Source already registered: {0}")]
    DuplicateSource(String),

    #[error("Session already started")]
    AlreadyStarted,

    #[error("Feed error: {0}")]
    Feed(#[from] crate::feed::FeedError),

    #[error("Store error: {0}")]
    Store(#[from] siren_store::StoreError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] siren_ml_client::ClassifierError),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn duplicate_source(source_id: impl Into<String>) -> Self {
        Self::DuplicateSource(source_id.into())
    }

    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Feed(_) | WorkerError::Io(_) => true,
            WorkerError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::from(crate::feed::FeedError::disconnected("gone")).is_retryable());
        assert!(!WorkerError::config_error("bad").is_retryable());
        assert!(!WorkerError::AlreadyStarted.is_retryable());
    }
}
