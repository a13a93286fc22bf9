//! Alert store error types.

use thiserror::Error;

/// Result type for alert store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting or forwarding an alert.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited by sink")]
    RateLimited,

    #[error("Delivery budget exhausted after {0} attempts")]
    BudgetExhausted(u32),

    #[error("Alert rejected: {0}")]
    Rejected(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 => Self::RateLimited,
            500..=599 => Self::ServerError(status, body),
            400..=499 => Self::Rejected(format!("HTTP {}: {}", status, body)),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Network(_)
                | StoreError::RateLimited
                | StoreError::ServerError(_, _)
                | StoreError::Unavailable(_)
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::RequestFailed(_) => "request_failed",
            StoreError::ServerError(_, _) => "server_error",
            StoreError::RateLimited => "rate_limited",
            StoreError::BudgetExhausted(_) => "budget_exhausted",
            StoreError::Rejected(_) => "rejected",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Network(_) => "network",
            StoreError::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_http_status_429() {
        let err = StoreError::from_http_status(429, "slow down");
        assert!(matches!(err, StoreError::RateLimited));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_from_http_status_503() {
        let err = StoreError::from_http_status(503, "unavailable");
        assert!(matches!(err, StoreError::ServerError(503, _)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_from_http_status_400() {
        let err = StoreError::from_http_status(400, "bad alert");
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(!err.is_retryable());
    }
}
