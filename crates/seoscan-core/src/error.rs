use thiserror::Error;

/// Application-wide error types for seoscan.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (non-2xx status or protocol error).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The response arrived but its body could not be used as page content.
    #[error("Content error: {0}")]
    ContentError(String),

    /// A URL could not be parsed or is not crawlable.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A referenced scan, page or job does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    ///
    /// Transport failures and storage failures are retried at the job level;
    /// everything else would fail the same way on the next attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::Timeout(_)
                | AppError::NetworkError(_)
                | AppError::DatabaseError(_)
        )
    }
}
