//! Rotom error types

use std::time::Duration;

/// Rotom error types
#[derive(Debug, thiserror::Error)]
pub enum RotomError {
    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    Decode(String),

    // Fail-fast guard
    #[error("circuit open for '{operation}', retrying in {retry_in:?}")]
    CircuitOpen {
        operation: &'static str,
        retry_in: Duration,
    },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Cache persistence errors
    #[error("cache persistence error: {0}")]
    Persist(#[from] std::io::Error),
}

impl RotomError {
    /// Whether this error is worth retrying.
    ///
    /// Connection failures, timeouts, rate limits, and 5xx responses are
    /// transient. Decode errors are not: retrying will not fix a bad
    /// payload. Explicit not-found never reaches this path, since upstream
    /// 404s surface as `Ok(None)`, not as errors.
    pub fn is_transient(&self) -> bool {
        match self {
            RotomError::Http(_) | RotomError::Timeout | RotomError::RateLimited { .. } => true,
            RotomError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Upstream `Retry-After` hint, if one was provided.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RotomError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Map a reqwest transport error onto the taxonomy.
    ///
    /// Timeouts are distinguished so the retry policy can tell them from
    /// body-decode failures (which must not be retried).
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RotomError::Timeout
        } else if err.is_decode() {
            RotomError::Decode(err.to_string())
        } else {
            RotomError::Http(err.to_string())
        }
    }
}

/// Result type alias for Rotom operations
pub type Result<T> = std::result::Result<T, RotomError>;
