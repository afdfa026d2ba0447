//! Source adapter error types.

use thiserror::Error;

/// Errors that can occur when talking to an external service.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP transport error (DNS, connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the service.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// Credentials were rejected.
    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Failed to parse a service response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The service's request quota is exhausted.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// A session could not be established or was used before connecting.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

impl SourceError {
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
