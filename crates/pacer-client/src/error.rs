//! Error types for the record service client

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// A failure worth retrying
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransientFailure {
    /// The request exceeded the per-call timeout
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established or was dropped
    #[error("connection failed: {0}")]
    Connection(String),

    /// HTTP 5xx
    #[error("server error: HTTP {0}")]
    ServerError(u16),

    /// HTTP 429
    #[error("rate limited by remote service")]
    RateLimited,

    /// HTTP 408
    #[error("remote service reported a request timeout")]
    RequestTimeout,

    /// Empty body or a body without a response document
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Every attempt failed with a transient cause
    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Cause of the final attempt's failure
        last: TransientFailure,
    },

    /// Non-retryable HTTP status without a fault envelope
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Transport could not be constructed
    #[error("transport error: {0}")]
    Transport(String),

    /// Request document could not be encoded
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ClientError {
    /// The transient cause, when retries were exhausted
    #[must_use]
    pub fn transient_cause(&self) -> Option<&TransientFailure> {
        match self {
            Self::RetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}
