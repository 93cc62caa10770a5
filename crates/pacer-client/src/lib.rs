//! Pacer Client - rate-limited, retrying access to the remote record service
//!
//! This crate provides:
//! - A process-wide [`RateLimiter`] shared by every caller
//! - Retry with exponential backoff for transient failures
//! - Request encoding, response classification and field formatting
//! - [`ResilientApiClient`], the [`RecordService`] used by batch runs

#![forbid(unsafe_code)]

pub mod client;
pub mod error;
pub mod protocol;
pub mod rate_limiter;
pub mod retry;
pub mod transport;

pub use client::{CallOutcome, ClientConfig, RecordService, ResilientApiClient};
pub use error::{ClientError, Result, TransientFailure};
pub use protocol::{classify, ApiRequest, Classified, NumberFormat, RecordFields};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{retry_with_backoff, RetryConfig, RetryError};
pub use transport::{ReqwestTransport, Transport, TransportResponse};
