//! Resilient record service client
//!
//! Each call waits on the shared [`RateLimiter`], sends one request document,
//! classifies the response and retries transient failures with exponential
//! backoff. Business rejections come back as [`CallOutcome::Rejected`], never
//! as errors.

use async_trait::async_trait;
use pacer_core::credentials::CredentialPair;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ClientError, Result, TransientFailure};
use crate::protocol::{classify, ApiRequest, Classified, NumberFormat, RecordFields};
use crate::rate_limiter::RateLimiter;
use crate::retry::{retry_with_backoff, RetryConfig, RetryError};
use crate::transport::{ReqwestTransport, Transport};

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service endpoint URL
    pub endpoint: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Retry policy
    pub retry: RetryConfig,
    /// Field formatting
    pub format: NumberFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost/api/records".to_string(),
            timeout_secs: 30,
            retry: RetryConfig::default(),
            format: NumberFormat::default(),
        }
    }
}

impl ClientConfig {
    /// Set endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set formatting
    #[must_use]
    pub fn with_format(mut self, format: NumberFormat) -> Self {
        self.format = format;
        self
    }

    /// Per-call timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Result of a call that reached the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The operation succeeded
    Success(RecordFields),
    /// Well-formed negative answer (not found, bad key, ...)
    Rejected {
        /// Fault code, when the service sent a fault envelope
        code: Option<String>,
        /// Reason text
        message: String,
    },
}

impl CallOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Operations the batch runner needs from the remote service
#[async_trait]
pub trait RecordService: Send + Sync {
    /// Look a record up by primary key
    async fn lookup(&self, primary_key: &str, credentials: &CredentialPair) -> Result<CallOutcome>;

    /// Refresh a secondary entity
    async fn refresh(&self, secondary_key: &str, credentials: &CredentialPair)
        -> Result<CallOutcome>;
}

/// Outcome of a single attempt, before retry policy is applied
#[derive(Debug)]
enum AttemptError {
    Transient(TransientFailure),
    Terminal(ClientError),
}

/// Rate-limited, retrying client
pub struct ResilientApiClient {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
    format: NumberFormat,
    timeout: Duration,
}

impl std::fmt::Debug for ResilientApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientApiClient")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ResilientApiClient {
    /// Create a client over any transport
    pub fn new(transport: Arc<dyn Transport>, limiter: Arc<RateLimiter>, config: &ClientConfig) -> Self {
        Self {
            transport,
            limiter,
            retry: config.retry.clone(),
            format: config.format.clone(),
            timeout: config.timeout(),
        }
    }

    /// Create a client speaking HTTPS to the configured endpoint
    pub fn from_config(config: &ClientConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.endpoint, config.timeout())?;
        Ok(Self::new(Arc::new(transport), limiter, config))
    }

    /// The shared limiter
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Issue a request, retrying transient failures
    pub async fn call(
        &self,
        request: &ApiRequest,
        credentials: &CredentialPair,
    ) -> Result<CallOutcome> {
        let body = request.encode(credentials)?;
        let body = body.as_str();
        let operation = request.operation();

        let result = retry_with_backoff(
            &self.retry,
            |attempt| self.attempt(attempt, operation, body),
            |e| matches!(e, AttemptError::Transient(_)),
        )
        .await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(RetryError {
                last_error: AttemptError::Transient(last),
                attempts,
            }) => {
                warn!(operation, key = %request.key(), attempts, cause = %last, "Call failed");
                Err(ClientError::RetriesExhausted { attempts, last })
            }
            Err(RetryError {
                last_error: AttemptError::Terminal(e),
                ..
            }) => Err(e),
        }
    }

    async fn attempt(
        &self,
        attempt: u32,
        operation: &str,
        body: &str,
    ) -> std::result::Result<CallOutcome, AttemptError> {
        self.limiter.acquire().await;
        debug!(operation, attempt, "Calling record service");

        let response = tokio::time::timeout(self.timeout, self.transport.send(body.to_string()))
            .await
            .map_err(|_| AttemptError::Transient(TransientFailure::Timeout))?
            .map_err(AttemptError::Transient)?;

        match classify(response.status, &response.body) {
            Classified::Document(document) if document.success => Ok(CallOutcome::Success(
                RecordFields::from_document(&document, &self.format),
            )),
            Classified::Document(document) => Ok(CallOutcome::Rejected {
                code: None,
                message: document
                    .message
                    .unwrap_or_else(|| "operation was not successful".to_string()),
            }),
            Classified::Fault(fault) => Ok(CallOutcome::Rejected {
                code: (!fault.code.is_empty()).then_some(fault.code),
                message: fault.message,
            }),
            Classified::Transient(TransientFailure::RateLimited) => {
                let delay = self.limiter.config().rate_limit_retry_delay();
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited by remote service, pausing"
                );
                tokio::time::sleep(delay).await;
                Err(AttemptError::Transient(TransientFailure::RateLimited))
            }
            Classified::Transient(failure) => Err(AttemptError::Transient(failure)),
            Classified::Terminal { status, body } => {
                Err(AttemptError::Terminal(ClientError::Http { status, body }))
            }
        }
    }
}

#[async_trait]
impl RecordService for ResilientApiClient {
    async fn lookup(&self, primary_key: &str, credentials: &CredentialPair) -> Result<CallOutcome> {
        self.call(&ApiRequest::lookup(primary_key), credentials).await
    }

    async fn refresh(
        &self,
        secondary_key: &str,
        credentials: &CredentialPair,
    ) -> Result<CallOutcome> {
        self.call(&ApiRequest::refresh(secondary_key), credentials).await
    }
}
