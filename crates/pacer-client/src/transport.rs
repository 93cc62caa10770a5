//! HTTP transport seam
//!
//! The client speaks to the remote service through [`Transport`] so that the
//! retry and classification logic can be exercised without a network.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::{ClientError, Result, TransientFailure};

/// Raw HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// Status code
    pub status: u16,
    /// Body text
    pub body: String,
}

impl TransportResponse {
    /// Build a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one request document and returns the raw response
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body`; connection-level failures are transient
    async fn send(&self, body: String) -> std::result::Result<TransportResponse, TransientFailure>;
}

/// HTTPS transport backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    endpoint: String,
}

impl ReqwestTransport {
    /// Create a transport posting to `endpoint` with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, body: String) -> std::result::Result<TransportResponse, TransientFailure> {
        debug!(endpoint = %self.endpoint, bytes = body.len(), "Sending request");

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(TransportResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransientFailure {
    if e.is_timeout() {
        TransientFailure::Timeout
    } else {
        TransientFailure::Connection(e.to_string())
    }
}
