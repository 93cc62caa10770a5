//! Process-wide outbound request throttle
//!
//! Every call to the remote service passes through [`RateLimiter::acquire`].
//! Callers are serialized through a single async mutex; inside it the limiter
//! enforces a minimum spacing between requests and a cooldown after every
//! `request_count_threshold` requests.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// When false, `acquire` returns immediately
    pub enabled: bool,
    /// Minimum spacing between two requests
    pub request_interval_ms: u64,
    /// Requests allowed before a cooldown (0 disables the cooldown)
    pub request_count_threshold: u32,
    /// Cooldown length once the threshold is reached
    pub threshold_cooldown_ms: u64,
    /// Pause after the remote service answers "too many requests"
    pub rate_limit_retry_delay_ms: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_interval_ms: 500,
            request_count_threshold: 100,
            threshold_cooldown_ms: 60_000,
            rate_limit_retry_delay_ms: 30_000,
        }
    }
}

impl RateLimiterConfig {
    /// Configuration that never delays
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set request spacing
    #[must_use]
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set threshold and cooldown
    #[must_use]
    pub fn with_threshold(mut self, requests: u32, cooldown: Duration) -> Self {
        self.request_count_threshold = requests;
        self.threshold_cooldown_ms = cooldown.as_millis() as u64;
        self
    }

    /// Set the pause applied after a 429 response
    #[must_use]
    pub fn with_rate_limit_retry_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Pause applied after a 429 response
    #[must_use]
    pub fn rate_limit_retry_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_retry_delay_ms)
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    last_request: Option<Instant>,
    request_count: u32,
}

/// Shared request throttle
#[derive(Debug)]
pub struct RateLimiter {
    config: RwLock<Arc<RateLimiterConfig>>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Snapshot of the active configuration
    #[must_use]
    pub fn config(&self) -> Arc<RateLimiterConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration; acquisitions already waiting keep the old one
    pub fn configure(&self, config: RateLimiterConfig) {
        info!(
            enabled = config.enabled,
            interval_ms = config.request_interval_ms,
            threshold = config.request_count_threshold,
            cooldown_ms = config.threshold_cooldown_ms,
            "Rate limiter reconfigured"
        );
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    /// Wait until the next request may be sent.
    ///
    /// Never fails; it only delays.
    pub async fn acquire(&self) {
        let config = self.config();
        if !config.enabled {
            return;
        }

        let mut state = self.state.lock().await;

        if let Some(last) = state.last_request {
            let interval = Duration::from_millis(config.request_interval_ms);
            let elapsed = last.elapsed();
            if elapsed < interval {
                let wait = interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "Spacing outbound request");
                sleep(wait).await;
            }
        }

        let threshold = config.request_count_threshold;
        if threshold > 0 && state.request_count >= threshold {
            info!(
                requests = state.request_count,
                cooldown_ms = config.threshold_cooldown_ms,
                "Request threshold reached, cooling down"
            );
            sleep(Duration::from_millis(config.threshold_cooldown_ms)).await;
            state.request_count = 0;
        }

        state.request_count += 1;
        state.last_request = Some(Instant::now());
    }

    /// Requests counted since the last cooldown
    pub async fn request_count(&self) -> u32 {
        self.state.lock().await.request_count
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

#[cfg(test)]
mod tests;
