//! Exponential backoff for transient call failures
//!
//! The waits between attempts follow `initial_delay * multiplier^n`, capped
//! at `max_delay`. Delays travel through configuration as milliseconds.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Ceiling for a single wait
    #[serde(with = "millis")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Waits between consecutive attempts: d, 2d, 4d, ... up to `max_delay`
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let cap = self.max_delay;
        std::iter::successors(Some(self.initial_delay.min(cap)), move |prev| {
            let next = Duration::try_from_secs_f64(prev.as_secs_f64() * self.backoff_multiplier)
                .unwrap_or(cap);
            Some(next.min(cap))
        })
    }
}

/// The operation kept failing, or failed in a way not worth retrying
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempt(s): {last_error}")]
pub struct RetryError<E> {
    pub last_error: E,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails terminally or runs out of attempts.
///
/// `operation` receives the 1-based attempt number; errors rejected by
/// `is_retryable` end the loop at once.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: R,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Debug,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delays = config.delays();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if attempt >= max_attempts || !is_retryable(&error) {
            return Err(RetryError {
                last_error: error,
                attempts: attempt,
            });
        }
        let delay = delays.next().unwrap_or(config.max_delay);
        debug!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            ?error,
            "Backing off before next attempt"
        );
        tokio::time::sleep(delay).await;
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
