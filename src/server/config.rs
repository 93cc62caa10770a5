//! Application configuration types
//!
//! Mirrors `config/default.toml`. Library crates own their own config
//! structs; this module only groups them into sections.

use pacer_client::{ClientConfig, NumberFormat, RateLimiterConfig};
use pacer_core::credentials::DEFAULT_ENV_PREFIX;
use pacer_core::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Data directory; defaults to the platform data dir
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub scheduler: SchedulerAppConfig,
    #[serde(default)]
    pub api: ClientConfig,
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,
    #[serde(default)]
    pub format: NumberFormat,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Resolved data directory
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir)
    }

    /// Task store location inside the data directory
    pub fn store_path(&self) -> PathBuf {
        self.data_dir().join("tasks.json")
    }

    /// Rolling log directory for headless runs
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    /// Client configuration with the top-level format applied
    pub fn client_config(&self) -> ClientConfig {
        self.api.clone().with_format(self.format.clone())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pacer")
}

/// Scheduler section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerAppConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SchedulerAppConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            drain_timeout_secs: default_drain_timeout(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl From<&SchedulerAppConfig> for SchedulerConfig {
    fn from(section: &SchedulerAppConfig) -> Self {
        SchedulerConfig::default()
            .with_check_interval(section.check_interval_secs)
            .with_drain_timeout(section.drain_timeout_secs)
            .with_event_capacity(section.event_capacity)
    }
}

fn default_check_interval() -> u64 {
    60
}

fn default_drain_timeout() -> u64 {
    30
}

fn default_event_capacity() -> usize {
    256
}

/// Credential provider section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Environment variable prefix for secret references
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
        }
    }
}

fn default_env_prefix() -> String {
    DEFAULT_ENV_PREFIX.to_string()
}

/// Log file section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// File name prefix for the daily rolling log
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
        }
    }
}

fn default_file_prefix() -> String {
    "pacer.log".to_string()
}
