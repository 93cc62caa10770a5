//! Scheduler task types and error definitions
//!
//! Contains the core types used by the scheduler system.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::recurrence::{self, Frequency, Recurrence};
use crate::credentials::{CredentialError, CredentialPair, CredentialRef};

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Scheduler error types
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Task not found
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
    /// Task is already executing
    #[error("task is already running: {0}")]
    AlreadyRunning(Uuid),
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Task cannot run as configured
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// Credential lookup failed
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    /// Task execution error
    #[error("execution error: {0}")]
    Execution(String),
}

/// Parameters describing the batch job a task runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParams {
    /// Record source file
    pub source: PathBuf,
    /// Credential reference pair
    pub credentials: CredentialRef,
    /// Whether records carry a secondary key column
    #[serde(default)]
    pub has_secondary_key: bool,
    /// Secondary key used when a record omits it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_secondary_key: Option<String>,
}

impl JobParams {
    /// Create job parameters for a single-key record file
    pub fn new(source: impl Into<PathBuf>, credentials: CredentialRef) -> Self {
        Self {
            source: source.into(),
            credentials,
            has_secondary_key: false,
            default_secondary_key: None,
        }
    }

    /// Records carry a secondary key, with an optional fallback value
    pub fn with_secondary_key(mut self, default: Option<String>) -> Self {
        self.has_secondary_key = true;
        self.default_secondary_key = default.filter(|d| !d.trim().is_empty());
        self
    }
}

/// Scheduled task definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task ID
    pub id: Uuid,
    /// Human-readable task name
    pub name: String,
    /// Task description
    #[serde(default)]
    pub description: Option<String>,
    /// Batch job to run
    pub job: JobParams,
    /// When the task recurs
    pub recurrence: Recurrence,
    /// Whether the task is enabled
    pub enabled: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Next scheduled execution
    pub next_run_at: Option<DateTime<Utc>>,
    /// Last execution timestamp
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    /// Whether the last execution succeeded
    #[serde(default)]
    pub last_run_successful: Option<bool>,
    /// Short human-readable outcome of the last execution
    #[serde(default)]
    pub last_run_result: Option<String>,
    /// Total execution count
    #[serde(default)]
    pub run_count: i64,
    /// Failure count
    #[serde(default)]
    pub failure_count: i64,
}

impl ScheduledTask {
    /// Create a new scheduled task
    pub fn new(name: impl Into<String>, job: JobParams, recurrence: Recurrence) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            job,
            recurrence,
            enabled: true,
            created_at: now,
            updated_at: now,
            next_run_at: None,
            last_run_at: None,
            last_run_successful: None,
            last_run_result: None,
            run_count: 0,
            failure_count: 0,
        }
    }

    /// Set task description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether the task should be dispatched at `now`
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at.is_some_and(|next| next <= now)
    }

    /// Compute the first run time from scratch (on add, edit or enable)
    pub fn schedule(&mut self, now: NaiveDateTime) {
        self.next_run_at = recurrence::next_run_time(&self.recurrence, now, None).map(from_local);
    }

    /// Recompute `next_run_at` after an execution.
    ///
    /// A `Once` task is disabled instead of rescheduled. A slot that is still
    /// ahead of `now` (a manual run ahead of schedule) is kept.
    pub fn update_next_run_time(&mut self, now: NaiveDateTime) {
        if self.recurrence.frequency == Frequency::Once {
            self.enabled = false;
            self.next_run_at = None;
            return;
        }
        let previous = self.next_run_at.map(to_local);
        if previous.is_some_and(|pending| pending > now) {
            return;
        }
        self.next_run_at = recurrence::next_run_time(&self.recurrence, now, previous).map(from_local);
    }

    /// Record the outcome of an execution and advance the schedule
    pub fn record_run(&mut self, finished_at: DateTime<Utc>, success: bool, result: impl Into<String>) {
        self.last_run_at = Some(finished_at);
        self.last_run_successful = Some(success);
        self.last_run_result = Some(result.into());
        self.run_count += 1;
        if !success {
            self.failure_count += 1;
        }
        self.update_next_run_time(to_local(finished_at));
        self.updated_at = finished_at;
    }

    /// Derive the task status
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>, executing: bool) -> TaskStatus {
        if executing {
            TaskStatus::Executing
        } else if !self.enabled {
            TaskStatus::Disabled
        } else if self.is_due(now) {
            TaskStatus::Due
        } else {
            TaskStatus::Pending
        }
    }
}

/// Observable task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Enabled and waiting for its next run time
    Pending,
    /// Next run time has passed, not yet dispatched
    Due,
    /// Dispatched and running
    Executing,
    /// Disabled by the operator or after a one-shot run
    Disabled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Due => write!(f, "due"),
            Self::Executing => write!(f, "executing"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// What caused an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Found due by the poll loop
    Scheduled,
    /// Requested explicitly through `run_now`
    Manual,
}

/// Work handed to the job executor
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Task being executed
    pub task_id: Uuid,
    /// Task name (for logging)
    pub task_name: String,
    /// Job parameters
    pub params: JobParams,
    /// Resolved credentials
    pub credentials: CredentialPair,
}

/// Result reported by the job executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Whether the job counts as successful
    pub success: bool,
    /// Human-readable summary stored as the task's last result
    pub summary: String,
}

impl JobReport {
    /// Successful report
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
        }
    }

    /// Failed report
    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
        }
    }
}

/// Convert a UTC instant to local wall-clock time
#[must_use]
pub fn to_local(at: DateTime<Utc>) -> NaiveDateTime {
    at.with_timezone(&Local).naive_local()
}

/// Convert local wall-clock time to a UTC instant.
///
/// Times skipped by a DST transition resolve one hour later.
#[must_use]
pub fn from_local(at: NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(&at)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(at + chrono::Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&at))
}
