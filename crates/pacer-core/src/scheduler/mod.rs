//! Scheduler - recurring batch job scheduling
//!
//! Decides when each task is due and drives its execution:
//!
//! - **Recurrence**: once, daily, weekly, monthly plus hourly, minute,
//!   bi-weekly, quarterly, multiple-times-daily and workday rules
//! - **Persistence**: the whole collection lives in one JSON document
//! - **Dispatch**: due tasks run concurrently, one execution per task id
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ ScheduleManager │  Poll loop, run-now, outcome recording
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ SchedulerStore  │  JSON persistence
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Recurrence    │  Next-run calculation
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   JobExecutor   │  Batch job callback
//! └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pacer_core::scheduler::{
//!     JobParams, Recurrence, ScheduleManager, ScheduledTask, SchedulerConfig, SchedulerStore,
//! };
//!
//! let manager = ScheduleManager::builder()
//!     .store(SchedulerStore::from_path(&SchedulerStore::default_path())?)
//!     .credentials(provider)
//!     .executor(executor)
//!     .config(SchedulerConfig::new().with_check_interval(60))
//!     .build()
//!     .await?;
//!
//! let task = ScheduledTask::new(
//!     "nightly accounts",
//!     JobParams::new("/data/accounts.txt", CredentialRef::new("acct-key", "acct-secret")),
//!     Recurrence::daily(start, 1),
//! );
//! manager.add_task(task).await?;
//!
//! manager.run(shutdown_token).await?;
//! ```

mod engine;
mod events;
pub mod recurrence;
mod store;
mod types;

pub use engine::{JobExecutor, JobFuture, ScheduleManager, ScheduleManagerBuilder, SchedulerConfig};
pub use events::{EventBus, SchedulerEvent};
pub use recurrence::{next_run_time, Frequency, MonthSet, Recurrence, WeekdaySet};
pub use store::{read_document, write_document, SchedulerStore};
pub use types::{
    from_local, to_local, JobParams, JobReport, JobRequest, Result as SchedulerResult,
    ScheduledTask, SchedulerError, TaskStatus, Trigger,
};
