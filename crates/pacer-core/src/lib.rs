//! Pacer Core - Scheduling Engine
//!
//! This crate provides the scheduling half of Pacer:
//! - Scheduler: task model, recurrence calculator, persistence and the
//!   schedule manager that polls and dispatches due tasks
//! - Credentials: secure strings and the credential provider interface
//!
//! The manager never talks to the network itself. It hands resolved job
//! requests to a [`scheduler::JobExecutor`] supplied by the embedding process.

#![forbid(unsafe_code)]

pub mod credentials;
pub mod scheduler;

pub use credentials::{
    resolve_pair, CredentialError, CredentialPair, CredentialProvider, CredentialRef,
    EnvCredentialProvider, MemoryCredentialProvider, SecureString,
};
pub use scheduler::{
    EventBus, Frequency, JobExecutor, JobFuture, JobParams, JobReport, JobRequest, Recurrence,
    ScheduleManager, ScheduleManagerBuilder, ScheduledTask, SchedulerConfig, SchedulerError,
    SchedulerEvent, SchedulerResult, SchedulerStore, TaskStatus, Trigger,
};
