//! Pacer Batch - record files through the record service
//!
//! [`BatchRunner`] reads a line-oriented record source, calls the record
//! service for every record and writes a comma-separated result document
//! next to the source. [`job_executor`] plugs a runner into the schedule
//! manager.

#![forbid(unsafe_code)]

pub mod csv;
pub mod error;
pub mod job;
pub mod outcome;
pub mod runner;
pub mod source;

pub use error::{BatchError, Result};
pub use job::job_executor;
pub use outcome::{BatchOutcome, ResultRow, RowResult};
pub use runner::{BatchJob, BatchProgress, BatchRunner, ProgressFn, DEFAULT_OUTPUT_FILE};
pub use source::{parse_record, read_records, Record, RecordShape};
