//! Batch runner
//!
//! Reads a record source, calls the record service once per record (plus a
//! refresh for records with a secondary key) and writes the result document
//! next to the source. Per-record failures become error rows; only source
//! and output failures abort the batch.

use pacer_client::{CallOutcome, RecordService};
use pacer_core::credentials::CredentialPair;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{BatchError, Result};
use crate::outcome::{output_path_for, BatchOutcome, ResultRow, RowResult};
use crate::source::{read_records, Record, RecordShape};

/// Default result document name
pub const DEFAULT_OUTPUT_FILE: &str = "batch_results.csv";

/// Progress after each record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Progress callback
pub type ProgressFn = Arc<dyn Fn(BatchProgress) + Send + Sync>;

/// One batch invocation
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Record source file
    pub source: PathBuf,
    /// Line layout
    pub shape: RecordShape,
    /// Resolved credentials embedded in every call
    pub credentials: CredentialPair,
}

impl BatchJob {
    /// Create a job for a single-key source
    pub fn new(source: impl Into<PathBuf>, credentials: CredentialPair) -> Self {
        Self {
            source: source.into(),
            shape: RecordShape::primary_only(),
            credentials,
        }
    }

    /// Set the record layout
    #[must_use]
    pub fn with_shape(mut self, shape: RecordShape) -> Self {
        self.shape = shape;
        self
    }
}

/// Runs record sources through a [`RecordService`]
#[derive(Clone)]
pub struct BatchRunner {
    service: Arc<dyn RecordService>,
    output_file: String,
    progress: Option<ProgressFn>,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("output_file", &self.output_file)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Create a runner over a record service
    pub fn new(service: Arc<dyn RecordService>) -> Self {
        Self {
            service,
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            progress: None,
        }
    }

    /// Override the result document name
    #[must_use]
    pub fn with_output_file(mut self, name: impl Into<String>) -> Self {
        self.output_file = name.into();
        self
    }

    /// Report progress after every record
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run one batch
    pub async fn run(&self, job: &BatchJob) -> Result<BatchOutcome> {
        let records = read_records(&job.source, &job.shape).await?;
        let total = records.len();
        info!(source = %job.source.display(), total, "Starting batch");

        let mut rows = Vec::with_capacity(total);
        let mut progress = BatchProgress {
            processed: 0,
            total,
            succeeded: 0,
            failed: 0,
        };

        for record in records {
            let row = self.process(&record, &job.credentials).await;
            if row.is_error() {
                progress.failed += 1;
            } else {
                progress.succeeded += 1;
            }
            progress.processed += 1;
            rows.push(row);

            if let Some(report) = &self.progress {
                report(progress);
            }
        }

        let output_path = output_path_for(&job.source, &self.output_file);
        let outcome = BatchOutcome::new(job.shape.has_secondary_key, rows, output_path);

        tokio::fs::write(&outcome.output_path, outcome.to_document())
            .await
            .map_err(|source| BatchError::Write {
                path: outcome.output_path.clone(),
                source,
            })?;

        info!(
            total = outcome.total,
            succeeded = outcome.success_count,
            failed = outcome.failure_count,
            output = %outcome.output_path.display(),
            "Batch finished"
        );
        Ok(outcome)
    }

    async fn process(&self, record: &Record, credentials: &CredentialPair) -> ResultRow {
        let row = |result| ResultRow {
            secondary_key: record.secondary_key.clone(),
            primary_key: record.primary_key.clone(),
            result,
        };

        if record.primary_key.is_empty() {
            warn!(line = record.line, "Skipping record with empty identifier");
            return row(RowResult::Error("empty identifier".to_string()));
        }

        if let Some(secondary) = &record.secondary_key {
            match self.service.refresh(secondary, credentials).await {
                Ok(CallOutcome::Success(_)) => debug!(line = record.line, "Refreshed secondary key"),
                Ok(CallOutcome::Rejected { message, .. }) => {
                    warn!(line = record.line, secondary = %secondary, reason = %message, "Refresh rejected");
                }
                Err(e) => {
                    warn!(line = record.line, secondary = %secondary, error = %e, "Refresh failed");
                }
            }
        }

        match self.service.lookup(&record.primary_key, credentials).await {
            Ok(CallOutcome::Success(fields)) => row(RowResult::Ok(fields)),
            Ok(CallOutcome::Rejected { code, message }) => {
                debug!(line = record.line, code = ?code, reason = %message, "Lookup rejected");
                row(RowResult::Error(message))
            }
            Err(e) => {
                warn!(line = record.line, error = %e, "Lookup failed");
                row(RowResult::Error(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests;
