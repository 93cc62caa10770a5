//! Batch error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Whole-batch failures; record-level problems never surface here
#[derive(Debug, Error)]
pub enum BatchError {
    /// Record source does not exist
    #[error("record source not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// Record source is a directory or other non-file
    #[error("record source is not a file: {}", .0.display())]
    SourceNotFile(PathBuf),

    /// Record source has no records
    #[error("record source is empty: {}", .0.display())]
    SourceEmpty(PathBuf),

    /// Reading the record source failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the result document failed
    #[error("failed to write results to {}: {source}", path.display())]
    Write {
        /// Destination path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}
