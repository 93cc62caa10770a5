//! Batch result rows and the aggregate outcome

use pacer_client::RecordFields;
use std::path::{Path, PathBuf};

use crate::csv::write_row;

/// Status column value for failed rows
pub const ERROR_STATUS: &str = "ERROR";

/// Result of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowResult {
    /// Lookup succeeded
    Ok(RecordFields),
    /// Record failed; carries the reason
    Error(String),
}

/// One row of the result document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub secondary_key: Option<String>,
    pub primary_key: String,
    pub result: RowResult,
}

impl ResultRow {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.result, RowResult::Error(_))
    }

    fn columns(&self, with_secondary: bool) -> Vec<&str> {
        let mut columns = Vec::with_capacity(6);
        if with_secondary {
            columns.push(self.secondary_key.as_deref().unwrap_or(""));
        }
        columns.push(self.primary_key.as_str());
        match &self.result {
            RowResult::Ok(fields) => {
                columns.push(fields.status.as_str());
                columns.extend(fields.fields.iter().map(String::as_str));
            }
            RowResult::Error(message) => {
                columns.extend([ERROR_STATUS, message.as_str(), "", ""]);
            }
        }
        columns
    }
}

/// Aggregate of one batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Whether rows carry a secondary key column
    pub has_secondary_key: bool,
    /// Rows in source order
    pub rows: Vec<ResultRow>,
    pub success_count: usize,
    pub failure_count: usize,
    pub total: usize,
    /// Where the result document was written
    pub output_path: PathBuf,
}

impl BatchOutcome {
    /// Build an outcome from finished rows
    #[must_use]
    pub fn new(has_secondary_key: bool, rows: Vec<ResultRow>, output_path: PathBuf) -> Self {
        let failure_count = rows.iter().filter(|r| r.is_error()).count();
        Self {
            has_secondary_key,
            total: rows.len(),
            success_count: rows.len() - failure_count,
            failure_count,
            rows,
            output_path,
        }
    }

    /// True when every record succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    /// Header line of the result document
    #[must_use]
    pub fn header(&self) -> String {
        let mut columns = Vec::with_capacity(6);
        if self.has_secondary_key {
            columns.push("SecondaryKey");
        }
        columns.extend(["PrimaryKey", "Status", "Field1", "Field2", "Field3"]);
        write_row(columns)
    }

    /// Render the full result document
    #[must_use]
    pub fn to_document(&self) -> String {
        let mut out = self.header();
        out.push('\n');
        for row in &self.rows {
            out.push_str(&write_row(row.columns(self.has_secondary_key)));
            out.push('\n');
        }
        out
    }

    /// One-line outcome for task history
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Processed {} records: {} succeeded, {} failed. Results: {}",
            self.total,
            self.success_count,
            self.failure_count,
            self.output_path.display()
        )
    }
}

/// Result document location for a record source
#[must_use]
pub fn output_path_for(source: &Path, file_name: &str) -> PathBuf {
    source
        .parent()
        .map_or_else(|| PathBuf::from(file_name), |dir| dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_row(key: &str) -> ResultRow {
        ResultRow {
            secondary_key: Some("G-1".to_string()),
            primary_key: key.to_string(),
            result: RowResult::Ok(RecordFields {
                status: "ACTIVE".to_string(),
                fields: ["Ann".to_string(), "1,234.50".to_string(), "2026-03-01".to_string()],
            }),
        }
    }

    #[test]
    fn test_counts() {
        let rows = vec![
            ok_row("A-1"),
            ResultRow {
                secondary_key: None,
                primary_key: String::new(),
                result: RowResult::Error("empty identifier".to_string()),
            },
        ];
        let outcome = BatchOutcome::new(true, rows, PathBuf::from("out.csv"));
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.failure_count, 1);
        assert!(!outcome.is_success());
        assert!(outcome.summary().starts_with("Processed 2 records: 1 succeeded, 1 failed"));
    }

    #[test]
    fn test_document_escapes_fields() {
        let outcome = BatchOutcome::new(true, vec![ok_row("A-1")], PathBuf::from("out.csv"));
        let doc = outcome.to_document();
        let lines: Vec<&str> = doc.lines().collect();
        assert_eq!(lines[0], "SecondaryKey,PrimaryKey,Status,Field1,Field2,Field3");
        assert_eq!(lines[1], "G-1,A-1,ACTIVE,Ann,\"1,234.50\",2026-03-01");
    }

    #[test]
    fn test_header_without_secondary() {
        let outcome = BatchOutcome::new(false, Vec::new(), PathBuf::from("out.csv"));
        assert_eq!(outcome.header(), "PrimaryKey,Status,Field1,Field2,Field3");
        assert!(outcome.is_success());
    }

    #[test]
    fn test_output_path_next_to_source() {
        assert_eq!(
            output_path_for(Path::new("/data/in/records.txt"), "batch_results.csv"),
            PathBuf::from("/data/in/batch_results.csv")
        );
        assert_eq!(
            output_path_for(Path::new("records.txt"), "batch_results.csv"),
            PathBuf::from("batch_results.csv")
        );
    }
}
