//! Record source parsing
//!
//! A record source is a line-oriented text file. Each line holds either a
//! primary key, or a `secondary,primary` pair when the job says records carry
//! a secondary key. Blank lines are kept so that they surface as failed rows.

use std::path::Path;

use crate::csv::parse_line;
use crate::error::{BatchError, Result};

/// How lines of a record source are laid out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordShape {
    /// Lines carry a secondary key before the primary key
    pub has_secondary_key: bool,
    /// Secondary key for lines that only carry a primary key
    pub default_secondary_key: Option<String>,
}

impl RecordShape {
    /// Single-key lines
    #[must_use]
    pub fn primary_only() -> Self {
        Self::default()
    }

    /// `secondary,primary` lines with an optional fallback secondary key
    #[must_use]
    pub fn with_secondary(default: Option<String>) -> Self {
        Self {
            has_secondary_key: true,
            default_secondary_key: default.filter(|d| !d.trim().is_empty()),
        }
    }
}

/// One unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number
    pub line: usize,
    /// Secondary key, refreshed before the lookup
    pub secondary_key: Option<String>,
    /// Primary key; may be empty
    pub primary_key: String,
}

/// Parse one line
#[must_use]
pub fn parse_record(line_no: usize, line: &str, shape: &RecordShape) -> Record {
    let line = line.trim();
    if !shape.has_secondary_key {
        return Record {
            line: line_no,
            secondary_key: None,
            primary_key: line.to_string(),
        };
    }

    let fields: Vec<String> = parse_line(line)
        .into_iter()
        .map(|f| f.trim().to_string())
        .collect();

    let (secondary, primary) = match fields.as_slice() {
        [single] => (shape.default_secondary_key.clone(), single.clone()),
        [secondary, primary, ..] => {
            let secondary = if secondary.is_empty() {
                shape.default_secondary_key.clone()
            } else {
                Some(secondary.clone())
            };
            (secondary, primary.clone())
        }
        [] => (shape.default_secondary_key.clone(), String::new()),
    };

    Record {
        line: line_no,
        secondary_key: secondary,
        primary_key: primary,
    }
}

/// Parse every line of a source text
#[must_use]
pub fn parse_records(text: &str, shape: &RecordShape) -> Vec<Record> {
    let lines: Vec<&str> = text.lines().collect();
    // trailing blank lines are file padding, not records
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(0, |i| i + 1);

    lines[..end]
        .iter()
        .enumerate()
        .map(|(i, line)| parse_record(i + 1, line, shape))
        .collect()
}

/// Read and parse a record source, failing on a missing or empty file
pub async fn read_records(path: &Path, shape: &RecordShape) -> Result<Vec<Record>> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BatchError::SourceMissing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Err(BatchError::SourceNotFile(path.to_path_buf()));
    }

    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8_lossy(&bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let records = parse_records(text, shape);
    if records.is_empty() {
        return Err(BatchError::SourceEmpty(path.to_path_buf()));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_key_lines_trimmed() {
        let records = parse_records("  A-1  \nA-2\n", &RecordShape::primary_only());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].primary_key, "A-1");
        assert_eq!(records[0].secondary_key, None);
        assert_eq!(records[1].line, 2);
    }

    #[test]
    fn test_blank_line_kept_trailing_dropped() {
        let records = parse_records("A-1\n\nA-3\n\n  \n", &RecordShape::primary_only());
        assert_eq!(records.len(), 3);
        assert!(records[1].primary_key.is_empty());
    }

    #[test]
    fn test_secondary_key_pair() {
        let shape = RecordShape::with_secondary(Some("G-0".to_string()));
        let pair = parse_record(1, "G-7, A-1", &shape);
        assert_eq!(pair.secondary_key.as_deref(), Some("G-7"));
        assert_eq!(pair.primary_key, "A-1");

        let single = parse_record(2, "A-2", &shape);
        assert_eq!(single.secondary_key.as_deref(), Some("G-0"));
        assert_eq!(single.primary_key, "A-2");

        let missing_primary = parse_record(3, "G-7,", &shape);
        assert!(missing_primary.primary_key.is_empty());
    }

    #[test]
    fn test_secondary_without_default() {
        let shape = RecordShape::with_secondary(Some("  ".to_string()));
        assert_eq!(shape.default_secondary_key, None);
        assert_eq!(parse_record(1, "A-1", &shape).secondary_key, None);
    }

    #[tokio::test]
    async fn test_read_missing_and_empty() {
        let dir = TempDir::new().unwrap();
        let shape = RecordShape::primary_only();

        let missing = dir.path().join("nope.txt");
        assert!(matches!(
            read_records(&missing, &shape).await,
            Err(BatchError::SourceMissing(_))
        ));

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "\n \n").unwrap();
        assert!(matches!(
            read_records(&empty, &shape).await,
            Err(BatchError::SourceEmpty(_))
        ));

        assert!(matches!(
            read_records(dir.path(), &shape).await,
            Err(BatchError::SourceNotFile(_))
        ));
    }

    #[tokio::test]
    async fn test_read_strips_bom() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.txt");
        std::fs::write(&path, "\u{feff}A-1\r\nA-2\r\n").unwrap();

        let records = read_records(&path, &RecordShape::primary_only()).await.unwrap();
        assert_eq!(records[0].primary_key, "A-1");
        assert_eq!(records[1].primary_key, "A-2");
    }
}
