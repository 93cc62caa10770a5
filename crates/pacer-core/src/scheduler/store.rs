//! Scheduler task storage using a JSON document
//!
//! Persists scheduled tasks for durability across restarts. Writes go to a
//! sibling temp file first and are renamed into place, so a crash never leaves
//! a half-written store behind.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::scheduler::types::{Result, ScheduledTask, SchedulerError};

/// Current document version
const STORE_VERSION: u32 = 1;

/// On-disk document layout
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    tasks: Vec<ScheduledTask>,
}

/// File-backed scheduler store
#[derive(Debug)]
pub struct SchedulerStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SchedulerStore {
    /// Create a store at `path`, creating the parent directory if needed
    pub fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SchedulerError::InvalidConfig(format!("Failed to create directory: {}", e))
            })?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Well-known store location: `<data_dir>/pacer/tasks.json`
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pacer")
            .join("tasks.json")
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all tasks; a missing file is an empty store
    pub async fn load(&self) -> Result<Vec<ScheduledTask>> {
        read_document(&self.path).await
    }

    /// Replace the stored collection
    pub async fn save(&self, tasks: &[ScheduledTask]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_document(&self.path, tasks).await?;
        debug!(path = %self.path.display(), count = tasks.len(), "Task store saved");
        Ok(())
    }
}

/// Read a task document from any path
pub async fn read_document(path: &Path) -> Result<Vec<ScheduledTask>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let doc: StoreDocument = serde_json::from_slice(&bytes)?;
    if doc.version > STORE_VERSION {
        return Err(SchedulerError::InvalidConfig(format!(
            "Unsupported task store version {} in {}",
            doc.version,
            path.display()
        )));
    }
    Ok(doc.tasks)
}

/// Write a task document to any path via temp file + rename
pub async fn write_document(path: &Path, tasks: &[ScheduledTask]) -> Result<()> {
    let doc = StoreDocument {
        version: STORE_VERSION,
        tasks: tasks.to_vec(),
    };
    let json = serde_json::to_vec_pretty(&doc)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
