//! Raw event log: append-only JSONL of every captured entry
//!
//! The log is the tier-2 source of truth; the long-term store can be rebuilt
//! from it without consulting the database.

use crate::error::{MemoryError, MemoryResult};
use crate::types::MemoryEntry;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only JSONL log of captured entries
pub struct RawEventLog {
    path: PathBuf,
}

impl RawEventLog {
    /// Open the log at `path`, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MemoryError::io(parent.display().to_string(), e.to_string()))?;
        }
        Ok(Self { path })
    }

    /// Append one entry as a JSON line
    pub fn append(&self, entry: &MemoryEntry) -> MemoryResult<()> {
        let mut slim = entry.clone();
        slim.embedding = None;

        let line = serde_json::to_string(&slim)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MemoryError::io(self.path.display().to_string(), e.to_string()))?;
        writeln!(file, "{}", line)
            .map_err(|e| MemoryError::io(self.path.display().to_string(), e.to_string()))?;
        Ok(())
    }

    /// Load all entries in append order, skipping unparseable lines
    pub fn load_all(&self) -> MemoryResult<Vec<MemoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| MemoryError::io(self.path.display().to_string(), e.to_string()))?;

        let mut entries = Vec::new();
        for (line_number, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(line = line_number + 1, error = %e, "skipping bad raw log line");
                }
            }
        }
        Ok(entries)
    }
}
