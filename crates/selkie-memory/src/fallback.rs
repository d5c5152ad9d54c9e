//! File-only fallback backend
//!
//! Engaged when the primary SQLite store cannot be opened or an operation on
//! it fails. Each entry lives in its own JSON file under `fallback/`, with a
//! small `index.json` for enumeration. Search is case-insensitive substring
//! matching over content and tags; no vectors, no ranking beyond recency.

use crate::error::{MemoryError, MemoryResult};
use crate::types::MemoryEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Index line for one stored entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRecord {
    id: String,
    content_preview: String,
    entry_type: String,
    created_at: String,
}

/// Degraded file-per-entry memory store
pub struct FallbackStore {
    dir: PathBuf,
    index: std::sync::Mutex<HashMap<String, IndexRecord>>,
}

impl FallbackStore {
    /// Open (or create) the fallback directory
    pub fn open(dir: impl AsRef<Path>) -> MemoryResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| MemoryError::io(dir.display().to_string(), e.to_string()))?;

        let index_path = dir.join("index.json");
        let index = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path)
                .map_err(|e| MemoryError::io(index_path.display().to_string(), e.to_string()))?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(dir = %dir.display(), entries = index.len(), "fallback store opened");

        Ok(Self {
            dir,
            index: std::sync::Mutex::new(index),
        })
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn persist_index(&self, index: &HashMap<String, IndexRecord>) -> MemoryResult<()> {
        let path = self.dir.join("index.json");
        let raw = serde_json::to_string_pretty(index)?;
        std::fs::write(&path, raw)
            .map_err(|e| MemoryError::io(path.display().to_string(), e.to_string()))
    }

    /// Store an entry (embedding is ignored in fallback mode)
    pub fn store(&self, entry: &MemoryEntry) -> MemoryResult<()> {
        let mut slim = entry.clone();
        slim.embedding = None;

        let path = self.entry_path(&entry.id);
        let raw = serde_json::to_string_pretty(&slim)?;
        std::fs::write(&path, raw)
            .map_err(|e| MemoryError::io(path.display().to_string(), e.to_string()))?;

        let mut index = self.index.lock().expect("fallback mutex poisoned");
        index.insert(
            entry.id.clone(),
            IndexRecord {
                id: entry.id.clone(),
                content_preview: entry.content.chars().take(100).collect(),
                entry_type: entry.entry_type.as_str().to_string(),
                created_at: entry.created_at.to_rfc3339(),
            },
        );
        self.persist_index(&index)
    }

    /// Fetch one entry
    pub fn get(&self, id: &str) -> MemoryResult<Option<MemoryEntry>> {
        let path = self.entry_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| MemoryError::io(path.display().to_string(), e.to_string()))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Case-insensitive substring search over content and tags
    ///
    /// Results are ordered newest-first; access statistics are updated for
    /// every returned entry, matching the primary's recall contract.
    pub fn search(&self, query: &str, top_k: usize) -> MemoryResult<Vec<MemoryEntry>> {
        let needle = query.to_lowercase();
        let ids: Vec<String> = {
            let index = self.index.lock().expect("fallback mutex poisoned");
            index.keys().cloned().collect()
        };

        let mut matches = Vec::new();
        for id in ids {
            if let Some(entry) = self.get(&id)? {
                let haystack = format!(
                    "{} {}",
                    entry.content.to_lowercase(),
                    entry.tags.join(" ").to_lowercase()
                );
                // Match when any query word appears
                let hit = needle
                    .split_whitespace()
                    .any(|word| haystack.contains(word));
                if hit {
                    matches.push(entry);
                }
            }
        }

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches.truncate(top_k);

        for entry in &mut matches {
            entry.record_access();
            let path = self.entry_path(&entry.id);
            let raw = serde_json::to_string_pretty(&entry)?;
            std::fs::write(&path, raw)
                .map_err(|e| MemoryError::io(path.display().to_string(), e.to_string()))?;
        }

        Ok(matches)
    }

    /// Delete an entry; true when it existed
    pub fn delete(&self, id: &str) -> MemoryResult<bool> {
        let path = self.entry_path(id);
        let existed = path.exists();
        if existed {
            std::fs::remove_file(&path)
                .map_err(|e| MemoryError::io(path.display().to_string(), e.to_string()))?;
        }
        let mut index = self.index.lock().expect("fallback mutex poisoned");
        index.remove(id);
        self.persist_index(&index)?;
        Ok(existed)
    }

    /// Number of indexed entries
    pub fn count(&self) -> usize {
        self.index.lock().expect("fallback mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryType;

    #[test]
    fn test_store_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FallbackStore::open(dir.path()).unwrap();

        let entry = MemoryEntry::new("fallback content", EntryType::Fact);
        store.store(&entry).unwrap();

        let loaded = store.get(&entry.id).unwrap().unwrap();
        assert_eq!(loaded.content, "fallback content");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_search_substring() {
        let dir = tempfile::tempdir().unwrap();
        let store = FallbackStore::open(dir.path()).unwrap();

        store
            .store(&MemoryEntry::new(
                "User prefers Python 3.12 with uv",
                EntryType::Fact,
            ))
            .unwrap();
        store
            .store(&MemoryEntry::new("Weather was sunny", EntryType::Event))
            .unwrap();

        let results = store.search("python tooling", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("Python 3.12"));
    }

    #[test]
    fn test_search_updates_access_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = FallbackStore::open(dir.path()).unwrap();

        let entry = MemoryEntry::new("accessed content", EntryType::Fact);
        store.store(&entry).unwrap();

        store.search("accessed", 5).unwrap();
        let loaded = store.get(&entry.id).unwrap().unwrap();
        assert_eq!(loaded.access_count, 1);
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let entry = MemoryEntry::new("durable", EntryType::Fact);
        {
            let store = FallbackStore::open(dir.path()).unwrap();
            store.store(&entry).unwrap();
        }
        let store = FallbackStore::open(dir.path()).unwrap();
        assert_eq!(store.count(), 1);
        assert!(store.get(&entry.id).unwrap().is_some());
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FallbackStore::open(dir.path()).unwrap();

        let entry = MemoryEntry::new("to remove", EntryType::Event);
        store.store(&entry).unwrap();
        assert!(store.delete(&entry.id).unwrap());
        assert!(!store.delete(&entry.id).unwrap());
        assert_eq!(store.count(), 0);
    }
}
