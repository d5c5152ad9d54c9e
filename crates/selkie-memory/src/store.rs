//! Long-term memory store: SQLite + FTS5 + sqlite-vec
//!
//! One database file holds three views of every entry: the `entries` row
//! table, the `entries_fts` keyword index (BM25) and the `entries_vec`
//! vector index (cosine). The embedding dimension is fixed at initialization
//! and recorded in `meta`; opening a store with a different dimension or
//! schema version fails, which trips the file-only fallback upstream.
//!
//! Writes are serialized with a single mutex around the connection; the
//! async facade wraps calls in `spawn_blocking`.

use crate::error::{MemoryError, MemoryResult};
use crate::types::{EntryType, MemoryEntry, Timestamp};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, Once};

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });
}

/// Serialize an f32 slice into the little-endian blob sqlite-vec expects
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    entry_type TEXT NOT NULL,
    confidence REAL NOT NULL CHECK(confidence >= 0.0 AND confidence <= 1.0),
    created_at TEXT NOT NULL,
    last_accessed_at TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    tags TEXT NOT NULL DEFAULT '[]',
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_entries_type ON entries(entry_type);
CREATE INDEX IF NOT EXISTS idx_entries_confidence ON entries(confidence);
CREATE INDEX IF NOT EXISTS idx_entries_created ON entries(created_at);

CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
    content,
    tags,
    id UNINDEXED
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Long-term memory store
pub struct LongTermStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl LongTermStore {
    /// Open (or create) the store at `path` with the given embedding dimension
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> MemoryResult<Self> {
        assert!(dimension > 0, "embedding dimension must be positive");
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MemoryError::io(parent.display().to_string(), e.to_string()))?;
        }

        load_sqlite_vec();

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", "5000")?;

        conn.execute_batch(SCHEMA_SQL)?;

        // vec0 table carries the dimension in its DDL, created separately
        let vec_sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS entries_vec USING vec0(
                id TEXT PRIMARY KEY,
                embedding FLOAT[{}] distance_metric=cosine
            )",
            dimension
        );
        conn.execute_batch(&vec_sql)?;

        Self::check_meta(&conn, dimension)?;

        tracing::info!(path = %path.display(), dimension, "long-term store opened");

        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    /// Open an in-memory store (tests)
    pub fn open_in_memory(dimension: usize) -> MemoryResult<Self> {
        load_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        let vec_sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS entries_vec USING vec0(
                id TEXT PRIMARY KEY,
                embedding FLOAT[{}] distance_metric=cosine
            )",
            dimension
        );
        conn.execute_batch(&vec_sql)?;
        Self::check_meta(&conn, dimension)?;
        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    /// Validate or install schema version and embedding dimension
    fn check_meta(conn: &Connection, dimension: usize) -> MemoryResult<()> {
        let stored_version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .ok();

        match stored_version {
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                    params![SCHEMA_VERSION.to_string()],
                )?;
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('embedding_dim', ?1)",
                    params![dimension.to_string()],
                )?;
            }
            Some(version) => {
                let found: u32 = version.parse().unwrap_or(0);
                if found != SCHEMA_VERSION {
                    return Err(MemoryError::SchemaMismatch {
                        expected: SCHEMA_VERSION,
                        found,
                    });
                }
                let stored_dim: String = conn.query_row(
                    "SELECT value FROM meta WHERE key = 'embedding_dim'",
                    [],
                    |row| row.get(0),
                )?;
                let stored_dim: usize = stored_dim.parse().unwrap_or(0);
                if stored_dim != dimension {
                    return Err(MemoryError::DimensionMismatch {
                        store_dim: stored_dim,
                        embedder_dim: dimension,
                    });
                }
            }
        }
        Ok(())
    }

    /// Embedding dimension this store was opened with
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert or replace an entry, updating all three indexes
    pub fn store(&self, entry: &MemoryEntry) -> MemoryResult<()> {
        if let Some(embedding) = &entry.embedding {
            if embedding.len() != self.dimension {
                return Err(MemoryError::DimensionMismatch {
                    store_dim: self.dimension,
                    embedder_dim: embedding.len(),
                });
            }
        }

        let conn = self.conn.lock().expect("store mutex poisoned");
        let tags = serde_json::to_string(&entry.tags)?;
        let metadata = if entry.metadata.is_null() {
            None
        } else {
            Some(serde_json::to_string(&entry.metadata)?)
        };

        conn.execute(
            "INSERT OR REPLACE INTO entries
             (id, content, entry_type, confidence, created_at, last_accessed_at,
              access_count, tags, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.id,
                entry.content,
                entry.entry_type.as_str(),
                entry.confidence as f64,
                entry.created_at.to_rfc3339(),
                entry.last_accessed_at.to_rfc3339(),
                entry.access_count as i64,
                tags,
                metadata,
            ],
        )?;

        conn.execute("DELETE FROM entries_fts WHERE id = ?1", params![entry.id])?;
        conn.execute(
            "INSERT INTO entries_fts (content, tags, id) VALUES (?1, ?2, ?3)",
            params![entry.content, entry.tags.join(" "), entry.id],
        )?;

        if let Some(embedding) = &entry.embedding {
            conn.execute("DELETE FROM entries_vec WHERE id = ?1", params![entry.id])?;
            conn.execute(
                "INSERT INTO entries_vec (id, embedding) VALUES (?1, ?2)",
                params![entry.id, embedding_to_bytes(embedding)],
            )?;
        }

        Ok(())
    }

    /// Fetch an entry by id
    pub fn get(&self, id: &str) -> MemoryResult<Option<MemoryEntry>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let result = conn.query_row(
            "SELECT id, content, entry_type, confidence, created_at,
                    last_accessed_at, access_count, tags, metadata
             FROM entries WHERE id = ?1",
            params![id],
            row_to_entry,
        );

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Nearest neighbours by cosine distance: (id, similarity) pairs
    pub fn search_by_vector(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> MemoryResult<Vec<(String, f32)>> {
        if embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                store_dim: self.dimension,
                embedder_dim: embedding.len(),
            });
        }

        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, distance FROM entries_vec
             WHERE embedding MATCH ?1 AND k = ?2
             ORDER BY distance",
        )?;
        let rows = stmt
            .query_map(
                params![embedding_to_bytes(embedding), limit as i64],
                |row| {
                    let id: String = row.get(0)?;
                    let distance: f64 = row.get(1)?;
                    Ok((id, distance))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        // cosine distance = 1 - cosine similarity
        Ok(rows
            .into_iter()
            .map(|(id, distance)| (id, (1.0 - distance) as f32))
            .collect())
    }

    /// BM25 keyword search over content and tags: (id, rank) pairs,
    /// best match first
    pub fn search_by_keyword(
        &self,
        query: &str,
        limit: usize,
    ) -> MemoryResult<Vec<(String, f64)>> {
        let escaped = escape_fts_query(query);
        if escaped.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, rank FROM entries_fts
             WHERE entries_fts MATCH ?1 ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![escaped, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Batch-fetch entries by id
    pub fn get_many(&self, ids: &[String]) -> MemoryResult<Vec<MemoryEntry>> {
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.get(id)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Increment access statistics for the given ids
    pub fn record_access(&self, ids: &[String]) -> MemoryResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("store mutex poisoned");
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare(
            "UPDATE entries SET access_count = access_count + 1,
             last_accessed_at = ?1 WHERE id = ?2",
        )?;
        for id in ids {
            stmt.execute(params![now, id])?;
        }
        Ok(())
    }

    /// Update an entry's confidence in place
    pub fn set_confidence(&self, id: &str, confidence: f32) -> MemoryResult<()> {
        assert!(
            (0.0..=1.0).contains(&confidence),
            "confidence must be within [0, 1]"
        );
        let conn = self.conn.lock().expect("store mutex poisoned");
        let changed = conn.execute(
            "UPDATE entries SET confidence = ?1 WHERE id = ?2",
            params![confidence as f64, id],
        )?;
        if changed == 0 {
            return Err(MemoryError::EntryNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Entries created after the cutoff, newest first
    pub fn get_created_after(&self, cutoff: Timestamp) -> MemoryResult<Vec<MemoryEntry>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, content, entry_type, confidence, created_at,
                    last_accessed_at, access_count, tags, metadata
             FROM entries WHERE created_at > ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![cutoff.to_rfc3339()], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Fetch the stored embedding for an entry, if any
    pub fn get_embedding(&self, id: &str) -> MemoryResult<Option<Vec<f32>>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let result: Result<Vec<u8>, _> = conn.query_row(
            "SELECT embedding FROM entries_vec WHERE id = ?1",
            params![id],
            |row| row.get(0),
        );

        match result {
            Ok(bytes) => {
                let floats = bytes
                    .chunks_exact(4)
                    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect();
                Ok(Some(floats))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an entry from all indexes; true when a row existed
    pub fn delete(&self, id: &str) -> MemoryResult<bool> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute("DELETE FROM entries_fts WHERE id = ?1", params![id])?;
        conn.execute("DELETE FROM entries_vec WHERE id = ?1", params![id])?;
        let changed = conn.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Total entry count
    pub fn count(&self) -> MemoryResult<u64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Map a row from the standard nine-column SELECT to an entry
fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryEntry> {
    let entry_type: String = row.get(2)?;
    let created_at: String = row.get(4)?;
    let last_accessed_at: String = row.get(5)?;
    let tags: String = row.get(7)?;
    let metadata: Option<String> = row.get(8)?;

    Ok(MemoryEntry {
        id: row.get(0)?,
        content: row.get(1)?,
        entry_type: EntryType::parse(&entry_type),
        confidence: row.get::<_, f64>(3)? as f32,
        created_at: created_at
            .parse()
            .unwrap_or_else(|_| chrono::Utc::now()),
        last_accessed_at: last_accessed_at
            .parse()
            .unwrap_or_else(|_| chrono::Utc::now()),
        access_count: row.get::<_, i64>(6)? as u64,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        metadata: metadata
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(serde_json::Value::Null),
        embedding: None,
    })
}

/// Escape a user query for FTS5 MATCH syntax
///
/// Wraps each whitespace-delimited word in double quotes so FTS5 treats them
/// as plain terms (implicit AND becomes OR via explicit joining below).
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| {
            let clean = word.replace('"', "");
            format!("\"{clean}\"")
        })
        .filter(|w| w != "\"\"")
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vector(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        v[hot] = 1.0;
        v
    }

    fn entry_with_embedding(content: &str, embedding: Vec<f32>) -> MemoryEntry {
        let mut entry = MemoryEntry::new(content, EntryType::Observation);
        entry.embedding = Some(embedding);
        entry
    }

    #[test]
    fn test_store_and_get() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let entry = entry_with_embedding("rust is fast", unit_vector(8, 0));
        store.store(&entry).unwrap();

        let loaded = store.get(&entry.id).unwrap().unwrap();
        assert_eq!(loaded.content, "rust is fast");
        assert_eq!(loaded.entry_type, EntryType::Observation);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        assert!(store.get("mem-missing").unwrap().is_none());
    }

    #[test]
    fn test_store_is_idempotent_by_id() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let entry = entry_with_embedding("same thing", unit_vector(8, 1));
        store.store(&entry).unwrap();
        store.store(&entry).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_vector_search_orders_by_similarity() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let near = entry_with_embedding("near", unit_vector(8, 0));
        let far = entry_with_embedding("far", unit_vector(8, 5));
        store.store(&near).unwrap();
        store.store(&far).unwrap();

        let results = store.search_by_vector(&unit_vector(8, 0), 10).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].0, near.id);
        assert!(results[0].1 > 0.99, "identical vector should score ~1.0");
    }

    #[test]
    fn test_keyword_search_matches() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let quantum = entry_with_embedding(
            "the quantum computer runs cold",
            unit_vector(8, 0),
        );
        let rust = entry_with_embedding("rust compiles to machine code", unit_vector(8, 1));
        store.store(&quantum).unwrap();
        store.store(&rust).unwrap();

        let results = store.search_by_keyword("quantum computer", 10).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].0, quantum.id);
    }

    #[test]
    fn test_keyword_search_over_tags() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let entry = entry_with_embedding("something plain", unit_vector(8, 0))
            .with_tags(vec!["deployment".to_string()]);
        store.store(&entry).unwrap();

        let results = store.search_by_keyword("deployment", 10).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_record_access_increments() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let entry = entry_with_embedding("tracked", unit_vector(8, 0));
        store.store(&entry).unwrap();

        store.record_access(&[entry.id.clone()]).unwrap();
        let loaded = store.get(&entry.id).unwrap().unwrap();
        assert_eq!(loaded.access_count, 1);

        store.record_access(&[entry.id.clone()]).unwrap();
        let loaded = store.get(&entry.id).unwrap().unwrap();
        assert_eq!(loaded.access_count, 2);
    }

    #[test]
    fn test_set_confidence() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let entry = entry_with_embedding("decayed", unit_vector(8, 0));
        store.store(&entry).unwrap();

        store.set_confidence(&entry.id, 0.35).unwrap();
        let loaded = store.get(&entry.id).unwrap().unwrap();
        assert!((loaded.confidence - 0.35).abs() < 1e-6);

        assert!(matches!(
            store.set_confidence("mem-missing", 0.5),
            Err(MemoryError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_removes_everywhere() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let entry = entry_with_embedding("short lived", unit_vector(8, 0));
        store.store(&entry).unwrap();

        assert!(store.delete(&entry.id).unwrap());
        assert!(store.get(&entry.id).unwrap().is_none());
        assert!(store.search_by_keyword("lived", 10).unwrap().is_empty());
        assert!(!store.delete(&entry.id).unwrap(), "second delete is a no-op");
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let entry = entry_with_embedding("wrong dim", unit_vector(4, 0));
        assert!(matches!(
            store.store(&entry),
            Err(MemoryError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            store.search_by_vector(&unit_vector(4, 0), 5),
            Err(MemoryError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_reopen_with_other_dimension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long_term.db");
        {
            let store = LongTermStore::open(&path, 8).unwrap();
            store
                .store(&entry_with_embedding("persisted", unit_vector(8, 0)))
                .unwrap();
        }
        let result = LongTermStore::open(&path, 16);
        assert!(matches!(
            result,
            Err(MemoryError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_get_embedding_roundtrip() {
        let store = LongTermStore::open_in_memory(8).unwrap();
        let embedding = unit_vector(8, 3);
        let entry = entry_with_embedding("vectorized", embedding.clone());
        store.store(&entry).unwrap();

        let loaded = store.get_embedding(&entry.id).unwrap().unwrap();
        assert_eq!(loaded, embedding);
    }

    #[test]
    fn test_escape_fts_query() {
        assert_eq!(escape_fts_query("hello world"), "\"hello\" OR \"world\"");
        assert_eq!(escape_fts_query("  spaces  "), "\"spaces\"");
        assert_eq!(escape_fts_query(""), "");
    }
}
