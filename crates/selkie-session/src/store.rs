//! JSONL-backed session store
//!
//! Layout under the sessions directory:
//!
//! ```text
//! sessions/
//! ├── sessions.jsonl      index, one summary per line
//! ├── transcripts/        append-only per-session transcripts
//! │   └── agent_main_cli_u1.jsonl
//! └── archive/            idle sessions moved out of the index
//! ```
//!
//! Transcripts are append-only from the application's perspective; the only
//! compaction is an explicit archive. Per-key async locks serialize
//! same-session operations while different sessions proceed in parallel.

use crate::key::SessionKey;
use crate::types::{Session, SessionMessage, SessionSummary};
use chrono::Utc;
use selkie_core::{Error, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Session store
pub struct SessionStore {
    base_dir: PathBuf,
    /// Index of known sessions
    index: RwLock<HashMap<String, SessionSummary>>,
    /// Per-key locks serializing same-session operations
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    /// Open the store, loading the index from disk
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(base_dir.join("transcripts"))
            .map_err(|e| Error::storage_write_failed(base_dir.display().to_string(), e.to_string()))?;
        std::fs::create_dir_all(base_dir.join("archive"))
            .map_err(|e| Error::storage_write_failed(base_dir.display().to_string(), e.to_string()))?;

        let mut index = HashMap::new();
        let index_path = base_dir.join("sessions.jsonl");
        if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path).map_err(|e| {
                Error::storage_read_failed(index_path.display().to_string(), e.to_string())
            })?;
            for (line_number, line) in raw.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<SessionSummary>(line) {
                    Ok(summary) => {
                        // Normalize legacy key forms on load
                        let canonical = SessionKey::parse(&summary.session_key)
                            .map(|k| k.canonical())
                            .unwrap_or_else(|_| summary.session_key.clone());
                        let mut summary = summary;
                        summary.session_key = canonical.clone();
                        index.insert(canonical, summary);
                    }
                    Err(e) => {
                        tracing::warn!(line = line_number + 1, error = %e, "skipping bad index line");
                    }
                }
            }
        }

        tracing::info!(dir = %base_dir.display(), sessions = index.len(), "session store opened");

        Ok(Self {
            base_dir,
            index: RwLock::new(index),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// The lock guarding a session key
    ///
    /// Callers hold this across an agent turn so concurrent requests to one
    /// session are queued in arrival order.
    pub async fn key_lock(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.canonical())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn index_path(&self) -> PathBuf {
        self.base_dir.join("sessions.jsonl")
    }

    fn transcript_path(&self, key: &SessionKey) -> PathBuf {
        self.base_dir
            .join("transcripts")
            .join(format!("{}.jsonl", key.sanitized()))
    }

    fn archive_path(&self, key: &SessionKey) -> PathBuf {
        self.base_dir
            .join("archive")
            .join(format!("{}.jsonl", key.sanitized()))
    }

    /// Rewrite the index file from the in-memory map
    async fn persist_index(&self) -> Result<()> {
        let index = self.index.read().await;
        let mut lines: Vec<String> = Vec::with_capacity(index.len());
        for summary in index.values() {
            lines.push(serde_json::to_string(summary)?);
        }
        drop(index);

        let path = self.index_path();
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        std::fs::write(&path, content)
            .map_err(|e| Error::storage_write_failed(path.display().to_string(), e.to_string()))
    }

    /// Fetch a session, creating it on miss; never fails on a missing key
    pub async fn get_or_create(&self, key: &SessionKey) -> Session {
        {
            let index = self.index.read().await;
            if let Some(summary) = index.get(&key.canonical()) {
                return Session {
                    key: key.clone(),
                    created_at: summary.created_at,
                    updated_at: summary.updated_at,
                    buffered: Vec::new(),
                };
            }
        }
        Session::new(key.clone())
    }

    /// Fetch a session snapshot, None when unknown
    pub async fn get(&self, key: &SessionKey) -> Option<Session> {
        let index = self.index.read().await;
        index.get(&key.canonical()).map(|summary| Session {
            key: key.clone(),
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            buffered: Vec::new(),
        })
    }

    /// Flush a session's buffered messages to its transcript and update the
    /// index; the buffer is cleared on success
    pub async fn save(&self, session: &mut Session) -> Result<()> {
        if !session.buffered.is_empty() {
            let path = self.transcript_path(&session.key);
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    Error::storage_write_failed(path.display().to_string(), e.to_string())
                })?;
            for message in &session.buffered {
                let line = serde_json::to_string(message)?;
                writeln!(file, "{}", line).map_err(|e| {
                    Error::storage_write_failed(path.display().to_string(), e.to_string())
                })?;
            }
            session.buffered.clear();
        }

        session.updated_at = Utc::now();
        {
            let mut index = self.index.write().await;
            index.insert(session.key.canonical(), session.summary());
        }
        self.persist_index().await
    }

    /// Read the most recent `limit` transcript messages for a session
    pub async fn history(&self, key: &SessionKey, limit: usize) -> Result<Vec<SessionMessage>> {
        let path = self.transcript_path(key);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::storage_read_failed(path.display().to_string(), e.to_string()))?;

        let mut messages: Vec<SessionMessage> = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(message) = serde_json::from_str(line) {
                messages.push(message);
            }
        }

        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        Ok(messages)
    }

    /// Sessions ordered by `updated_at` descending, optionally filtered by
    /// agent
    pub async fn list_sessions(&self, agent_id: Option<&str>) -> Vec<SessionSummary> {
        let index = self.index.read().await;
        let mut sessions: Vec<SessionSummary> = index
            .values()
            .filter(|s| agent_id.map(|a| s.agent_id == a).unwrap_or(true))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    /// Hard-delete a session: index entry and transcript
    ///
    /// Idempotent; deleting an unknown key returns false.
    pub async fn delete(&self, key: &SessionKey) -> Result<bool> {
        let existed = {
            let mut index = self.index.write().await;
            index.remove(&key.canonical()).is_some()
        };

        let path = self.transcript_path(key);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| {
                Error::storage_write_failed(path.display().to_string(), e.to_string())
            })?;
        }

        if existed {
            self.persist_index().await?;
        }
        Ok(existed)
    }

    /// Move sessions idle for more than `days` to the archive directory
    ///
    /// Returns the number of sessions archived.
    pub async fn archive_old_sessions(&self, days: u32) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(days as i64);
        let stale: Vec<SessionSummary> = {
            let index = self.index.read().await;
            index
                .values()
                .filter(|s| s.updated_at < cutoff)
                .cloned()
                .collect()
        };

        let mut archived = 0;
        for summary in stale {
            let Ok(key) = SessionKey::parse(&summary.session_key) else {
                continue;
            };
            let transcript = self.transcript_path(&key);
            if transcript.exists() {
                let target = self.archive_path(&key);
                std::fs::rename(&transcript, &target).map_err(|e| {
                    Error::storage_write_failed(target.display().to_string(), e.to_string())
                })?;
            }
            self.index.write().await.remove(&summary.session_key);
            archived += 1;
            tracing::info!(session = %summary.session_key, "archived idle session");
        }

        if archived > 0 {
            self.persist_index().await?;
        }
        Ok(archived)
    }
}
