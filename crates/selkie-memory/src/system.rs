//! The memory system facade
//!
//! External callers use `capture`, `recall` and `consolidate` only. The
//! facade owns the primary SQLite store, the raw event log, the fallback
//! directory and the embedder, and handles degradation: when the primary
//! cannot be opened or an operation on it fails, calls are served by the
//! file-only fallback. Once tripped, fallback is sticky for the process
//! lifetime except for one primary retry per call on transient failures.

use crate::consolidation::{ConsolidationStats, Consolidator, Summarizer};
use crate::embedder::Embedder;
use crate::error::{MemoryError, MemoryResult};
use crate::fallback::FallbackStore;
use crate::raw_log::RawEventLog;
use crate::retrieval::{self, RetrievalConfig};
use crate::store::LongTermStore;
use crate::types::{EntryType, MemoryEntry};
use selkie_core::metrics::{Metrics, SharedMetrics};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Configuration for the memory system
#[derive(Debug, Clone)]
pub struct MemorySystemConfig {
    /// Directory holding `long_term.db`, `raw.jsonl` and `fallback/`
    pub data_dir: PathBuf,
    /// Retrieval weights and score floor
    pub retrieval: RetrievalConfig,
}

impl MemorySystemConfig {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            retrieval: RetrievalConfig::default(),
        }
    }

    /// Create with operator-tuned settings applied
    pub fn with_settings(
        data_dir: impl AsRef<Path>,
        settings: &selkie_core::config::MemoryConfig,
    ) -> Self {
        let mut config = Self::new(data_dir);
        config.retrieval.score_min = settings.recall_score_min;
        config
    }
}

/// Snapshot of memory system state
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub primary_entries: Option<u64>,
    pub fallback_entries: usize,
    pub using_fallback: bool,
}

/// Three-tier memory system with degraded fallback
pub struct MemorySystem {
    config: MemorySystemConfig,
    /// Primary backend; None when it failed to initialize
    primary: Option<Arc<LongTermStore>>,
    fallback: FallbackStore,
    raw_log: RawEventLog,
    embedder: Arc<dyn Embedder>,
    summarizer: Option<Arc<dyn Summarizer>>,
    /// Set after the first primary operation failure
    using_fallback: AtomicBool,
    metrics: SharedMetrics,
}

impl MemorySystem {
    /// Open the memory system under `config.data_dir`
    ///
    /// A primary that fails to open is logged and replaced by the fallback
    /// for the process lifetime; this constructor only fails when the
    /// fallback directory itself is unusable.
    pub fn open(
        config: MemorySystemConfig,
        embedder: Arc<dyn Embedder>,
        summarizer: Option<Arc<dyn Summarizer>>,
        metrics: SharedMetrics,
    ) -> MemoryResult<Self> {
        let db_path = config.data_dir.join("long_term.db");
        let primary = match LongTermStore::open(&db_path, embedder.dimension()) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                tracing::warn!(error = %e, "primary memory backend unavailable, using fallback");
                None
            }
        };

        let fallback = FallbackStore::open(config.data_dir.join("fallback"))?;
        let raw_log = RawEventLog::open(config.data_dir.join("raw.jsonl"))?;

        let using_fallback = primary.is_none();
        if using_fallback {
            Metrics::incr(&metrics.memory_fallback_total);
        }

        Ok(Self {
            config,
            primary,
            fallback,
            raw_log,
            embedder,
            summarizer,
            using_fallback: AtomicBool::new(using_fallback),
            metrics,
        })
    }

    /// Whether the system is currently degraded
    pub fn is_degraded(&self) -> bool {
        self.using_fallback.load(Ordering::Relaxed)
    }

    fn trip_fallback(&self, error: &MemoryError) {
        if !self.using_fallback.swap(true, Ordering::Relaxed) {
            tracing::warn!(error = %error, "memory primary failed, degrading to fallback");
        }
        Metrics::incr(&self.metrics.memory_fallback_total);
    }

    /// Whether a primary attempt should be made for this call
    ///
    /// Healthy: always. Degraded: one retry per call, and only when the
    /// primary exists at all.
    fn primary_for_attempt(&self) -> Option<&Arc<LongTermStore>> {
        self.primary.as_ref()
    }

    /// Capture a memory entry
    ///
    /// Appends to the raw event log first (the log is the rebuild source),
    /// then writes to the primary or fallback backend. Returns the entry id.
    pub async fn capture(
        &self,
        content: impl Into<String>,
        entry_type: EntryType,
        tags: Vec<String>,
        metadata: serde_json::Value,
    ) -> MemoryResult<String> {
        let content = content.into();
        assert!(!content.is_empty(), "capture content must not be empty");

        let mut entry = MemoryEntry::new(content, entry_type)
            .with_tags(tags)
            .with_metadata(metadata);

        Metrics::incr(&self.metrics.memory_captures_total);
        self.raw_log.append(&entry)?;

        // Embedding failure is not fatal; the entry remains keyword-searchable
        match self.embedder.embed(&entry.content).await {
            Ok(embedding) => entry.embedding = Some(embedding),
            Err(e) => {
                tracing::debug!(error = %e, "embedding failed, storing without vector");
            }
        }

        let id = entry.id.clone();

        if let Some(primary) = self.primary_for_attempt() {
            let primary = Arc::clone(primary);
            let to_store = entry.clone();
            let result =
                tokio::task::spawn_blocking(move || primary.store(&to_store))
                    .await
                    .map_err(|e| MemoryError::database(format!("join error: {}", e)))?;

            match result {
                Ok(()) => {
                    if self.is_degraded() {
                        tracing::debug!("primary store succeeded while degraded");
                    }
                    return Ok(id);
                }
                Err(e) => self.trip_fallback(&e),
            }
        }

        self.fallback.store(&entry)?;
        Ok(id)
    }

    /// Recall memories relevant to `query`, formatted as a context string
    ///
    /// Empty string when nothing scores above the configured floor.
    pub async fn recall(&self, query: &str, top_k: usize) -> MemoryResult<String> {
        Metrics::incr(&self.metrics.memory_recalls_total);

        if let Some(primary) = self.primary_for_attempt() {
            let embedding = match self.embedder.embed(query).await {
                Ok(e) => Some(e),
                Err(_) => None,
            };

            let primary = Arc::clone(primary);
            let query_owned = query.to_string();
            let config = self.config.retrieval.clone();
            let result = tokio::task::spawn_blocking(move || {
                retrieval::recall(
                    &primary,
                    &query_owned,
                    embedding.as_deref(),
                    top_k,
                    &config,
                )
            })
            .await
            .map_err(|e| MemoryError::database(format!("join error: {}", e)))?;

            match result {
                Ok(results) => {
                    return Ok(retrieval::format_context(
                        &results,
                        selkie_core::AGENT_MEMORY_CONTEXT_CHARS_MAX,
                    ));
                }
                Err(e) => self.trip_fallback(&e),
            }
        }

        let results = self.fallback.search(query, top_k)?;
        if results.is_empty() {
            return Ok(String::new());
        }
        let lines: Vec<String> = results
            .iter()
            .map(|e| format!("- [{}] {}", e.entry_type.as_str(), e.content))
            .collect();
        Ok(lines.join("\n"))
    }

    /// Run one consolidation pass (no-op in fallback mode)
    pub async fn consolidate(&self) -> MemoryResult<ConsolidationStats> {
        let Some(primary) = self.primary_for_attempt() else {
            tracing::debug!("consolidation skipped: fallback mode");
            return Ok(ConsolidationStats::default());
        };

        let consolidator = Consolidator::new(primary, self.summarizer.as_deref());
        match consolidator.run().await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                self.trip_fallback(&e);
                Ok(ConsolidationStats::default())
            }
        }
    }

    /// Current state snapshot
    pub fn stats(&self) -> MemoryStats {
        let primary_entries = self
            .primary
            .as_ref()
            .and_then(|store| store.count().ok());
        MemoryStats {
            primary_entries,
            fallback_entries: self.fallback.count(),
            using_fallback: self.is_degraded(),
        }
    }

    /// Rebuild the primary store from the raw event log
    ///
    /// Used by operators after a dimension change or corruption; entries are
    /// re-embedded with the current embedder.
    pub async fn rebuild_from_log(&self) -> MemoryResult<usize> {
        let Some(primary) = self.primary.as_ref() else {
            return Err(MemoryError::database("no primary backend to rebuild"));
        };

        let entries = self.raw_log.load_all()?;
        let mut restored = 0;
        for mut entry in entries {
            if let Ok(embedding) = self.embedder.embed(&entry.content).await {
                entry.embedding = Some(embedding);
            }
            let primary = Arc::clone(primary);
            let to_store = entry.clone();
            tokio::task::spawn_blocking(move || primary.store(&to_store))
                .await
                .map_err(|e| MemoryError::database(format!("join error: {}", e)))??;
            restored += 1;
        }
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::MockEmbedder;

    fn system(dir: &Path) -> MemorySystem {
        MemorySystem::open(
            MemorySystemConfig::new(dir),
            Arc::new(MockEmbedder::new(16)),
            None,
            Metrics::new_shared(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_capture_then_recall() {
        let dir = tempfile::tempdir().unwrap();
        let memory = system(dir.path());

        memory
            .capture(
                "User prefers Python 3.12 with uv",
                EntryType::Fact,
                vec!["preferences".to_string()],
                serde_json::Value::Null,
            )
            .await
            .unwrap();

        let context = memory
            .recall("what python tooling does the user like?", 5)
            .await
            .unwrap();
        assert!(context.contains("Python 3.12"));
        assert!(context.contains("uv"));
    }

    #[tokio::test]
    async fn test_capture_writes_raw_log() {
        let dir = tempfile::tempdir().unwrap();
        let memory = system(dir.path());

        memory
            .capture("logged event", EntryType::Event, vec![], serde_json::Value::Null)
            .await
            .unwrap();

        let log = RawEventLog::open(dir.path().join("raw.jsonl")).unwrap();
        let entries = log.load_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "logged event");
    }

    #[tokio::test]
    async fn test_recall_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let memory = system(dir.path());
        let context = memory.recall("anything", 5).await.unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_stats_reflect_captures() {
        let dir = tempfile::tempdir().unwrap();
        let memory = system(dir.path());
        memory
            .capture("one", EntryType::Event, vec![], serde_json::Value::Null)
            .await
            .unwrap();

        let stats = memory.stats();
        assert_eq!(stats.primary_entries, Some(1));
        assert!(!stats.using_fallback);
    }

    #[tokio::test]
    async fn test_rebuild_from_log() {
        let dir = tempfile::tempdir().unwrap();
        {
            let memory = system(dir.path());
            memory
                .capture("rebuild me", EntryType::Fact, vec![], serde_json::Value::Null)
                .await
                .unwrap();
        }

        // Fresh system over the same directory
        let memory = system(dir.path());
        let restored = memory.rebuild_from_log().await.unwrap();
        assert_eq!(restored, 1);
        let context = memory.recall("rebuild", 5).await.unwrap();
        assert!(context.contains("rebuild me"));
    }

    #[tokio::test]
    async fn test_with_settings_applies_recall_floor() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = selkie_core::config::MemoryConfig::default();
        settings.recall_score_min = 0.42;

        let config = MemorySystemConfig::with_settings(dir.path(), &settings);
        assert!((config.retrieval.score_min - 0.42).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_consolidate_runs() {
        let dir = tempfile::tempdir().unwrap();
        let memory = system(dir.path());
        for content in ["meeting at nine", "meeting moved to ten"] {
            memory
                .capture(
                    content,
                    EntryType::Event,
                    vec!["meetings".to_string()],
                    serde_json::Value::Null,
                )
                .await
                .unwrap();
        }

        let stats = memory.consolidate().await.unwrap();
        assert_eq!(stats.collected, 2);
        assert_eq!(stats.summaries_created, 1);
    }
}
