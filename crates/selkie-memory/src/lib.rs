//! Selkie Memory
//!
//! Three-tier memory for the assistant:
//!
//! - **Tier 0 — working memory**: a token-budgeted window over the current
//!   conversation with automatic compression ([`working`]).
//! - **Tier 1 — long-term memory**: an embedded SQLite store combining a
//!   row table, an FTS5 keyword index and a sqlite-vec vector index, queried
//!   through hybrid recall with recency/importance/frequency scoring
//!   ([`store`], [`retrieval`]).
//! - **Tier 2 — raw event log**: an append-only JSONL file from which the
//!   store can be rebuilt ([`raw_log`]).
//!
//! When the primary backend cannot be opened or an operation on it fails,
//! the system degrades to a file-only backend with substring search
//! ([`fallback`]). The public surface is [`MemorySystem`]: `capture`,
//! `recall`, `consolidate`.

pub mod consolidation;
pub mod embedder;
pub mod error;
pub mod fallback;
pub mod raw_log;
pub mod retrieval;
pub mod store;
pub mod system;
pub mod types;
pub mod working;

pub use consolidation::{ConsolidationStats, Consolidator, Summarizer};
pub use embedder::{cosine_similarity, Embedder, HttpEmbedder, MockEmbedder};
pub use error::{MemoryError, MemoryResult};
pub use fallback::FallbackStore;
pub use raw_log::RawEventLog;
pub use retrieval::{RecalledEntry, RetrievalConfig};
pub use store::LongTermStore;
pub use system::{MemorySystem, MemorySystemConfig};
pub use types::{EntryType, MemoryEntry, Timestamp};
pub use working::{estimate_tokens, WorkingMemory, WorkingMemoryConfig};
