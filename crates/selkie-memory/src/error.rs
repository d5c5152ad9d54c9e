//! Error types for the memory system

use thiserror::Error;

/// Result type alias for memory operations
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;

/// Memory system errors
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Database error: {reason}")]
    Database { reason: String },

    #[error("Schema mismatch: expected version {expected}, found {found}")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error("Embedding dimension mismatch: store has {store_dim}, embedder produces {embedder_dim}")]
    DimensionMismatch {
        store_dim: usize,
        embedder_dim: usize,
    },

    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("Entry not found: {id}")]
    EntryNotFound { id: String },

    #[error("Working memory budget exceeded: {tokens} tokens > {max_tokens}")]
    BudgetExceeded { tokens: u32, max_tokens: u32 },

    #[error("I/O error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Summarization failed: {reason}")]
    SummarizationFailed { reason: String },
}

impl MemoryError {
    /// Create a database error
    pub fn database(reason: impl Into<String>) -> Self {
        Self::Database {
            reason: reason.into(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error may clear on an immediate retry of the primary
    ///
    /// Schema and dimension mismatches are permanent until a rebuild; plain
    /// database and I/O errors may be transient (locked file, full disk).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database { .. } | Self::Io { .. })
    }
}

impl From<rusqlite::Error> for MemoryError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
