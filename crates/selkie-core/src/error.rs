//! Error types for Selkie
//!
//! Explicit error types with context, using thiserror.

use thiserror::Error;

/// Result type alias for Selkie operations
pub type Result<T> = std::result::Result<T, Error>;

/// Selkie error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("Frame too large: {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Unknown method: {method}")]
    UnknownMethod { method: String },

    // =========================================================================
    // Auth / Validation Errors
    // =========================================================================
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("Invalid session key: {key}, reason: {reason}")]
    InvalidSessionKey { key: String, reason: String },

    // =========================================================================
    // Downstream Errors
    // =========================================================================
    #[error("LLM call failed: {reason}")]
    LlmFailed { reason: String },

    #[error("LLM call timed out after {timeout_ms} ms")]
    LlmTimeout { timeout_ms: u64 },

    #[error("Tool execution failed: {tool}, reason: {reason}")]
    ToolFailed { tool: String, reason: String },

    #[error("Tool timed out: {tool} after {timeout_ms} ms")]
    ToolTimeout { tool: String, timeout_ms: u64 },

    #[error("Channel unavailable: {channel}, reason: {reason}")]
    ChannelUnavailable { channel: String, reason: String },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage read failed: {path}, reason: {reason}")]
    StorageReadFailed { path: String, reason: String },

    #[error("Storage write failed: {path}, reason: {reason}")]
    StorageWriteFailed { path: String, reason: String },

    #[error("Memory backend failed: {reason}")]
    MemoryBackendFailed { reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("Operation cancelled")]
    Cancelled,

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },
}

impl Error {
    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create an invalid-params error
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }

    /// Create a storage read error
    pub fn storage_read_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StorageReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage write error
    pub fn storage_write_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StorageWriteFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Check if this error is retriable
    ///
    /// Retriable errors may succeed on a later attempt (transient network or
    /// downstream conditions). Validation and auth failures are not.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::LlmFailed { .. }
                | Self::LlmTimeout { .. }
                | Self::ChannelUnavailable { .. }
                | Self::StorageWriteFailed { .. }
        )
    }

    /// JSON-RPC error code for this error (per the gateway wire contract)
    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::MalformedFrame { .. } => -32700,
            Self::FrameTooLarge { .. } => -32600,
            Self::UnknownMethod { .. } => -32601,
            Self::InvalidParams { .. } | Self::InvalidSessionKey { .. } => -32602,
            Self::Unauthorized { .. } => -32001,
            _ => -32603,
        }
    }

    /// Message safe to surface to a client (no internal detail)
    pub fn sanitized_message(&self) -> String {
        match self {
            Self::MalformedFrame { .. } => "Parse error".to_string(),
            Self::FrameTooLarge { .. } => "Invalid Request".to_string(),
            Self::UnknownMethod { method } => format!("Method not found: {}", method),
            Self::InvalidParams { reason } => format!("Invalid params: {}", reason),
            Self::InvalidSessionKey { reason, .. } => format!("Invalid params: {}", reason),
            Self::Unauthorized { .. } => "Unauthorized".to_string(),
            _ => "Internal error".to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            reason: format!("I/O error: {}", err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed {
            reason: err.to_string(),
        }
    }
}
