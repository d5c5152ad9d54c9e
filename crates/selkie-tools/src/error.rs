//! Error types for tool execution

use thiserror::Error;

/// Result type alias for tool operations
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Tool errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Missing required parameter: {tool}.{param}")]
    MissingParameter { tool: String, param: String },

    #[error("Invalid parameter: {tool}.{param}, reason: {reason}")]
    InvalidParameter {
        tool: String,
        param: String,
        reason: String,
    },

    #[error("Tool execution timed out: {tool} after {timeout_ms} ms")]
    ExecutionTimeout { tool: String, timeout_ms: u64 },

    #[error("Tool execution failed: {tool}, reason: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    #[error("Registry error: {reason}")]
    Registry { reason: String },
}

impl ToolError {
    /// Create an execution failure
    pub fn execution_failed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}
