//! Wire-neutral types shared across providers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A chat message in provider-neutral form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
        }
    }
}

/// Tool definition handed to the model
///
/// `parameters` is a JSON schema object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool call the model asked for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Response from a completion call
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Text content, possibly empty when the model only called tools
    pub content: String,
    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCallRequest>,
    /// Prompt tokens reported by the provider
    pub prompt_tokens: u64,
    /// Completion tokens reported by the provider
    pub completion_tokens: u64,
    /// Provider stop reason
    pub finish_reason: String,
}

impl LlmResponse {
    /// Text-only response helper
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: "stop".to_string(),
            ..Default::default()
        }
    }

    /// Whether the model asked for any tool
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Streaming delta from the model
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    /// Text content chunk
    Content(String),
    /// Stream completed with the given stop reason
    Done(String),
}
