//! The LLM adapter trait and the scripted mock used in tests

use crate::types::{ChatMessage, LlmResponse, StreamDelta, ToolDefinition};
use async_trait::async_trait;
use futures::stream::Stream;
use selkie_core::{Error, Result};
use std::pin::Pin;

/// Stream of deltas from a streaming completion
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta>> + Send>>;

/// Provider-agnostic LLM interface
///
/// Implementations normalize provider wire formats behind one surface:
/// plain generation, tool-calling generation, and streaming.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Plain text generation
    async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let response = self.generate_with_tools(messages, vec![]).await?;
        Ok(response.content)
    }

    /// Generation with tool schemas offered to the model
    async fn generate_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse>;

    /// Streaming text generation
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream>;
}

/// Scripted mock adapter for tests
///
/// Pops responses front-to-back; when the script runs dry it echoes the last
/// user message. Tool calls can be scripted by pushing responses with
/// `tool_calls` set.
pub struct MockLlm {
    responses: std::sync::Mutex<std::collections::VecDeque<LlmResponse>>,
    /// Calls observed, for assertions
    pub calls: std::sync::atomic::AtomicU64,
}

impl MockLlm {
    /// Mock that always echoes
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(Default::default()),
            calls: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Mock with a scripted sequence of responses
    pub fn scripted(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Number of completion calls made so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn next_response(&self, messages: &[ChatMessage]) -> LlmResponse {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut scripted = self.responses.lock().expect("mock mutex poisoned");
        if let Some(response) = scripted.pop_front() {
            return response;
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        LlmResponse::text(format!("echo: {}", last_user))
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmAdapter for MockLlm {
    async fn generate_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        _tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse> {
        Ok(self.next_response(&messages))
    }

    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream> {
        let response = self.next_response(&messages);
        if response.content.is_empty() {
            return Err(Error::LlmFailed {
                reason: "scripted response has no content to stream".to_string(),
            });
        }

        // Stream word by word to exercise delta handling
        let mut deltas: Vec<Result<StreamDelta>> = Vec::new();
        let words: Vec<&str> = response.content.split_inclusive(' ').collect();
        for word in words {
            deltas.push(Ok(StreamDelta::Content(word.to_string())));
        }
        deltas.push(Ok(StreamDelta::Done("stop".to_string())));

        Ok(Box::pin(futures::stream::iter(deltas)))
    }
}
