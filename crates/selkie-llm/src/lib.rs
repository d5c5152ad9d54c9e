//! Selkie LLM
//!
//! Provider-agnostic access to chat models. One adapter trait, two wire
//! dialects (OpenAI-compatible and Anthropic), SSE streaming for both, and a
//! prompted `<tool_call>` protocol for providers without native function
//! calling. All HTTP goes through the [`HttpClient`] trait so tests can
//! inject canned responses and faults.

pub mod adapter;
pub mod http;
pub mod provider;
pub mod retry;
pub mod toolcall;
pub mod types;

pub use adapter::{LlmAdapter, MockLlm};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use provider::{HttpLlmAdapter, LlmConfig, Provider};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use toolcall::extract_tool_calls;
pub use types::{ChatMessage, LlmResponse, StreamDelta, ToolCallRequest, ToolDefinition};
