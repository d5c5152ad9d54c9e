//! HTTP LLM provider adapter
//!
//! One client speaks two wire dialects: OpenAI-compatible
//! `/chat/completions` (OpenAI, MiniMax, Ollama's compat endpoint, vLLM…)
//! and Anthropic `/messages`. Providers that reject the `tools` parameter
//! fall back to the prompted `<tool_call>` protocol transparently.

use crate::adapter::{DeltaStream, LlmAdapter};
use crate::http::{HttpClient, HttpMethod, HttpRequest, ReqwestHttpClient};
use crate::toolcall::{extract_tool_calls, render_tool_prompt};
use crate::types::{ChatMessage, LlmResponse, StreamDelta, ToolCallRequest, ToolDefinition};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use selkie_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Known provider dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI-compatible chat completions with native tool calling
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// OpenAI-compatible endpoint without native tool calling; tools go
    /// through the prompted protocol
    Prompted,
}

impl Provider {
    /// Parse the `LLM_PROVIDER` value
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "anthropic" => Self::Anthropic,
            "ollama" | "prompted" => Self::Prompted,
            _ => Self::OpenAi,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which dialect to speak
    pub provider: Provider,
    /// API base URL
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Max tokens in the response
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Load from `LLM_*` environment variables
    ///
    /// Returns None when `LLM_API_KEY` is unset and the provider is not a
    /// keyless local endpoint.
    pub fn from_env() -> Option<Self> {
        let provider = Provider::parse(
            &std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
        );
        let api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
        if api_key.is_empty() && provider != Provider::Prompted {
            return None;
        }

        let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| {
            match provider {
                Provider::Anthropic => "https://api.anthropic.com/v1".to_string(),
                _ => "https://api.openai.com/v1".to_string(),
            }
        });
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| {
            match provider {
                Provider::Anthropic => "claude-sonnet-4-20250514".to_string(),
                _ => "gpt-4o-mini".to_string(),
            }
        });

        Some(Self {
            provider,
            base_url,
            api_key,
            model,
            max_tokens: 2000,
        })
    }
}

/// HTTP-backed LLM adapter
pub struct HttpLlmAdapter {
    config: LlmConfig,
    http: Arc<dyn HttpClient>,
}

impl HttpLlmAdapter {
    /// Create with the production HTTP client
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            http: Arc::new(ReqwestHttpClient::new()),
        }
    }

    /// Create with a custom HTTP client (tests)
    pub fn with_http_client(config: LlmConfig, http: Arc<dyn HttpClient>) -> Self {
        Self { config, http }
    }

    /// Create from environment, None when unconfigured
    pub fn from_env() -> Option<Self> {
        LlmConfig::from_env().map(Self::new)
    }

    // =========================================================================
    // OpenAI dialect
    // =========================================================================

    async fn complete_openai(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse> {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": openai_messages(&messages),
            "max_tokens": self.config.max_tokens,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
            body["tool_choice"] = Value::String("auto".to_string());
        }

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/chat/completions", self.config.base_url),
        )
        .header("Authorization", format!("Bearer {}", self.config.api_key))
        .json(&body)
        .map_err(|e| Error::LlmFailed { reason: e })?;

        let response = self
            .http
            .send(request)
            .await
            .map_err(|e| Error::LlmFailed { reason: e })?;

        if !response.is_success() {
            let body_text = response.text().unwrap_or_default();
            return Err(Error::LlmFailed {
                reason: format!("API error {}: {}", response.status, body_text),
            });
        }

        let completion: OpenAiResponse = response
            .json()
            .map_err(|e| Error::LlmFailed { reason: e })?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::LlmFailed {
                reason: "no completion choices returned".to_string(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| {
                let arguments: Value = serde_json::from_str(&tc.function.arguments).ok()?;
                Some(ToolCallRequest {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                })
            })
            .collect();

        let usage = completion.usage.unwrap_or_default();
        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
        })
    }

    // =========================================================================
    // Anthropic dialect
    // =========================================================================

    async fn complete_anthropic(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse> {
        let (system, turns) = split_system(&messages);

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": turns,
            "max_tokens": self.config.max_tokens,
        });
        if let Some(system) = system {
            body["system"] = Value::String(system);
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.parameters,
                        })
                    })
                    .collect(),
            );
        }

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/messages", self.config.base_url),
        )
        .header("x-api-key", self.config.api_key.clone())
        .header("anthropic-version", "2023-06-01")
        .json(&body)
        .map_err(|e| Error::LlmFailed { reason: e })?;

        let response = self
            .http
            .send(request)
            .await
            .map_err(|e| Error::LlmFailed { reason: e })?;

        if !response.is_success() {
            let body_text = response.text().unwrap_or_default();
            return Err(Error::LlmFailed {
                reason: format!("API error {}: {}", response.status, body_text),
            });
        }

        let completion: AnthropicResponse = response
            .json()
            .map_err(|e| Error::LlmFailed { reason: e })?;

        let content = completion
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.clone())
            .collect::<Vec<_>>()
            .join("");

        let tool_calls = completion
            .content
            .iter()
            .filter(|c| c.content_type == "tool_use")
            .filter_map(|c| {
                Some(ToolCallRequest {
                    id: c.id.clone()?,
                    name: c.name.clone()?,
                    arguments: c.input.clone()?,
                })
            })
            .collect();

        Ok(LlmResponse {
            content,
            tool_calls,
            prompt_tokens: completion.usage.input_tokens,
            completion_tokens: completion.usage.output_tokens,
            finish_reason: completion.stop_reason,
        })
    }

    // =========================================================================
    // Prompted dialect
    // =========================================================================

    async fn complete_prompted(
        &self,
        mut messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse> {
        if !tools.is_empty() {
            let preamble = render_tool_prompt(&tools);
            messages.insert(0, ChatMessage::system(preamble));
        }

        let mut response = self.complete_openai(messages, vec![]).await?;
        let extracted = extract_tool_calls(&response.content);
        response.content = extracted.content;
        response.tool_calls = extracted.calls;
        Ok(response)
    }
}

/// OpenAI rejects the nonstandard "tool" role outside of tool_call replies;
/// observations are re-labeled as user turns for the wire.
fn openai_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = if m.role == "tool" { "user" } else { &m.role };
            serde_json::json!({"role": role, "content": m.content})
        })
        .collect()
}

/// Anthropic takes the system prompt out of band; tool observations become
/// user turns.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
    let mut system_parts = Vec::new();
    let mut turns = Vec::new();

    for message in messages {
        if message.role == "system" {
            system_parts.push(message.content.clone());
        } else {
            let role = if message.role == "assistant" {
                "assistant"
            } else {
                "user"
            };
            turns.push(serde_json::json!({"role": role, "content": message.content}));
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, turns)
}

#[async_trait]
impl LlmAdapter for HttpLlmAdapter {
    async fn generate_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse> {
        match self.config.provider {
            Provider::OpenAi => self.complete_openai(messages, tools).await,
            Provider::Anthropic => self.complete_anthropic(messages, tools).await,
            Provider::Prompted => self.complete_prompted(messages, tools).await,
        }
    }

    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream> {
        match self.config.provider {
            Provider::Anthropic => {
                let (system, turns) = split_system(&messages);
                let mut body = serde_json::json!({
                    "model": self.config.model,
                    "messages": turns,
                    "max_tokens": self.config.max_tokens,
                    "stream": true,
                });
                if let Some(system) = system {
                    body["system"] = Value::String(system);
                }

                let request = HttpRequest::new(
                    HttpMethod::Post,
                    format!("{}/messages", self.config.base_url),
                )
                .header("x-api-key", self.config.api_key.clone())
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .map_err(|e| Error::LlmFailed { reason: e })?;

                let bytes = self
                    .http
                    .send_streaming(request)
                    .await
                    .map_err(|e| Error::LlmFailed { reason: e })?;
                Ok(Box::pin(parse_anthropic_sse(bytes)))
            }
            Provider::OpenAi | Provider::Prompted => {
                let body = serde_json::json!({
                    "model": self.config.model,
                    "messages": openai_messages(&messages),
                    "max_tokens": self.config.max_tokens,
                    "stream": true,
                });

                let request = HttpRequest::new(
                    HttpMethod::Post,
                    format!("{}/chat/completions", self.config.base_url),
                )
                .header("Authorization", format!("Bearer {}", self.config.api_key))
                .json(&body)
                .map_err(|e| Error::LlmFailed { reason: e })?;

                let bytes = self
                    .http
                    .send_streaming(request)
                    .await
                    .map_err(|e| Error::LlmFailed { reason: e })?;
                Ok(Box::pin(parse_openai_sse(bytes)))
            }
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
    stop_reason: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

// =============================================================================
// SSE parsing
// =============================================================================

/// Parse Anthropic SSE events into deltas
///
/// Handles `content_block_delta` and `message_stop`; other event kinds are
/// ignored. A scan buffer carries partial lines across chunks.
fn parse_anthropic_sse(
    bytes: impl Stream<Item = std::result::Result<bytes::Bytes, String>> + Send + 'static,
) -> impl Stream<Item = Result<StreamDelta>> + Send {
    bytes
        .scan(String::new(), |buffer, chunk| {
            let deltas = match chunk {
                Ok(chunk) => {
                    let mut deltas = Vec::new();
                    if let Ok(text) = std::str::from_utf8(&chunk) {
                        buffer.push_str(text);
                        while let Some(newline) = buffer.find('\n') {
                            let line = buffer[..newline].trim().to_string();
                            buffer.drain(..=newline);

                            let Some(data) = line.strip_prefix("data: ") else {
                                continue;
                            };
                            let Ok(event) = serde_json::from_str::<Value>(data) else {
                                continue;
                            };
                            match event.get("type").and_then(|v| v.as_str()) {
                                Some("content_block_delta") => {
                                    if let Some(text) = event
                                        .get("delta")
                                        .and_then(|d| d.get("text"))
                                        .and_then(|t| t.as_str())
                                    {
                                        deltas.push(Ok(StreamDelta::Content(text.to_string())));
                                    }
                                }
                                Some("message_stop") => {
                                    deltas.push(Ok(StreamDelta::Done("end_turn".to_string())));
                                }
                                _ => {}
                            }
                        }
                    }
                    deltas
                }
                Err(e) => vec![Err(Error::LlmFailed {
                    reason: format!("stream error: {}", e),
                })],
            };
            futures::future::ready(Some(deltas))
        })
        .flat_map(futures::stream::iter)
}

/// Parse OpenAI SSE events into deltas
///
/// Emits Done once, preferring the explicit `finish_reason` over the
/// trailing `[DONE]` marker.
fn parse_openai_sse(
    bytes: impl Stream<Item = std::result::Result<bytes::Bytes, String>> + Send + 'static,
) -> impl Stream<Item = Result<StreamDelta>> + Send {
    bytes
        .scan((String::new(), false), |(buffer, done), chunk| {
            let deltas = match chunk {
                Ok(chunk) => {
                    let mut deltas = Vec::new();
                    if let Ok(text) = std::str::from_utf8(&chunk) {
                        buffer.push_str(text);
                        while let Some(newline) = buffer.find('\n') {
                            let line = buffer[..newline].trim().to_string();
                            buffer.drain(..=newline);

                            let Some(data) = line.strip_prefix("data: ") else {
                                continue;
                            };
                            if data == "[DONE]" {
                                if !*done {
                                    *done = true;
                                    deltas.push(Ok(StreamDelta::Done("stop".to_string())));
                                }
                                continue;
                            }
                            let Ok(event) = serde_json::from_str::<Value>(data) else {
                                continue;
                            };

                            if let Some(error) = event.get("error") {
                                let message = error
                                    .get("message")
                                    .and_then(|m| m.as_str())
                                    .unwrap_or("unknown error");
                                deltas.push(Err(Error::LlmFailed {
                                    reason: message.to_string(),
                                }));
                                continue;
                            }

                            let Some(choice) = event
                                .get("choices")
                                .and_then(|c| c.as_array())
                                .and_then(|c| c.first())
                            else {
                                continue;
                            };

                            if let Some(content) = choice
                                .get("delta")
                                .and_then(|d| d.get("content"))
                                .and_then(|c| c.as_str())
                            {
                                if !content.is_empty() {
                                    deltas.push(Ok(StreamDelta::Content(content.to_string())));
                                }
                            }

                            if let Some(reason) =
                                choice.get("finish_reason").and_then(|f| f.as_str())
                            {
                                if !*done {
                                    *done = true;
                                    deltas.push(Ok(StreamDelta::Done(reason.to_string())));
                                }
                            }
                        }
                    }
                    deltas
                }
                Err(e) => vec![Err(Error::LlmFailed {
                    reason: format!("stream error: {}", e),
                })],
            };
            futures::future::ready(Some(deltas))
        })
        .flat_map(futures::stream::iter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ByteStream;
    use futures::StreamExt;
    use std::sync::Mutex;

    /// Canned HTTP client for provider tests
    struct CannedHttp {
        responses: Mutex<Vec<crate::http::HttpResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedHttp {
        fn one(status: u16, body: Value) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(vec![crate::http::HttpResponse {
                    status,
                    body: serde_json::to_vec(&body).unwrap(),
                }]),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpClient for CannedHttp {
        async fn send(&self, request: HttpRequest) -> std::result::Result<crate::http::HttpResponse, String> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| "no canned response".to_string())
        }

        async fn send_streaming(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<ByteStream, String> {
            Err("streaming not canned".to_string())
        }
    }

    fn config(provider: Provider) -> LlmConfig {
        LlmConfig {
            provider,
            base_url: "https://example.test/v1".to_string(),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn test_openai_text_response() {
        let http = CannedHttp::one(
            200,
            serde_json::json!({
                "choices": [{"message": {"content": "hi there"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2}
            }),
        );
        let adapter = HttpLlmAdapter::with_http_client(config(Provider::OpenAi), http.clone());

        let response = adapter
            .generate_with_tools(vec![ChatMessage::user("hello")], vec![])
            .await
            .unwrap();
        assert_eq!(response.content, "hi there");
        assert_eq!(response.prompt_tokens, 5);
        assert!(!response.has_tool_calls());

        let requests = http.requests.lock().unwrap();
        assert!(requests[0].url.ends_with("/chat/completions"));
    }

    #[tokio::test]
    async fn test_openai_tool_call_response() {
        let http = CannedHttp::one(
            200,
            serde_json::json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "list_tasks", "arguments": "{}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }),
        );
        let adapter = HttpLlmAdapter::with_http_client(config(Provider::OpenAi), http);

        let response = adapter
            .generate_with_tools(
                vec![ChatMessage::user("list my tasks")],
                vec![ToolDefinition {
                    name: "list_tasks".to_string(),
                    description: "List tasks".to_string(),
                    parameters: serde_json::json!({"type": "object", "properties": {}}),
                }],
            )
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "list_tasks");
    }

    #[tokio::test]
    async fn test_anthropic_response() {
        let http = CannedHttp::one(
            200,
            serde_json::json!({
                "content": [
                    {"type": "text", "text": "hello from claude"},
                    {"type": "tool_use", "id": "tu_1", "name": "remember", "input": {"content": "x"}}
                ],
                "usage": {"input_tokens": 10, "output_tokens": 4},
                "stop_reason": "tool_use"
            }),
        );
        let adapter = HttpLlmAdapter::with_http_client(config(Provider::Anthropic), http.clone());

        let response = adapter
            .generate_with_tools(
                vec![
                    ChatMessage::system("be helpful"),
                    ChatMessage::user("remember x"),
                ],
                vec![],
            )
            .await
            .unwrap();

        assert_eq!(response.content, "hello from claude");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "remember");

        let requests = http.requests.lock().unwrap();
        assert!(requests[0].url.ends_with("/messages"));
        let body: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["system"], "be helpful");
    }

    #[tokio::test]
    async fn test_api_error_surfaces() {
        let http = CannedHttp::one(429, serde_json::json!({"error": "rate limited"}));
        let adapter = HttpLlmAdapter::with_http_client(config(Provider::OpenAi), http);

        let result = adapter
            .generate_with_tools(vec![ChatMessage::user("x")], vec![])
            .await;
        match result {
            Err(Error::LlmFailed { reason }) => assert!(reason.contains("429")),
            other => panic!("expected LlmFailed, got {:?}", other.map(|r| r.content)),
        }
    }

    #[tokio::test]
    async fn test_prompted_dialect_extracts_calls() {
        let http = CannedHttp::one(
            200,
            serde_json::json!({
                "choices": [{
                    "message": {"content": "<tool_call>{\"name\": \"list_tasks\", \"arguments\": {}}</tool_call>"},
                    "finish_reason": "stop"
                }]
            }),
        );
        let adapter = HttpLlmAdapter::with_http_client(config(Provider::Prompted), http.clone());

        let response = adapter
            .generate_with_tools(
                vec![ChatMessage::user("what are my tasks")],
                vec![ToolDefinition {
                    name: "list_tasks".to_string(),
                    description: "List tasks".to_string(),
                    parameters: serde_json::json!({"type": "object", "properties": {}}),
                }],
            )
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "list_tasks");
        assert!(response.content.is_empty());

        // The prompted preamble must have been injected
        let requests = http.requests.lock().unwrap();
        let body: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        let first = &body["messages"][0];
        assert_eq!(first["role"], "system");
        assert!(first["content"].as_str().unwrap().contains("<tool_call>"));
    }

    #[tokio::test]
    async fn test_parse_openai_sse_stream() {
        let chunks: Vec<std::result::Result<bytes::Bytes, String>> = vec![
            Ok(bytes::Bytes::from(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"},\"finish_reason\":null}]}\n\n",
            )),
            Ok(bytes::Bytes::from(
                "data: {\"choices\":[{\"delta\":{\"content\":\" world\"},\"finish_reason\":null}]}\n\n",
            )),
            Ok(bytes::Bytes::from(
                "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            )),
            Ok(bytes::Bytes::from("data: [DONE]\n\n")),
        ];

        let deltas: Vec<_> = parse_openai_sse(futures::stream::iter(chunks)).collect().await;
        assert_eq!(deltas.len(), 3, "Done deduplicated against [DONE]");
        assert_eq!(
            *deltas[0].as_ref().unwrap(),
            StreamDelta::Content("Hello".to_string())
        );
        assert_eq!(
            *deltas[2].as_ref().unwrap(),
            StreamDelta::Done("stop".to_string())
        );
    }

    #[tokio::test]
    async fn test_parse_anthropic_sse_stream() {
        let chunks: Vec<std::result::Result<bytes::Bytes, String>> = vec![
            Ok(bytes::Bytes::from(
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Hi\"}}\n\n",
            )),
            Ok(bytes::Bytes::from("data: {\"type\":\"message_stop\"}\n\n")),
        ];

        let deltas: Vec<_> = parse_anthropic_sse(futures::stream::iter(chunks))
            .collect()
            .await;
        assert_eq!(deltas.len(), 2);
        assert_eq!(
            *deltas[0].as_ref().unwrap(),
            StreamDelta::Content("Hi".to_string())
        );
        assert_eq!(
            *deltas[1].as_ref().unwrap(),
            StreamDelta::Done("end_turn".to_string())
        );
    }

    #[tokio::test]
    async fn test_sse_partial_lines_across_chunks() {
        let chunks: Vec<std::result::Result<bytes::Bytes, String>> = vec![
            Ok(bytes::Bytes::from(
                "data: {\"choices\":[{\"delta\":{\"cont",
            )),
            Ok(bytes::Bytes::from(
                "ent\":\"split\"},\"finish_reason\":null}]}\n\n",
            )),
            Ok(bytes::Bytes::from("data: [DONE]\n\n")),
        ];

        let deltas: Vec<_> = parse_openai_sse(futures::stream::iter(chunks)).collect().await;
        assert_eq!(deltas.len(), 2);
        assert_eq!(
            *deltas[0].as_ref().unwrap(),
            StreamDelta::Content("split".to_string())
        );
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("anthropic"), Provider::Anthropic);
        assert_eq!(Provider::parse("openai"), Provider::OpenAi);
        assert_eq!(Provider::parse("ollama"), Provider::Prompted);
        assert_eq!(Provider::parse("anything-else"), Provider::OpenAi);
    }

    #[test]
    fn test_split_system() {
        let messages = vec![
            ChatMessage::system("a"),
            ChatMessage::system("b"),
            ChatMessage::user("hi"),
            ChatMessage::tool("observation"),
        ];
        let (system, turns) = split_system(&messages);
        assert_eq!(system.unwrap(), "a\n\nb");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1]["role"], "user");
    }
}
