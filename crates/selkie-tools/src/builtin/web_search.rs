//! Web search tool
//!
//! Tavily API integration. Requires the TAVILY_API_KEY environment
//! variable; without it every call returns a failed output the model can
//! read and work around. API failures are observations, never errors.

use crate::error::ToolResult;
use crate::traits::{Tool, ToolMetadata, ToolOutput, ToolParam};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Maximum number of search results
const SEARCH_RESULTS_COUNT_MAX: u64 = 10;

/// Default number of search results
const SEARCH_RESULTS_COUNT_DEFAULT: u64 = 5;

/// API request timeout
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Tavily API endpoint
const TAVILY_API_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Serialize)]
struct TavilyRequest {
    api_key: String,
    query: String,
    max_results: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_depth: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
    score: f64,
}

/// `web_search` tool
pub struct WebSearchTool {
    metadata: ToolMetadata,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata::new(
                "web_search",
                "Search the web. Returns relevant pages with titles, URLs and content snippets.",
            )
            .with_param(ToolParam::string("query", "Search query"))
            .with_param(
                ToolParam::integer("num_results", "Number of results (1-10)").with_default(5),
            )
            .with_param(
                ToolParam::string("search_depth", "Search depth")
                    .with_enum(vec![json!("basic"), json!("advanced")])
                    .with_default("basic"),
            ),
            client: reqwest::Client::new(),
        }
    }

    async fn search(
        &self,
        api_key: &str,
        query: &str,
        num_results: u64,
        search_depth: Option<String>,
    ) -> Result<Vec<TavilyResult>, String> {
        let request = TavilyRequest {
            api_key: api_key.to_string(),
            query: query.to_string(),
            max_results: num_results,
            search_depth,
        };

        let response = self
            .client
            .post(TAVILY_API_URL)
            .timeout(SEARCH_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("search timed out after {}s", SEARCH_TIMEOUT.as_secs())
                } else {
                    format!("search request failed: {}", e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 => "search authentication failed, check TAVILY_API_KEY".to_string(),
                429 => "search rate limit exceeded".to_string(),
                _ => format!("search API error {}", status),
            });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| format!("bad search response: {}", e))?;
        Ok(parsed.results)
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Render results for the model
fn format_results(results: &[TavilyResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let lines: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}\n{}\nSource: {}", i + 1, r.title, r.content, r.url))
        .collect();
    lines.join("\n\n")
}

#[async_trait]
impl Tool for WebSearchTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, args: Value) -> ToolResult<ToolOutput> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if query.is_empty() {
            return Ok(ToolOutput::failure("query must not be empty"));
        }

        let num_results = args
            .get("num_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(SEARCH_RESULTS_COUNT_DEFAULT);
        if num_results == 0 || num_results > SEARCH_RESULTS_COUNT_MAX {
            return Ok(ToolOutput::failure(format!(
                "num_results must be between 1 and {}",
                SEARCH_RESULTS_COUNT_MAX
            )));
        }

        let search_depth = args
            .get("search_depth")
            .and_then(|v| v.as_str())
            .map(String::from);

        let api_key = match std::env::var("TAVILY_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                return Ok(ToolOutput::failure(
                    "web search is not configured (TAVILY_API_KEY not set)",
                ));
            }
        };

        match self.search(&api_key, query, num_results, search_depth).await {
            Ok(results) => {
                let count = results.len();
                Ok(ToolOutput::success(format_results(&results))
                    .with_data(json!({"count": count})))
            }
            Err(reason) => Ok(ToolOutput::failure(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_query_fails() {
        let tool = WebSearchTool::new();
        let output = tool.execute(json!({"query": "   "})).await.unwrap();
        assert!(!output.success);
        assert!(output.observation.contains("query"));
    }

    #[tokio::test]
    async fn test_num_results_bounds() {
        let tool = WebSearchTool::new();

        let output = tool
            .execute(json!({"query": "rust", "num_results": 0}))
            .await
            .unwrap();
        assert!(!output.success);

        let output = tool
            .execute(json!({"query": "rust", "num_results": 100}))
            .await
            .unwrap();
        assert!(!output.success);
        assert!(output.observation.contains("between 1 and"));
    }

    #[tokio::test]
    async fn test_unconfigured_key_is_observation_not_error() {
        std::env::remove_var("TAVILY_API_KEY");
        let tool = WebSearchTool::new();
        let output = tool.execute(json!({"query": "rust"})).await.unwrap();
        assert!(!output.success);
        assert!(output.observation.contains("TAVILY_API_KEY"));
    }

    #[test]
    fn test_format_results() {
        assert_eq!(format_results(&[]), "No results found.");

        let results = vec![TavilyResult {
            title: "Rust Book".to_string(),
            url: "https://doc.rust-lang.org/book".to_string(),
            content: "The Rust Programming Language".to_string(),
            score: 0.95,
        }];
        let text = format_results(&results);
        assert!(text.contains("[1] Rust Book"));
        assert!(text.contains("Source: https://doc.rust-lang.org/book"));
    }

    #[test]
    fn test_schema_declares_params() {
        let tool = WebSearchTool::new();
        let schema = tool.metadata().to_json_schema();
        assert_eq!(schema["required"][0], "query");
        assert_eq!(schema["properties"]["search_depth"]["enum"][0], "basic");
    }
}
