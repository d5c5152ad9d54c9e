//! Tool registry for discovery and execution
//!
//! Centralized tool management: registration, schema export for the LLM,
//! timeout-wrapped execution and statistics.

use crate::error::{ToolError, ToolResult};
use crate::traits::{Tool, ToolMetadata, ToolOutput};
use selkie_core::TOOL_REGISTRY_COUNT_MAX;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Execution statistics
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Total tool executions
    pub total_executions: u64,
    /// Successful executions
    pub successful_executions: u64,
    /// Failed executions
    pub failed_executions: u64,
    /// Timed out executions
    pub timed_out_executions: u64,
    /// Per-tool success/failure counts
    pub per_tool: HashMap<String, (u64, u64)>,
}

/// Tool registry
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    stats: RwLock<RegistryStats>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            stats: RwLock::new(RegistryStats::default()),
        }
    }

    /// Register a tool
    pub async fn register<T: Tool + 'static>(&self, tool: T) -> ToolResult<()> {
        self.register_arc(Arc::new(tool)).await
    }

    /// Register a shared tool
    pub async fn register_arc(&self, tool: Arc<dyn Tool>) -> ToolResult<()> {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().await;

        if tools.len() >= TOOL_REGISTRY_COUNT_MAX {
            return Err(ToolError::Registry {
                reason: format!("registry is at capacity ({} tools)", TOOL_REGISTRY_COUNT_MAX),
            });
        }
        if tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered { name });
        }

        info!(tool = %name, "registering tool");
        tools.insert(name, tool);
        Ok(())
    }

    /// Check whether a tool is registered
    pub async fn has_tool(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// Fetch a tool by name
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Metadata for every registered tool
    pub async fn list_metadata(&self) -> Vec<ToolMetadata> {
        self.tools
            .read()
            .await
            .values()
            .map(|t| t.metadata().clone())
            .collect()
    }

    /// Whether the named tool needs a confirmation round-trip
    pub async fn needs_confirmation(&self, name: &str) -> bool {
        self.tools
            .read()
            .await
            .get(name)
            .map(|t| t.metadata().needs_confirmation)
            .unwrap_or(false)
    }

    /// Preview of what executing `name` with `args` would do
    pub async fn preview(&self, name: &str, args: &Value) -> Option<String> {
        let tool = self.get(name).await?;
        tool.preview(args).await
    }

    /// Tool schemas in OpenAI function-calling shape
    pub async fn schemas(&self) -> Vec<Value> {
        self.tools
            .read()
            .await
            .values()
            .map(|tool| {
                let metadata = tool.metadata();
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": metadata.name,
                        "description": metadata.description,
                        "parameters": metadata.to_json_schema(),
                    }
                })
            })
            .collect()
    }

    /// Number of registered tools
    pub async fn count(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Execute a tool by name
    ///
    /// Validation failures, execution errors and timeouts are all wrapped
    /// into a failed [`ToolOutput`] so the agent can hand them back to the
    /// model as observations instead of propagating.
    pub async fn execute(&self, name: &str, args: Value) -> ToolOutput {
        let Some(tool) = self.get(name).await else {
            self.record(name, false, false).await;
            return ToolOutput::failure(format!("unknown tool: {}", name));
        };

        if let Err(e) = tool.validate(&args) {
            self.record(name, false, false).await;
            return ToolOutput::failure(e.to_string());
        }

        let timeout_ms = tool.metadata().timeout_ms;
        let start = Instant::now();
        debug!(tool = %name, timeout_ms, "executing tool");

        let result = timeout(
            std::time::Duration::from_millis(timeout_ms),
            tool.execute(args),
        )
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                self.record(name, output.success, false).await;
                debug!(tool = %name, duration_ms, success = output.success, "tool finished");
                output.with_duration(duration_ms)
            }
            Ok(Err(e)) => {
                self.record(name, false, false).await;
                warn!(tool = %name, error = %e, "tool execution failed");
                ToolOutput::failure(e.to_string()).with_duration(duration_ms)
            }
            Err(_) => {
                self.record(name, false, true).await;
                warn!(tool = %name, timeout_ms, "tool execution timed out");
                ToolOutput::failure("timeout").with_duration(duration_ms)
            }
        }
    }

    async fn record(&self, name: &str, success: bool, timed_out: bool) {
        let mut stats = self.stats.write().await;
        stats.total_executions += 1;
        let entry = stats.per_tool.entry(name.to_string()).or_insert((0, 0));
        if success {
            entry.0 += 1;
            stats.successful_executions += 1;
        } else {
            entry.1 += 1;
            stats.failed_executions += 1;
            if timed_out {
                stats.timed_out_executions += 1;
            }
        }
    }

    /// Snapshot of execution statistics
    pub async fn stats(&self) -> RegistryStats {
        self.stats.read().await.clone()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
