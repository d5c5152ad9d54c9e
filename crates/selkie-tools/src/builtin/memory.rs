//! Memory tools
//!
//! `remember` captures a fact into the memory system; `search_memory` runs
//! recall and returns the formatted context.

use crate::error::ToolResult;
use crate::traits::{Tool, ToolMetadata, ToolOutput, ToolParam};
use async_trait::async_trait;
use selkie_memory::{EntryType, MemorySystem};
use serde_json::{json, Value};
use std::sync::Arc;

/// `remember` tool
pub struct RememberTool {
    memory: Arc<MemorySystem>,
    metadata: ToolMetadata,
}

impl RememberTool {
    pub fn new(memory: Arc<MemorySystem>) -> Self {
        Self {
            memory,
            metadata: ToolMetadata::new(
                "remember",
                "Store a fact or observation in long-term memory",
            )
            .with_param(ToolParam::string("content", "What to remember"))
            .with_param(
                ToolParam::string("kind", "Kind of memory")
                    .with_enum(vec![json!("fact"), json!("belief"), json!("event")])
                    .with_default("fact"),
            )
            .with_param(ToolParam::array("tags", "Optional tags").optional()),
        }
    }
}

#[async_trait]
impl Tool for RememberTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, args: Value) -> ToolResult<ToolOutput> {
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let kind = args
            .get("kind")
            .and_then(|v| v.as_str())
            .map(EntryType::parse)
            .unwrap_or(EntryType::Fact);
        let tags: Vec<String> = args
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        match self
            .memory
            .capture(content, kind, tags, Value::Null)
            .await
        {
            Ok(id) => Ok(ToolOutput::success("Noted.").with_data(json!({"id": id}))),
            Err(e) => Ok(ToolOutput::failure(e.to_string())),
        }
    }
}

/// `search_memory` tool
pub struct SearchMemoryTool {
    memory: Arc<MemorySystem>,
    metadata: ToolMetadata,
}

impl SearchMemoryTool {
    pub fn new(memory: Arc<MemorySystem>) -> Self {
        Self {
            memory,
            metadata: ToolMetadata::new("search_memory", "Search long-term memory")
                .with_param(ToolParam::string("query", "What to look for"))
                .with_param(
                    ToolParam::integer("limit", "Maximum results").with_default(5),
                ),
        }
    }
}

#[async_trait]
impl Tool for SearchMemoryTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, args: Value) -> ToolResult<ToolOutput> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(5)
            .max(1) as usize;

        match self.memory.recall(query, limit).await {
            Ok(context) if context.is_empty() => {
                Ok(ToolOutput::success("No relevant memories."))
            }
            Ok(context) => Ok(ToolOutput::success(context)),
            Err(e) => Ok(ToolOutput::failure(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selkie_core::metrics::Metrics;
    use selkie_memory::{MemorySystemConfig, MockEmbedder};

    fn memory(dir: &tempfile::TempDir) -> Arc<MemorySystem> {
        Arc::new(
            MemorySystem::open(
                MemorySystemConfig::new(dir.path()),
                Arc::new(MockEmbedder::new(16)),
                None,
                Metrics::new_shared(),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_remember_then_search() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory(&dir);

        let remember = RememberTool::new(memory.clone());
        let output = remember
            .execute(json!({"content": "the wifi password is hunter2", "kind": "fact"}))
            .await
            .unwrap();
        assert!(output.success);

        let search = SearchMemoryTool::new(memory);
        let output = search
            .execute(json!({"query": "wifi password"}))
            .await
            .unwrap();
        assert!(output.success);
        assert!(output.observation.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_search_empty_memory() {
        let dir = tempfile::tempdir().unwrap();
        let search = SearchMemoryTool::new(memory(&dir));
        let output = search.execute(json!({"query": "anything"})).await.unwrap();
        assert!(output.success);
        assert!(output.observation.contains("No relevant memories"));
    }
}
