//! Builtin tools
//!
//! Task management over a JSON-file store, memory tools over the memory
//! system, and web search. Registered by the server at startup.

pub mod memory;
pub mod tasks;
pub mod web_search;

pub use memory::{RememberTool, SearchMemoryTool};
pub use tasks::{
    CompleteTaskTool, CreateTaskTool, DeleteTasksTool, ListTasksTool, Task, TaskStore,
};
pub use web_search::WebSearchTool;

use crate::error::ToolResult;
use crate::registry::ToolRegistry;
use selkie_memory::MemorySystem;
use std::sync::Arc;

/// Register the builtin task tools against a shared task store
pub async fn register_task_tools(
    registry: &ToolRegistry,
    store: Arc<TaskStore>,
) -> ToolResult<()> {
    registry.register(CreateTaskTool::new(store.clone())).await?;
    registry.register(ListTasksTool::new(store.clone())).await?;
    registry.register(CompleteTaskTool::new(store.clone())).await?;
    registry.register(DeleteTasksTool::new(store)).await?;
    Ok(())
}

/// Register the builtin memory tools
pub async fn register_memory_tools(
    registry: &ToolRegistry,
    memory: Arc<MemorySystem>,
) -> ToolResult<()> {
    registry.register(RememberTool::new(memory.clone())).await?;
    registry.register(SearchMemoryTool::new(memory)).await?;
    Ok(())
}

/// Register the web search tool
pub async fn register_search_tools(registry: &ToolRegistry) -> ToolResult<()> {
    registry.register(WebSearchTool::new()).await
}
