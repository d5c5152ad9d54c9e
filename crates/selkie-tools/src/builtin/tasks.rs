//! Task management tools
//!
//! A small JSON-file task store and the four tools the assistant uses to
//! manage it. `delete_tasks` is destructive and flagged for confirmation;
//! the agent holds the call until the user confirms.

use crate::error::{ToolError, ToolResult};
use crate::traits::{Tool, ToolMetadata, ToolOutput, ToolParam};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
}

impl Task {
    fn new(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            done: false,
            created_at: Utc::now(),
            due: None,
        }
    }
}

/// JSON-file task store
pub struct TaskStore {
    path: PathBuf,
    tasks: Mutex<Vec<Task>>,
}

impl TaskStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> ToolResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tasks = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| ToolError::Registry {
                reason: format!("cannot read {}: {}", path.display(), e),
            })?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            tasks: Mutex::new(tasks),
        })
    }

    async fn persist(&self, tasks: &[Task]) -> ToolResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ToolError::Registry {
                reason: format!("cannot create {}: {}", parent.display(), e),
            })?;
        }
        let raw = serde_json::to_string_pretty(tasks).map_err(|e| ToolError::Registry {
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, raw).map_err(|e| ToolError::Registry {
            reason: format!("cannot write {}: {}", self.path.display(), e),
        })
    }

    /// Add a task
    pub async fn create(&self, title: impl Into<String>) -> ToolResult<Task> {
        let task = Task::new(title);
        let mut tasks = self.tasks.lock().await;
        tasks.push(task.clone());
        self.persist(&tasks).await?;
        Ok(task)
    }

    /// All tasks, open first
    pub async fn list(&self) -> Vec<Task> {
        let mut tasks = self.tasks.lock().await.clone();
        tasks.sort_by_key(|t| t.done);
        tasks
    }

    /// Mark a task done; false when unknown
    pub async fn complete(&self, id: &str) -> ToolResult<bool> {
        let mut tasks = self.tasks.lock().await;
        let mut found = false;
        for task in tasks.iter_mut() {
            if task.id == id {
                task.done = true;
                found = true;
            }
        }
        if found {
            self.persist(&tasks).await?;
        }
        Ok(found)
    }

    /// Delete tasks by id, or all when `ids` is None; returns removed tasks
    pub async fn delete(&self, ids: Option<&[String]>) -> ToolResult<Vec<Task>> {
        let mut tasks = self.tasks.lock().await;
        let removed: Vec<Task> = match ids {
            None => tasks.drain(..).collect(),
            Some(ids) => {
                let (gone, kept): (Vec<Task>, Vec<Task>) =
                    tasks.drain(..).partition(|t| ids.contains(&t.id));
                *tasks = kept;
                gone
            }
        };
        self.persist(&tasks).await?;
        Ok(removed)
    }
}

/// `create_task` tool
pub struct CreateTaskTool {
    store: Arc<TaskStore>,
    metadata: ToolMetadata,
}

impl CreateTaskTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            metadata: ToolMetadata::new("create_task", "Create a new task or reminder")
                .with_param(ToolParam::string("title", "What the task is about")),
        }
    }
}

#[async_trait]
impl Tool for CreateTaskTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, args: Value) -> ToolResult<ToolOutput> {
        let title = args
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let task = self.store.create(title).await?;
        Ok(ToolOutput::success(format!("Created task: {}", task.title))
            .with_data(json!({"id": task.id})))
    }
}

/// `list_tasks` tool
pub struct ListTasksTool {
    store: Arc<TaskStore>,
    metadata: ToolMetadata,
}

impl ListTasksTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            metadata: ToolMetadata::new("list_tasks", "List current tasks"),
        }
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, _args: Value) -> ToolResult<ToolOutput> {
        let tasks = self.store.list().await;
        if tasks.is_empty() {
            return Ok(ToolOutput::success("No tasks.").with_data(json!({"tasks": []})));
        }

        let lines: Vec<String> = tasks
            .iter()
            .map(|t| {
                let marker = if t.done { "x" } else { " " };
                format!("[{}] {} ({})", marker, t.title, t.id)
            })
            .collect();
        Ok(ToolOutput::success(lines.join("\n"))
            .with_data(json!({"tasks": tasks})))
    }
}

/// `complete_task` tool
pub struct CompleteTaskTool {
    store: Arc<TaskStore>,
    metadata: ToolMetadata,
}

impl CompleteTaskTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            metadata: ToolMetadata::new("complete_task", "Mark a task as done")
                .with_param(ToolParam::string("task_id", "Id of the task to complete")),
        }
    }
}

#[async_trait]
impl Tool for CompleteTaskTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, args: Value) -> ToolResult<ToolOutput> {
        let id = args
            .get("task_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if self.store.complete(id).await? {
            Ok(ToolOutput::success("Task completed."))
        } else {
            Ok(ToolOutput::failure(format!("no such task: {}", id)))
        }
    }
}

/// `delete_tasks` tool — destructive, requires confirmation
pub struct DeleteTasksTool {
    store: Arc<TaskStore>,
    metadata: ToolMetadata,
}

impl DeleteTasksTool {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            metadata: ToolMetadata::new(
                "delete_tasks",
                "Delete tasks. Deletes all tasks unless specific ids are given.",
            )
            .with_param(
                ToolParam::array("task_ids", "Ids of tasks to delete; omit to delete all")
                    .optional(),
            )
            .with_confirmation(),
        }
    }

    /// Human-readable preview of what a call would delete, used by the agent
    /// for the confirmation prompt.
    pub async fn describe_pending(&self, args: &Value) -> String {
        let ids = extract_ids(args);
        let tasks = self.store.list().await;
        let affected: Vec<&Task> = match &ids {
            None => tasks.iter().collect(),
            Some(ids) => tasks.iter().filter(|t| ids.contains(&t.id)).collect(),
        };

        if affected.is_empty() {
            return "No tasks would be deleted.".to_string();
        }
        let titles: Vec<String> = affected.iter().map(|t| format!("- {}", t.title)).collect();
        format!(
            "This will delete {} task(s):\n{}",
            affected.len(),
            titles.join("\n")
        )
    }
}

fn extract_ids(args: &Value) -> Option<Vec<String>> {
    args.get("task_ids")
        .and_then(|v| v.as_array())
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<Vec<String>>()
        })
        .filter(|ids| !ids.is_empty())
}

#[async_trait]
impl Tool for DeleteTasksTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn preview(&self, args: &Value) -> Option<String> {
        Some(self.describe_pending(args).await)
    }

    async fn execute(&self, args: Value) -> ToolResult<ToolOutput> {
        let ids = extract_ids(&args);
        let removed = self.store.delete(ids.as_deref()).await?;

        if removed.is_empty() {
            return Ok(ToolOutput::success("Nothing to delete."));
        }
        let titles: Vec<String> = removed.iter().map(|t| t.title.clone()).collect();
        Ok(
            ToolOutput::success(format!("Deleted {} task(s): {}", removed.len(), titles.join(", ")))
                .with_data(json!({"deleted": removed.len()})),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> Arc<TaskStore> {
        Arc::new(TaskStore::open(dir.path().join("tasks.json")).unwrap())
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let create = CreateTaskTool::new(store.clone());
        create.execute(json!({"title": "buy milk"})).await.unwrap();

        let list = ListTasksTool::new(store);
        let output = list.execute(json!({})).await.unwrap();
        assert!(output.observation.contains("buy milk"));
    }

    #[tokio::test]
    async fn test_complete_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let task = store.create("finish report").await.unwrap();

        let complete = CompleteTaskTool::new(store.clone());
        let output = complete
            .execute(json!({"task_id": task.id}))
            .await
            .unwrap();
        assert!(output.success);
        assert!(store.list().await[0].done);
    }

    #[tokio::test]
    async fn test_complete_unknown_task_fails() {
        let dir = tempfile::tempdir().unwrap();
        let complete = CompleteTaskTool::new(store(&dir));
        let output = complete.execute(json!({"task_id": "nope"})).await.unwrap();
        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_delete_all_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.create("one").await.unwrap();
        store.create("two").await.unwrap();

        let delete = DeleteTasksTool::new(store.clone());
        let output = delete.execute(json!({})).await.unwrap();
        assert!(output.success);
        assert!(output.observation.contains("Deleted 2 task(s)"));
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_specific_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let keep = store.create("keep me").await.unwrap();
        let drop = store.create("drop me").await.unwrap();

        let delete = DeleteTasksTool::new(store.clone());
        delete
            .execute(json!({"task_ids": [drop.id]}))
            .await
            .unwrap();

        let remaining = store.list().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_delete_is_flagged_for_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let delete = DeleteTasksTool::new(store(&dir));
        assert!(delete.metadata().needs_confirmation);
    }

    #[tokio::test]
    async fn test_describe_pending_names_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.create("water plants").await.unwrap();
        store.create("call mom").await.unwrap();

        let delete = DeleteTasksTool::new(store);
        let preview = delete.describe_pending(&json!({})).await;
        assert!(preview.contains("water plants"));
        assert!(preview.contains("call mom"));
        assert!(preview.contains("2 task(s)"));
    }

    #[tokio::test]
    async fn test_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        {
            let store = TaskStore::open(&path).unwrap();
            store.create("durable").await.unwrap();
        }
        let store = TaskStore::open(&path).unwrap();
        assert_eq!(store.list().await.len(), 1);
    }
}
