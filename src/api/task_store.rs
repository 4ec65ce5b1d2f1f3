//! Task storage.
//!
//! Tasks live in memory only; nothing survives a restart. The store hands out
//! [`SharedTask`] handles so the worker running a task and the handlers
//! polling it see the same record.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::task::{SharedTask, Task};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a pending task for `prompt`.
    async fn create_task(&self, prompt: &str) -> Result<SharedTask, String>;

    /// Snapshot of a task by id.
    async fn get_task(&self, id: &str) -> Result<Option<Task>, String>;

    /// Snapshots of every task, oldest first.
    async fn list_tasks(&self) -> Result<Vec<Task>, String>;

    /// Drop a task that was never handed to a worker.
    async fn remove_task(&self, id: &str) -> Result<(), String>;
}

#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, SharedTask>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(&self, prompt: &str) -> Result<SharedTask, String> {
        let task = Task::new(prompt);
        let id = task.id().to_string();
        let shared = task.into_shared();
        self.tasks.write().await.insert(id, Arc::clone(&shared));
        Ok(shared)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, String> {
        let shared = self.tasks.read().await.get(id).cloned();
        match shared {
            Some(task) => Ok(Some(task.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, String> {
        let handles: Vec<SharedTask> = self.tasks.read().await.values().cloned().collect();
        let mut tasks = Vec::with_capacity(handles.len());
        for handle in handles {
            tasks.push(handle.read().await.clone());
        }
        tasks.sort_by(|a, b| a.created_at().cmp(&b.created_at()));
        Ok(tasks)
    }

    async fn remove_task(&self, id: &str) -> Result<(), String> {
        self.tasks
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| format!("Task {} not found", id))
    }
}
