//! Concurrency-safe in-memory task store.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{StoreError, Task, TaskId, TaskSummary};

/// The single source of truth for task state.
///
/// An explicitly owned, injectable store: the API layer, the render driver,
/// and the retention sweeper all hold a shared handle to one instance, and
/// tests can spin up as many independent stores as they like.
///
/// All mutation goes through [`TaskStore::mutate`] under the write lock, so
/// per-task updates are serialized and two tasks can never corrupt each
/// other. Reads clone the record out and never hold the lock across awaits.
/// The store owns no filesystem or network handles.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl TaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created task.
    ///
    /// Fails with [`StoreError::DuplicateId`] if the id is already present,
    /// which cannot happen with generated ids.
    pub async fn insert(&self, task: Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateId(task.id.clone()));
        }
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Fetch a snapshot of a task by id.
    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Atomically apply a transformation to an existing task.
    ///
    /// Fails with [`StoreError::NotFound`] if the id is absent - a race the
    /// sweeper can legitimately produce for late in-flight updates.
    pub async fn mutate<F>(&self, id: &TaskId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(id) {
            Some(task) => {
                f(task);
                Ok(())
            }
            None => Err(StoreError::NotFound(id.clone())),
        }
    }

    /// List summaries of all retained tasks, oldest first.
    pub async fn list(&self) -> Vec<TaskSummary> {
        let tasks = self.tasks.read().await;
        let mut summaries: Vec<TaskSummary> = tasks.values().map(Task::summary).collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    /// Remove a task, returning it if it was present.
    ///
    /// Silent no-op when the id is absent; the sweeper may race with
    /// external deletion.
    pub async fn remove(&self, id: &TaskId) -> Option<Task> {
        self.tasks.write().await.remove(id)
    }

    /// Number of retained tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
