//! TaskStateManager - process-wide table of task lifecycle states
//!
//! The single source of truth that cancellation checks consult. It is an
//! injected, lock-guarded registry: components receive a clone explicitly
//! rather than reaching for ambient shared state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::TaskState;

/// Shared task → state table
///
/// Cloning is cheap and all clones share the same underlying table.
#[derive(Clone)]
pub struct TaskStateManager {
    states: Arc<RwLock<HashMap<String, TaskState>>>,
}

impl TaskStateManager {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Set the state for a task
    pub async fn set(&self, task_id: &str, state: TaskState) {
        let mut states = self.states.write().await;
        states.insert(task_id.to_string(), state);
        tracing::debug!(task_id = %task_id, state = %state, "[TaskStateManager] State set");
    }

    /// Get the internal state for a task
    pub async fn get(&self, task_id: &str) -> Option<TaskState> {
        let states = self.states.read().await;
        states.get(task_id).copied()
    }

    /// Get the externally visible state for a task
    ///
    /// `Interrupted` is never reported; callers see `Cancelled`.
    pub async fn get_external(&self, task_id: &str) -> Option<TaskState> {
        self.get(task_id).await.map(|s| s.as_external())
    }

    /// Check whether cancellation was requested for a task
    pub async fn is_cancel_requested(&self, task_id: &str) -> bool {
        matches!(
            self.get(task_id).await,
            Some(TaskState::Cancelled) | Some(TaskState::Interrupted)
        )
    }

    /// Remove a task from the table, returning its last state
    pub async fn remove(&self, task_id: &str) -> Option<TaskState> {
        let mut states = self.states.write().await;
        states.remove(task_id)
    }

    /// Number of tracked tasks
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    /// Check whether the table is empty
    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

impl Default for TaskStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStateManager").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let tasks = TaskStateManager::new();

        assert_eq!(tasks.get("task-1").await, None);

        tasks.set("task-1", TaskState::Running).await;
        assert_eq!(tasks.get("task-1").await, Some(TaskState::Running));

        assert_eq!(tasks.remove("task-1").await, Some(TaskState::Running));
        assert_eq!(tasks.get("task-1").await, None);
    }

    #[tokio::test]
    async fn test_external_view_hides_interrupted() {
        let tasks = TaskStateManager::new();
        tasks.set("task-1", TaskState::Interrupted).await;

        assert_eq!(tasks.get("task-1").await, Some(TaskState::Interrupted));
        assert_eq!(tasks.get_external("task-1").await, Some(TaskState::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_requested_covers_both_states() {
        let tasks = TaskStateManager::new();

        tasks.set("task-1", TaskState::Running).await;
        assert!(!tasks.is_cancel_requested("task-1").await);

        tasks.set("task-1", TaskState::Cancelled).await;
        assert!(tasks.is_cancel_requested("task-1").await);

        tasks.set("task-1", TaskState::Interrupted).await;
        assert!(tasks.is_cancel_requested("task-1").await);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let tasks = TaskStateManager::new();
        let clone = tasks.clone();

        tasks.set("task-1", TaskState::Completed).await;
        assert_eq!(clone.get("task-1").await, Some(TaskState::Completed));
    }
}
