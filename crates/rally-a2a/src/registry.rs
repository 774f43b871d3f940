//! In-memory task registry — owns task lifecycle for a receiving agent
//!
//! Process-wide store shared behind `Arc`. All mutation to a given task
//! happens under the write lock, so concurrent creation races on one
//! identifier resolve to a single winning task.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::A2aError;
use crate::protocol::{Artifact, Message, Task, TaskState, TaskStatus};

/// Tracks task identity, status, and message history for one agent.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent create: returns the existing task for this identifier, or
    /// inserts a fresh one (submitted, empty history) if absent. Exactly one
    /// task is ever created per identifier, regardless of racing callers.
    pub async fn create_or_get(&self, task_id: &str) -> Task {
        let mut tasks = self.tasks.write().await;
        tasks
            .entry(task_id.to_string())
            .or_insert_with(|| {
                debug!("creating task {task_id}");
                Task::new(task_id)
            })
            .clone()
    }

    /// Append a message to a task's history. History only grows.
    pub async fn append_message(&self, task_id: &str, message: Message) -> Result<(), A2aError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| A2aError::NotFound(task_id.to_string()))?;
        task.history.push(message);
        Ok(())
    }

    /// Attach an artifact to a task, preserving artifact order.
    pub async fn add_artifact(&self, task_id: &str, artifact: Artifact) -> Result<(), A2aError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| A2aError::NotFound(task_id.to_string()))?;
        task.artifacts.get_or_insert_with(Vec::new).push(artifact);
        Ok(())
    }

    /// Transition a task through the state machine. An illegal transition
    /// fails and leaves the stored task unchanged. Re-entering the current
    /// state only refreshes the status timestamp.
    pub async fn set_status(&self, task_id: &str, new_state: TaskState) -> Result<(), A2aError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| A2aError::NotFound(task_id.to_string()))?;

        let current = task.status.state;
        if current != new_state && !transition_allowed(current, new_state) {
            return Err(A2aError::InvalidTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        debug!("task {task_id}: {current} -> {new_state}");
        task.status = TaskStatus::new(new_state);
        Ok(())
    }

    /// Return a copy of the task. `history_length` limits the copy to the
    /// most recent N entries (0 means empty history; None means full).
    pub async fn get(
        &self,
        task_id: &str,
        history_length: Option<usize>,
    ) -> Result<Task, A2aError> {
        let tasks = self.tasks.read().await;
        let mut task = tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| A2aError::NotFound(task_id.to_string()))?;
        if let Some(n) = history_length {
            let skip = task.history.len().saturating_sub(n);
            task.history.drain(..skip);
        }
        Ok(task)
    }
}

/// The transition table. Terminal states admit nothing; `unknown` is never a
/// valid explicit target.
fn transition_allowed(from: TaskState, to: TaskState) -> bool {
    use TaskState::*;
    match (from, to) {
        (Submitted, Working) => true,
        (Submitted, Canceled) | (Submitted, Failed) => true,
        (Working, Completed) | (Working, Canceled) | (Working, Failed) => true,
        (Working, InputRequired) => true,
        (InputRequired, Working) | (InputRequired, Canceled) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Part, Role};

    fn message(text: &str) -> Message {
        Message {
            role: Role::User,
            parts: vec![Part::text(text)],
            message_id: None,
            task_id: None,
            context_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_or_get_is_idempotent() {
        let registry = TaskRegistry::new();
        let first = registry.create_or_get("t1").await;
        registry.append_message("t1", message("hello")).await.unwrap();
        let second = registry.create_or_get("t1").await;
        assert_eq!(first.id, second.id);
        assert_eq!(first.status.state, TaskState::Submitted);
        // the second call returned the existing task, not a fresh one
        assert_eq!(second.history.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_create_single_winner() {
        let registry = TaskRegistry::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create_or_get("raced").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        registry.append_message("raced", message("once")).await.unwrap();
        let task = registry.get("raced", None).await.unwrap();
        assert_eq!(task.history.len(), 1);
    }

    #[tokio::test]
    async fn test_happy_path_transitions() {
        let registry = TaskRegistry::new();
        registry.create_or_get("t1").await;
        registry.set_status("t1", TaskState::Working).await.unwrap();
        registry.set_status("t1", TaskState::Completed).await.unwrap();
        let task = registry.get("t1", None).await.unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_input_required_round_trip() {
        let registry = TaskRegistry::new();
        registry.create_or_get("t1").await;
        registry.set_status("t1", TaskState::Working).await.unwrap();
        registry.set_status("t1", TaskState::InputRequired).await.unwrap();
        registry.set_status("t1", TaskState::Working).await.unwrap();
        let task = registry.get("t1", None).await.unwrap();
        assert_eq!(task.status.state, TaskState::Working);
    }

    #[tokio::test]
    async fn test_no_transition_away_from_terminal() {
        let registry = TaskRegistry::new();
        registry.create_or_get("t1").await;
        registry.set_status("t1", TaskState::Working).await.unwrap();
        registry.set_status("t1", TaskState::Completed).await.unwrap();
        let err = registry.set_status("t1", TaskState::Working).await.unwrap_err();
        assert!(matches!(err, A2aError::InvalidTransition { .. }));
        // stored task unchanged
        let task = registry.get("t1", None).await.unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_unknown_is_never_a_valid_target() {
        let registry = TaskRegistry::new();
        registry.create_or_get("t1").await;
        let err = registry.set_status("t1", TaskState::Unknown).await.unwrap_err();
        assert!(matches!(err, A2aError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_history_is_append_only_and_ordered() {
        let registry = TaskRegistry::new();
        registry.create_or_get("t1").await;
        for text in ["m1", "m2", "m3"] {
            registry.append_message("t1", message(text)).await.unwrap();
        }
        let task = registry.get("t1", Some(2)).await.unwrap();
        let texts: Vec<_> = task.history.iter().map(Message::joined_text).collect();
        assert_eq!(texts, vec!["m2", "m3"]);

        let empty = registry.get("t1", Some(0)).await.unwrap();
        assert!(empty.history.is_empty());

        let full = registry.get("t1", None).await.unwrap();
        assert_eq!(full.history.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_task_errors() {
        let registry = TaskRegistry::new();
        assert!(matches!(
            registry.get("missing", None).await.unwrap_err(),
            A2aError::NotFound(_)
        ));
        assert!(matches!(
            registry.append_message("missing", message("x")).await.unwrap_err(),
            A2aError::NotFound(_)
        ));
    }
}
