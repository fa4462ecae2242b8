//! Task lifecycle state types

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task
///
/// `Interrupted` is internal-only: it means the upstream agent acknowledged a
/// cancellation and the session was preserved for a later resume. Callers never
/// see it; [`TaskState::as_external`] maps it to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Task is actively streaming
    Running,

    /// Cancellation acknowledged by the upstream agent, session preserved
    Interrupted,

    /// Task was cancelled by the user or by shutdown
    Cancelled,

    /// Task completed successfully
    Completed,

    /// Task failed
    Failed,
}

impl TaskState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Interrupted | TaskState::Cancelled | TaskState::Completed | TaskState::Failed
        )
    }

    /// Map to the externally visible state
    ///
    /// `Interrupted` is reported as `Cancelled`; every other state is itself.
    pub fn as_external(&self) -> TaskState {
        match self {
            TaskState::Interrupted => TaskState::Cancelled,
            other => *other,
        }
    }

    /// Check if the task was cancelled from the caller's point of view
    pub fn is_cancelled_external(&self) -> bool {
        self.as_external() == TaskState::Cancelled
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Running => write!(f, "RUNNING"),
            TaskState::Interrupted => write!(f, "INTERRUPTED"),
            TaskState::Cancelled => write!(f, "CANCELLED"),
            TaskState::Completed => write!(f, "COMPLETED"),
            TaskState::Failed => write!(f, "FAILED"),
        }
    }
}
