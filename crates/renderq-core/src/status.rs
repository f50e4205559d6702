//! Status enum for render tasks.

use serde::{Deserialize, Serialize};

/// Status of a render Task.
///
/// The only legal transition sequence is
/// `Queued -> Processing -> {Completed | Failed}`. The terminal states are
/// final: a failed task stays failed, and resubmission means a new task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task created but the render has not started yet.
    #[default]
    Queued,
    /// Render in flight; progress updates are flowing.
    Processing,
    /// Render finished successfully and the artifact exists.
    Completed,
    /// Render failed; the error field on the task explains why.
    Failed,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the task is still active (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}
