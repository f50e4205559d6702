//! Core domain errors.

use crate::TaskId;
use thiserror::Error;

/// Errors surfaced by the task store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Insert with an id that is already present. Ids come from a random
    /// UUID generator, so hitting this indicates a logic fault upstream.
    #[error("Task id already present: {0}")]
    DuplicateId(TaskId),

    /// Mutation of an id that is absent (never issued, or already swept).
    #[error("Task not found: {0}")]
    NotFound(TaskId),
}
