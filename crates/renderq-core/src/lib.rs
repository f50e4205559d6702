//! renderq Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - The rendering engine
//! - Filesystem
//!
//! All types here represent the core business domain of renderq: render
//! tasks, their lifecycle state machine, and the in-memory task store.

pub mod error;
pub mod ids;
pub mod status;
pub mod store;
pub mod task;

// Re-export commonly used types
pub use error::StoreError;
pub use ids::TaskId;
pub use status::TaskStatus;
pub use store::TaskStore;
pub use task::{
    RenderOptions, RenderResult, Task, TaskError, TaskSummary, PROGRESS_ENGINE_DONE,
    PROGRESS_ENGINE_START,
};
