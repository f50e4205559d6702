//! Shared application state.

use std::sync::Arc;

use renderq_core::TaskStore;

use crate::config::Config;
use crate::engine::RenderEngine;

/// Shared application state: the task store, the engine handle, and the
/// configuration. Everything that serves a request or drives a render holds
/// one `Arc<AppState>`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,

    /// The single source of truth for task state.
    pub store: TaskStore,

    /// Rendering-engine collaborator. Injected so tests can script it.
    pub engine: Arc<dyn RenderEngine>,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(config: Config, engine: Arc<dyn RenderEngine>) -> Arc<Self> {
        Arc::new(Self {
            config,
            store: TaskStore::new(),
            engine,
        })
    }
}
