//! HTTP surface of the render service.
//!
//! Provides endpoints for:
//! - Render submission (`POST /render`)
//! - Task polling (`GET /render/{taskId}`)
//! - Job listing (`GET /jobs`)
//! - Artifact retrieval (`GET /output/{filename}`)
//! - Composition introspection (`GET /compositions`)
//! - Health check (`GET /health`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // API routes
        .route("/", get(handlers::api_index))
        .route("/render", post(handlers::submit_render))
        .route("/render/:task_id", get(handlers::get_task))
        .route("/jobs", get(handlers::list_jobs))
        .route("/compositions", get(handlers::list_compositions))
        // Artifact retrieval shares the directory the invoker writes into
        // and the sweeper deletes from.
        .nest_service("/output", ServeDir::new(&state.config.output_dir))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
