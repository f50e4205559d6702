//! HTTP request handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use tracing::{error, info};

use renderq_core::{Task, TaskId};

use crate::http::responses::{ApiError, JobsResponse, RenderAccepted, RenderRequest};
use crate::invoker;
use crate::state::AppState;

const DEFAULT_COMPOSITION: &str = "MyVideo";

/// Submit a render. Inserts a queued task, launches the render detached,
/// and returns the task id without waiting on any engine work.
pub async fn submit_render(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let composition_id = request
        .composition_id
        .unwrap_or_else(|| DEFAULT_COMPOSITION.to_string());
    let output_file_name = match request.output_file_name {
        Some(name) => validated_file_name(name)?,
        None => format!("video-{}.mp4", Utc::now().timestamp_millis()),
    };
    let input_props = request.input_props.unwrap_or_else(|| serde_json::json!({}));
    let render_options = request.render_options.unwrap_or_default();

    let task = Task::new(
        composition_id,
        input_props,
        output_file_name,
        render_options.clone(),
    );
    let task_id = task.id.clone();

    if let Err(e) = state.store.insert(task).await {
        error!(task_id = %task_id, error = %e, "Task creation failed");
        return Err(ApiError::Internal("Failed to create task".to_string()));
    }

    invoker::spawn_render(state.clone(), task_id.clone());
    info!(task_id = %task_id, "Render task queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(RenderAccepted {
            success: true,
            task_id,
            status: renderq_core::TaskStatus::Queued,
            render_options,
        }),
    ))
}

/// Fetch the full current record of one task.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = TaskId::from(task_id);
    let mut task = state
        .store
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {id}")))?;

    // Full diagnostic detail stays internal outside development.
    if !state.config.development {
        if let Some(error) = &mut task.error {
            error.detail = None;
        }
    }
    Ok(Json(task))
}

/// List summaries of all retained tasks, oldest first.
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let jobs = state.store.list().await;
    Json(JobsResponse {
        success: true,
        total: jobs.len(),
        jobs,
    })
}

/// Health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "renderq",
    }))
}

/// List the compositions the engine can render.
pub async fn list_compositions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let compositions = state.engine.compositions().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "compositions": compositions,
    })))
}

/// API index served at the root path.
pub async fn api_index() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "renderq",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /health": "health check",
            "GET /compositions": "list renderable compositions",
            "POST /render": "submit a render - { compositionId, inputProps, outputFileName, renderOptions }",
            "GET /render/{taskId}": "poll one task",
            "GET /jobs": "list all retained tasks",
            "GET /output/{filename}": "fetch a rendered artifact",
        },
        "example": {
            "compositionId": "MyVideo",
            "inputProps": { "title": "Hello" },
            "outputFileName": "my-video.mp4",
            "renderOptions": { "scale": 0.5, "crf": 28 },
        },
    }))
}

/// Reject output names that escape the output directory or are unusable.
fn validated_file_name(name: String) -> Result<String, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation(
            "outputFileName must not be empty".to_string(),
        ));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ApiError::Validation(
            "outputFileName must be a plain file name".to_string(),
        ));
    }
    Ok(name)
}
