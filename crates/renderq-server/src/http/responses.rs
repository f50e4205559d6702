//! HTTP request and response types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use renderq_core::{RenderOptions, TaskId, TaskStatus, TaskSummary};

use crate::engine::EngineError;

// ============================================================================
// Render submission types
// ============================================================================

/// Request body for the render endpoint. Every field is optional; defaults
/// mirror the composition bundle's main video and a timestamped output name.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub composition_id: Option<String>,
    pub input_props: Option<serde_json::Value>,
    pub output_file_name: Option<String>,
    pub render_options: Option<RenderOptions>,
}

/// Response body for an accepted render submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderAccepted {
    pub success: bool,
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub render_options: RenderOptions,
}

// ============================================================================
// Listing types
// ============================================================================

/// Response for the jobs listing endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsResponse {
    pub success: bool,
    pub total: usize,
    pub jobs: Vec<TaskSummary>,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

/// API-level errors, mapped onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed submit payload, reported synchronously.
    #[error("{0}")]
    Validation(String),

    /// Unknown or evicted task id, or missing artifact.
    #[error("{0}")]
    NotFound(String),

    /// The engine's introspection surface failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Task creation itself failed.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Engine(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Engine(_) => "ENGINE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
