//! Task record and related value types.

use crate::{TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task progress reached once pre-flight preparation is done and the engine
/// is about to start. Engine progress fractions are remapped into the band
/// between this and [`PROGRESS_ENGINE_DONE`], leaving headroom on both sides
/// for preparation and finalization.
pub const PROGRESS_ENGINE_START: u8 = 15;

/// Task progress corresponding to the engine reporting full progress.
pub const PROGRESS_ENGINE_DONE: u8 = 95;

fn default_scale() -> f64 {
    0.5
}

fn default_crf() -> u32 {
    28
}

fn default_codec() -> String {
    "h264".to_string()
}

fn default_concurrency() -> u32 {
    1
}

fn default_timeout_ms() -> u64 {
    // 15 minutes, matching the engine's own internal timeout ceiling.
    900_000
}

/// Options forwarded verbatim to the rendering engine.
///
/// Defaults are chosen to bound peak memory and CPU: half-resolution output,
/// a mid-range quality factor, and a single internal render lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Resolution scale factor applied by the engine.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Constant rate factor (quality knob for h264).
    #[serde(default = "default_crf")]
    pub crf: u32,

    /// Output codec.
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Engine-internal parallelism bound.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Engine-internal timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            crf: default_crf(),
            codec: default_codec(),
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Outcome of a successful render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    /// Absolute path of the rendered artifact on disk.
    pub output_path: String,

    /// File name of the artifact inside the output directory.
    pub output_file_name: String,

    /// Relative URL the artifact can be fetched from.
    pub download_url: String,

    /// Output width in pixels, after the scale factor was applied.
    pub width: u32,

    /// Output height in pixels, after the scale factor was applied.
    pub height: u32,

    /// Frames per second of the output.
    pub fps: f64,

    /// Total number of frames rendered.
    pub duration_in_frames: u32,

    /// Scale factor that was applied.
    pub applied_scale: f64,

    /// Wall-clock render duration in seconds.
    pub duration_seconds: f64,
}

/// Failure details for a failed render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskError {
    /// Human-readable error message, always present.
    pub message: String,

    /// Full diagnostic detail (engine stderr, backtrace-like output).
    /// Exposed externally only in development environments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A Task represents one submitted render request and its tracked lifecycle.
///
/// Submission parameters are captured at creation and never change; only
/// `status`, `progress`, `message`, and the terminal fields mutate, and only
/// through the transition helpers below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Overall progress percentage in [0, 100], non-decreasing.
    pub progress: u8,

    /// Short status description, overwritten on every transition.
    pub message: String,

    /// Composition the engine should render.
    pub composition_id: String,

    /// Input payload handed to the composition.
    pub input_props: serde_json::Value,

    /// File name of the artifact to produce.
    pub output_file_name: String,

    /// Engine options captured at submission.
    pub render_options: RenderOptions,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// When the task completed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// When the task failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,

    /// Populated exactly when `status == Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RenderResult>,

    /// Populated exactly when `status == Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl Task {
    /// Create a new queued Task from submission parameters.
    pub fn new(
        composition_id: impl Into<String>,
        input_props: serde_json::Value,
        output_file_name: impl Into<String>,
        render_options: RenderOptions,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            status: TaskStatus::Queued,
            progress: 0,
            message: "Task queued".to_string(),
            composition_id: composition_id.into(),
            input_props,
            output_file_name: output_file_name.into(),
            render_options,
            created_at: Utc::now(),
            completed_at: None,
            failed_at: None,
            result: None,
            error: None,
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark the render as started: `Queued -> Processing`.
    ///
    /// No-op unless the task is currently queued.
    pub fn begin_processing(&mut self, message: impl Into<String>) {
        if self.status != TaskStatus::Queued {
            return;
        }
        self.status = TaskStatus::Processing;
        self.progress = 0;
        self.message = message.into();
    }

    /// Record a progress update while processing.
    ///
    /// Progress never decreases; stale or out-of-order updates are absorbed
    /// silently. 100 is reserved for the terminal completion write, so
    /// updates are capped at 99. Terminal tasks ignore updates entirely.
    pub fn update_progress(&mut self, progress: u8, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let progress = progress.min(99);
        if progress > self.progress {
            self.progress = progress;
        }
        self.message = message.into();
    }

    /// Terminal transition to `Completed`.
    ///
    /// Sets progress to 100, stamps `completed_at`, and attaches the result.
    /// First terminal write wins: a task that is already terminal is left
    /// untouched.
    pub fn complete(&mut self, result: RenderResult, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.message = message.into();
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        self.error = None;
    }

    /// Terminal transition to `Failed`.
    ///
    /// Progress stays frozen at its last value. First terminal write wins.
    pub fn fail(&mut self, error: TaskError, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Failed;
        self.message = message.into();
        self.failed_at = Some(Utc::now());
        self.error = Some(error);
        self.result = None;
    }

    /// Project this task into its listing summary.
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            composition_id: self.composition_id.clone(),
            output_file_name: self.output_file_name.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            failed_at: self.failed_at,
        }
    }
}

/// Summary of a Task for listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: TaskId,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub composition_id: String,
    pub output_file_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> RenderResult {
        RenderResult {
            output_path: "/output/a.mp4".to_string(),
            output_file_name: "a.mp4".to_string(),
            download_url: "/output/a.mp4".to_string(),
            width: 960,
            height: 540,
            fps: 30.0,
            duration_in_frames: 150,
            applied_scale: 0.5,
            duration_seconds: 12.3,
        }
    }

    fn sample_task() -> Task {
        Task::new(
            "MyVideo",
            serde_json::json!({"title": "Hello"}),
            "a.mp4",
            RenderOptions::default(),
        )
    }

    #[test]
    fn test_new_task_is_queued() {
        let task = sample_task();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress, 0);
        assert!(task.result.is_none());
        assert!(task.error.is_none());
        assert!(task.completed_at.is_none());
        assert!(task.failed_at.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut task = sample_task();
        task.begin_processing("Preparing render");
        assert_eq!(task.status, TaskStatus::Processing);

        task.update_progress(40, "Rendering: 40%");
        assert_eq!(task.progress, 40);

        task.complete(sample_result(), "Render complete");
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.result.is_some());
        assert!(task.error.is_none());
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut task = sample_task();
        task.begin_processing("Preparing render");
        task.update_progress(60, "Rendering: 60%");
        task.update_progress(40, "Rendering: 40%");
        assert_eq!(task.progress, 60);
        // message still reflects the latest update
        assert_eq!(task.message, "Rendering: 40%");
    }

    #[test]
    fn test_progress_update_never_reaches_100() {
        let mut task = sample_task();
        task.begin_processing("Preparing render");
        task.update_progress(250, "Rendering");
        assert_eq!(task.progress, 99);
        assert_eq!(task.status, TaskStatus::Processing);
    }

    #[test]
    fn test_fail_freezes_progress() {
        let mut task = sample_task();
        task.begin_processing("Preparing render");
        task.update_progress(55, "Rendering: 55%");
        task.fail(
            TaskError {
                message: "engine exploded".to_string(),
                detail: None,
            },
            "Render failed",
        );
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, 55);
        assert!(task.error.is_some());
        assert!(task.result.is_none());
        assert!(task.failed_at.is_some());
    }

    #[test]
    fn test_first_terminal_write_wins() {
        let mut task = sample_task();
        task.begin_processing("Preparing render");
        task.complete(sample_result(), "Render complete");
        task.fail(
            TaskError {
                message: "late failure".to_string(),
                detail: None,
            },
            "Render failed",
        );
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.is_some());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_terminal_ignores_progress_updates() {
        let mut task = sample_task();
        task.begin_processing("Preparing render");
        task.complete(sample_result(), "Render complete");
        task.update_progress(42, "stale");
        assert_eq!(task.progress, 100);
        assert_eq!(task.message, "Render complete");
    }

    #[test]
    fn test_begin_processing_only_from_queued() {
        let mut task = sample_task();
        task.begin_processing("first");
        task.update_progress(80, "Rendering: 80%");
        task.begin_processing("second");
        assert_eq!(task.progress, 80);
        assert_eq!(task.message, "Rendering: 80%");
    }

    #[test]
    fn test_render_options_defaults() {
        let opts: RenderOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.scale, 0.5);
        assert_eq!(opts.crf, 28);
        assert_eq!(opts.codec, "h264");
        assert_eq!(opts.concurrency, 1);
        assert_eq!(opts.timeout_ms, 900_000);
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = sample_task();
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("compositionId").is_some());
        assert!(json.get("createdAt").is_some());
        // terminal fields are omitted until set
        assert!(json.get("completedAt").is_none());
        assert!(json.get("result").is_none());
    }
}
