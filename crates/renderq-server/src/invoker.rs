//! Render invoker: drives one submitted task to a terminal state.
//!
//! Spawned detached from the submit request; every outcome after that point
//! is captured into the task record, never thrown. State machine:
//! `Queued -> Processing -> {Completed | Failed}`.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use renderq_core::{
    RenderResult, Task, TaskError, TaskId, PROGRESS_ENGINE_DONE, PROGRESS_ENGINE_START,
};

use crate::engine::{EngineError, RenderJob};
use crate::state::AppState;

/// Capacity of the per-task progress channel. The engine side uses
/// `try_send`, so a full buffer drops intermediate samples instead of
/// stalling the engine callback.
const PROGRESS_BUFFER: usize = 32;

/// Launch the render for an already-stored task as a detached background
/// unit of work. Returns immediately.
pub fn spawn_render(state: Arc<AppState>, task_id: TaskId) {
    tokio::spawn(run_render(state, task_id));
}

/// Remap an engine progress fraction in [0, 1) into the task's overall
/// progress band. Pre-flight work owns [0, 15); finalization owns (95, 100].
fn band_progress(fraction: f64) -> u8 {
    let span = f64::from(PROGRESS_ENGINE_DONE - PROGRESS_ENGINE_START);
    let banded = f64::from(PROGRESS_ENGINE_START) + fraction.clamp(0.0, 1.0) * span;
    banded.round() as u8
}

async fn run_render(state: Arc<AppState>, task_id: TaskId) {
    apply(&state, &task_id, |t| {
        t.begin_processing("Preparing render");
    })
    .await;

    let Some(task) = state.store.get(&task_id).await else {
        warn!(task_id = %task_id, "Task vanished before render start");
        return;
    };

    // Pre-flight: resolve the output location and make sure the directory
    // exists. Failing here never reaches the engine.
    let output_path = state.config.output_dir.join(&task.output_file_name);
    if let Err(e) = tokio::fs::create_dir_all(&state.config.output_dir).await {
        error!(task_id = %task_id, error = %e, "Output directory preparation failed");
        let detail = state
            .config
            .development
            .then(|| format!("create_dir_all({}): {e}", state.config.output_dir.display()));
        apply(&state, &task_id, |t| {
            t.fail(
                TaskError {
                    message: format!("Failed to prepare output directory: {e}"),
                    detail,
                },
                "Render failed",
            );
        })
        .await;
        return;
    }

    apply(&state, &task_id, |t| {
        t.update_progress(PROGRESS_ENGINE_START, "Starting render engine");
    })
    .await;

    let job = RenderJob {
        composition_id: task.composition_id.clone(),
        input_props: task.input_props.clone(),
        output_path: output_path.clone(),
        options: task.render_options.clone(),
    };

    info!(
        task_id = %task_id,
        composition = %job.composition_id,
        output = %output_path.display(),
        "Starting render"
    );

    let started = Instant::now();
    let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_BUFFER);
    let engine = Arc::clone(&state.engine);
    let render = tokio::spawn(async move { engine.render(job, progress_tx).await });

    // Consume progress until the engine drops its sender. The engine
    // callback never touches the store lock; this loop is the single
    // producer of this task's mutations. The channel closes when the render
    // future finishes, panics included, so the drain always terminates.
    while let Some(fraction) = progress_rx.recv().await {
        let pct = band_progress(fraction);
        apply(&state, &task_id, |t| {
            t.update_progress(pct, format!("Rendering: {pct}%"));
        })
        .await;
    }

    let outcome = render.await;
    finalize(&state, &task_id, &task, outcome, started.elapsed().as_secs_f64()).await;
}

async fn finalize(
    state: &Arc<AppState>,
    task_id: &TaskId,
    task: &Task,
    outcome: Result<Result<crate::engine::RenderedMedia, EngineError>, tokio::task::JoinError>,
    elapsed_seconds: f64,
) {
    match outcome {
        Ok(Ok(media)) => {
            let output_path = state.config.output_dir.join(&task.output_file_name);
            let result = RenderResult {
                output_path: output_path.display().to_string(),
                output_file_name: task.output_file_name.clone(),
                download_url: format!("/output/{}", task.output_file_name),
                width: media.width,
                height: media.height,
                fps: media.fps,
                duration_in_frames: media.duration_in_frames,
                applied_scale: task.render_options.scale,
                duration_seconds: elapsed_seconds,
            };
            info!(
                task_id = %task_id,
                seconds = elapsed_seconds,
                frames = media.duration_in_frames,
                "Render complete"
            );
            apply(state, task_id, |t| t.complete(result, "Render complete")).await;
        }
        Ok(Err(e)) => {
            error!(task_id = %task_id, error = %e, "Render failed");
            let detail = state
                .config
                .development
                .then(|| e.detail().map(str::to_owned).unwrap_or_else(|| format!("{e:?}")));
            apply(state, task_id, |t| {
                t.fail(
                    TaskError {
                        message: e.to_string(),
                        detail,
                    },
                    "Render failed",
                );
            })
            .await;
        }
        Err(join_err) => {
            error!(task_id = %task_id, error = %join_err, "Render driver panicked");
            apply(state, task_id, |t| {
                t.fail(
                    TaskError {
                        message: "Render aborted unexpectedly".to_string(),
                        detail: None,
                    },
                    "Render failed",
                );
            })
            .await;
        }
    }
}

/// Apply a mutation, tolerating a task that was swept mid-flight. A missing
/// id here is a documented race with the retention sweeper, not a crash.
async fn apply<F>(state: &Arc<AppState>, task_id: &TaskId, f: F)
where
    F: FnOnce(&mut Task),
{
    if let Err(e) = state.store.mutate(task_id, f).await {
        warn!(task_id = %task_id, error = %e, "Dropping update for missing task");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::{CompositionInfo, RenderEngine, RenderedMedia};
    use async_trait::async_trait;
    use renderq_core::{RenderOptions, TaskStatus};
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_config(output_dir: PathBuf) -> Config {
        Config {
            port: 0,
            output_dir,
            engine_script: PathBuf::from("engine/render.mjs"),
            browser_executable: None,
            development: false,
            retention_hours: 24,
            sweep_interval_secs: 3600,
        }
    }

    /// Engine that replays a script of progress fractions, then succeeds or
    /// fails.
    struct ScriptedEngine {
        fractions: Vec<f64>,
        outcome: Result<RenderedMedia, String>,
    }

    #[async_trait]
    impl RenderEngine for ScriptedEngine {
        async fn render(
            &self,
            _job: RenderJob,
            progress: tokio::sync::mpsc::Sender<f64>,
        ) -> Result<RenderedMedia, EngineError> {
            for f in &self.fractions {
                progress.send(*f).await.ok();
            }
            match &self.outcome {
                Ok(media) => Ok(media.clone()),
                Err(message) => Err(EngineError::Render {
                    message: message.clone(),
                    detail: Some("stack trace".to_string()),
                }),
            }
        }

        async fn compositions(&self) -> Result<Vec<CompositionInfo>, EngineError> {
            Ok(Vec::new())
        }
    }

    fn media() -> RenderedMedia {
        RenderedMedia {
            width: 960,
            height: 540,
            fps: 30.0,
            duration_in_frames: 150,
        }
    }

    async fn submit_and_run(
        engine: ScriptedEngine,
        development: bool,
    ) -> (Arc<AppState>, TaskId, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().join("output"));
        config.development = development;
        let state = AppState::new(config, Arc::new(engine));

        let task = Task::new(
            "MyVideo",
            serde_json::json!({"title": "Hello"}),
            "a.mp4",
            RenderOptions::default(),
        );
        let id = task.id.clone();
        state.store.insert(task).await.unwrap();

        run_render(state.clone(), id.clone()).await;
        (state, id, dir)
    }

    #[test]
    fn test_band_progress_endpoints() {
        assert_eq!(band_progress(0.0), 15);
        assert_eq!(band_progress(0.5), 55);
        assert_eq!(band_progress(1.0), 95);
    }

    #[test]
    fn test_band_progress_clamps_out_of_range() {
        assert_eq!(band_progress(-0.3), 15);
        assert_eq!(band_progress(7.0), 95);
    }

    #[tokio::test]
    async fn test_happy_path_completes_task() {
        let engine = ScriptedEngine {
            fractions: vec![0.0, 0.25, 0.5, 0.99],
            outcome: Ok(media()),
        };
        let (state, id, _dir) = submit_and_run(engine, false).await;

        let task = state.store.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.completed_at.is_some());
        assert!(task.error.is_none());

        let result = task.result.unwrap();
        assert_eq!(result.output_file_name, "a.mp4");
        assert_eq!(result.download_url, "/output/a.mp4");
        assert_eq!(result.width, 960);
        assert_eq!(result.height, 540);
        assert_eq!(result.applied_scale, 0.5);
        assert!(result.duration_seconds >= 0.0);

        // pre-flight created the output directory
        assert!(state.config.output_dir.is_dir());
    }

    #[tokio::test]
    async fn test_engine_failure_fails_task_without_detail_in_production() {
        let engine = ScriptedEngine {
            fractions: vec![0.5],
            outcome: Err("browser crashed".to_string()),
        };
        let (state, id, _dir) = submit_and_run(engine, false).await;

        let task = state.store.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.failed_at.is_some());
        assert!(task.result.is_none());
        // progress frozen at the last banded value
        assert_eq!(task.progress, 55);

        let error = task.error.unwrap();
        assert!(error.message.contains("browser crashed"));
        assert!(error.detail.is_none());
    }

    #[tokio::test]
    async fn test_engine_failure_keeps_detail_in_development() {
        let engine = ScriptedEngine {
            fractions: vec![],
            outcome: Err("boom".to_string()),
        };
        let (state, id, _dir) = submit_and_run(engine, true).await;

        let task = state.store.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.unwrap().detail.as_deref(), Some("stack trace"));
    }

    #[tokio::test]
    async fn test_preflight_failure_never_invokes_engine() {
        // Point the output directory at an existing file so create_dir_all
        // fails.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("output");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let engine = ScriptedEngine {
            fractions: vec![0.9],
            outcome: Ok(media()),
        };
        let state = AppState::new(test_config(blocker), Arc::new(engine));

        let task = Task::new(
            "MyVideo",
            serde_json::json!({}),
            "a.mp4",
            RenderOptions::default(),
        );
        let id = task.id.clone();
        state.store.insert(task).await.unwrap();

        run_render(state.clone(), id.clone()).await;

        let task = state.store.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        // failed during pre-flight, before the engine band starts
        assert!(task.progress < PROGRESS_ENGINE_START);
        assert!(task
            .error
            .unwrap()
            .message
            .contains("output directory"));
    }

    #[tokio::test]
    async fn test_swept_task_is_dropped_silently() {
        let engine = ScriptedEngine {
            fractions: vec![],
            outcome: Ok(media()),
        };
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(test_config(dir.path().join("output")), Arc::new(engine));

        // Never inserted: every mutation hits NotFound and must not panic.
        let id = TaskId::generate();
        tokio::time::timeout(Duration::from_secs(5), run_render(state.clone(), id))
            .await
            .unwrap();
        assert!(state.store.is_empty().await);
    }
}
