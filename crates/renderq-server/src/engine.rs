//! Rendering-engine boundary.
//!
//! The actual rendering (bundling the composition, driving a headless
//! browser, encoding video) happens outside this process. This module
//! defines the narrow trait the orchestrator needs from it, plus the
//! production adapter that shells out to a Node engine script speaking
//! newline-delimited JSON on stdout.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use renderq_core::RenderOptions;

use crate::config::Config;

/// Errors surfaced by a rendering engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine process I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the engine itself, including its internal
    /// render timeout.
    #[error("Render failed: {message}")]
    Render {
        message: String,
        detail: Option<String>,
    },

    /// The engine process died or closed its stream without reporting an
    /// outcome.
    #[error("Engine protocol error: {0}")]
    Protocol(String),
}

impl EngineError {
    /// Full diagnostic detail, when the engine provided any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Render { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// One render invocation, as handed to the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJob {
    pub composition_id: String,
    pub input_props: serde_json::Value,
    pub output_path: PathBuf,
    #[serde(flatten)]
    pub options: RenderOptions,
}

/// Resolved media metadata reported by the engine on success.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMedia {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_in_frames: u32,
}

/// One entry of the engine's composition introspection listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionInfo {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_in_frames: u32,
    pub duration_in_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_props: Option<serde_json::Value>,
}

/// Event stream the engine script emits on stdout, one JSON object per line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EngineEvent {
    /// Fractional render progress in [0, 1).
    Progress { progress: f64 },
    /// Terminal success with resolved media metadata.
    Done {
        #[serde(flatten)]
        media: RenderedMedia,
    },
    /// Terminal failure.
    Error {
        message: String,
        #[serde(default)]
        stack: Option<String>,
    },
    /// Reply to the `compositions` command.
    Compositions { compositions: Vec<CompositionInfo> },
}

/// The orchestrator's view of a rendering engine.
///
/// `render` drives one invocation to a terminal outcome, pushing fractional
/// progress events into `progress` as they arrive. The sender side must not
/// block on a slow consumer; dropping intermediate updates is fine.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render(
        &self,
        job: RenderJob,
        progress: mpsc::Sender<f64>,
    ) -> Result<RenderedMedia, EngineError>;

    async fn compositions(&self) -> Result<Vec<CompositionInfo>, EngineError>;
}

/// Production engine adapter: spawns the Remotion engine script with Node
/// and translates its NDJSON event stream.
pub struct RemotionEngine {
    script: PathBuf,
    browser_executable: Option<String>,
}

impl RemotionEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            script: config.engine_script.clone(),
            browser_executable: config.browser_executable.clone(),
        }
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new("node");
        cmd.arg(&self.script)
            .arg(subcommand)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(browser) = &self.browser_executable {
            cmd.env("PUPPETEER_EXECUTABLE_PATH", browser);
        }
        cmd
    }

    /// Run one engine command to completion, forwarding progress events and
    /// returning the terminal event stream outcome.
    async fn run(
        &self,
        mut cmd: Command,
        progress: Option<&mpsc::Sender<f64>>,
    ) -> Result<EngineOutcome, EngineError> {
        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Protocol("Failed to get engine stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Protocol("Failed to get engine stderr".to_string()))?;

        // Collect stderr in the background for diagnostics.
        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            let mut collected = String::new();
            while let Ok(Some(line)) = reader.next_line().await {
                debug!(stderr = %line, "engine stderr");
                collected.push_str(&line);
                collected.push('\n');
            }
            collected
        });

        let mut outcome = EngineOutcome::None;
        let mut reader = BufReader::new(stdout).lines();
        while let Some(line) = reader.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<EngineEvent>(line) {
                Ok(EngineEvent::Progress { progress: fraction }) => {
                    if let Some(tx) = progress {
                        // Bounded channel; a full buffer just drops this
                        // sample, the next one carries the newer value.
                        let _ = tx.try_send(fraction);
                    }
                }
                Ok(EngineEvent::Done { media }) => outcome = EngineOutcome::Done(media),
                Ok(EngineEvent::Error { message, stack }) => {
                    outcome = EngineOutcome::Failed { message, stack }
                }
                Ok(EngineEvent::Compositions { compositions }) => {
                    outcome = EngineOutcome::Compositions(compositions)
                }
                Err(e) => warn!(error = %e, line, "Unparseable engine event"),
            }
        }

        let status = child.wait().await?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if let EngineOutcome::None = outcome {
            return Err(EngineError::Protocol(format!(
                "Engine exited ({status}) without reporting an outcome: {}",
                stderr_text.trim()
            )));
        }
        Ok(outcome)
    }
}

enum EngineOutcome {
    None,
    Done(RenderedMedia),
    Failed {
        message: String,
        stack: Option<String>,
    },
    Compositions(Vec<CompositionInfo>),
}

#[async_trait]
impl RenderEngine for RemotionEngine {
    async fn render(
        &self,
        job: RenderJob,
        progress: mpsc::Sender<f64>,
    ) -> Result<RenderedMedia, EngineError> {
        let payload = serde_json::to_string(&job)
            .map_err(|e| EngineError::Protocol(format!("Failed to encode render job: {e}")))?;
        let mut cmd = self.command("render");
        cmd.arg(payload);

        match self.run(cmd, Some(&progress)).await? {
            EngineOutcome::Done(media) => Ok(media),
            EngineOutcome::Failed { message, stack } => Err(EngineError::Render {
                message,
                detail: stack,
            }),
            _ => Err(EngineError::Protocol(
                "Engine reported an unexpected outcome for render".to_string(),
            )),
        }
    }

    async fn compositions(&self) -> Result<Vec<CompositionInfo>, EngineError> {
        match self.run(self.command("compositions"), None).await? {
            EngineOutcome::Compositions(compositions) => Ok(compositions),
            EngineOutcome::Failed { message, stack } => Err(EngineError::Render {
                message,
                detail: stack,
            }),
            _ => Err(EngineError::Protocol(
                "Engine reported an unexpected outcome for compositions".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_event() {
        let event: EngineEvent =
            serde_json::from_str(r#"{"type":"progress","progress":0.42}"#).unwrap();
        assert!(matches!(
            event,
            EngineEvent::Progress { progress } if (progress - 0.42).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn test_parse_done_event() {
        let event: EngineEvent = serde_json::from_str(
            r#"{"type":"done","width":960,"height":540,"fps":30,"durationInFrames":150}"#,
        )
        .unwrap();
        match event {
            EngineEvent::Done { media } => {
                assert_eq!(media.width, 960);
                assert_eq!(media.height, 540);
                assert_eq!(media.duration_in_frames, 150);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_event_without_stack() {
        let event: EngineEvent =
            serde_json::from_str(r#"{"type":"error","message":"timed out"}"#).unwrap();
        match event {
            EngineEvent::Error { message, stack } => {
                assert_eq!(message, "timed out");
                assert!(stack.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_render_job_serializes_flattened_options() {
        let job = RenderJob {
            composition_id: "MyVideo".to_string(),
            input_props: serde_json::json!({"title": "Hello"}),
            output_path: PathBuf::from("/tmp/out/a.mp4"),
            options: RenderOptions::default(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["compositionId"], "MyVideo");
        assert_eq!(value["scale"], 0.5);
        assert_eq!(value["crf"], 28);
        assert_eq!(value["codec"], "h264");
    }
}
