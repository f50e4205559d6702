//! Retention sweeper: evicts old tasks and deletes their artifacts.

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::state::AppState;

/// Periodic background sweep over the task store.
///
/// Any task older than the retention window is evicted regardless of
/// status, and its backing artifact (if one was produced) is deleted from
/// the output directory. Owned by the process lifecycle: started at
/// startup, cancelled at shutdown.
pub struct Sweeper {
    state: Arc<AppState>,
    retention: Duration,
}

impl Sweeper {
    pub fn new(state: Arc<AppState>) -> Self {
        let retention = Duration::hours(state.config.retention_hours);
        Self { state, retention }
    }

    /// Run until cancelled, sweeping once per configured interval.
    pub async fn run(self, cancel: CancellationToken) {
        let period = std::time::Duration::from_secs(self.state.config.sweep_interval_secs);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Retention sweeper stopping");
                    return;
                }
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// One pass over the store. Best-effort per task: an artifact that
    /// cannot be deleted is logged and the sweep moves on. Returns the
    /// number of evicted tasks.
    pub async fn sweep_once(&self) -> usize {
        let cutoff = Utc::now() - self.retention;
        let expired: Vec<_> = self
            .state
            .store
            .list()
            .await
            .into_iter()
            .filter(|s| s.created_at < cutoff)
            .map(|s| s.id)
            .collect();

        let mut evicted = 0;
        for id in expired {
            // Snapshot first; the record may still receive a late terminal
            // write, which is fine - removal afterwards wins.
            if let Some(task) = self.state.store.get(&id).await {
                if let Some(result) = &task.result {
                    delete_artifact(Path::new(&result.output_path)).await;
                }
            }
            if self.state.store.remove(&id).await.is_some() {
                info!(task_id = %id, "Evicted expired task");
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, "Retention sweep finished");
        }
        evicted
    }
}

/// Delete one artifact if it still exists. Existence is checked first so a
/// concurrent external deletion is not treated as a failure.
async fn delete_artifact(path: &Path) {
    match tokio::fs::try_exists(path).await {
        Ok(true) => {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete artifact");
            } else {
                info!(path = %path.display(), "Deleted expired artifact");
            }
        }
        Ok(false) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to stat artifact"),
    }
}
