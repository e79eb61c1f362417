// Run counters, kept in-process by the orchestrator or rebuilt from stored runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use netatlas_entity::discovery_run::{self, RunStatus};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct RunMetrics {
    succeeded: AtomicU64,
    failed: AtomicU64,
    last_duration_ms: AtomicU64,
    total_duration_ms: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub last_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunMetrics {
    pub fn record(&self, status: RunStatus, duration: Duration) {
        match status {
            RunStatus::Succeeded => self.succeeded.fetch_add(1, Ordering::Relaxed),
            RunStatus::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
            RunStatus::Queued | RunStatus::Running => return,
        };
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.last_duration_ms.store(ms, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(ms, Ordering::Relaxed);
    }

    /// Replay terminal runs in completion order; a run without timestamps counts as zero time.
    pub fn from_runs<'a>(runs: impl IntoIterator<Item = &'a discovery_run::Model>) -> Self {
        let metrics = RunMetrics::default();
        for run in runs {
            let elapsed = match (run.started_at, run.completed_at) {
                (Some(started), Some(completed)) => {
                    (completed - started).to_std().unwrap_or_default()
                }
                _ => Duration::ZERO,
            };
            metrics.record(run.status, elapsed);
        }
        metrics
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_succeeded: self.succeeded.load(Ordering::Relaxed),
            runs_failed: self.failed.load(Ordering::Relaxed),
            last_duration_ms: self.last_duration_ms.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
        }
    }
}
