// Run lifecycle API.

use chrono::{DateTime, Utc};
use log::info;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use netatlas_entity::{discovery_run, discovery_run_log};

use crate::config::DiscoveryConfig;
use crate::db::runs;
use crate::discovery::plan::Preset;
use crate::discovery::targets::{local_scope, Scope};
use crate::error::{Error, Result};
use crate::metrics::{MetricsSnapshot, RunMetrics};
use crate::pagination::{Page, PageRequest};

#[derive(Clone, Debug, Default)]
pub struct StartRun {
    pub scope: Option<String>,
    pub preset: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunStatusReport {
    /// `idle` when no run was ever queued, otherwise the latest run's status.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<discovery_run::Model>,
    /// Counts and durations over every stored terminal run.
    pub totals: MetricsSnapshot,
}

fn resolve_scope(requested: Option<&str>, config: &DiscoveryConfig) -> Result<Scope> {
    if let Some(scope) = requested.map(str::trim).filter(|s| !s.is_empty()) {
        return Scope::parse(scope);
    }
    if let Some(scope) = config.default_scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return Scope::parse(scope);
    }
    local_scope().ok_or_else(|| {
        Error::validation(
            "invalid_scope",
            "no scope given, no default_scope configured, and no local IPv4 network found",
        )
    })
}

// Trimmed, non-empty, first occurrence wins.
fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !cleaned.iter().any(|c| c == tag) {
            cleaned.push(tag.to_string());
        }
    }
    cleaned
}

/// Validate and queue a run; the orchestrator picks it up on its next poll.
pub async fn start_run(
    db: &DatabaseConnection,
    config: &DiscoveryConfig,
    request: &StartRun,
    now: DateTime<Utc>,
) -> Result<discovery_run::Model> {
    let scope = resolve_scope(request.scope.as_deref(), config)?;
    let preset = Preset::parse(request.preset.as_deref())?;
    let tags = clean_tags(&request.tags);
    let run = runs::queue(db, &scope.to_string(), preset.as_str(), &tags, now).await?;
    info!(
        "queued run {} for {} (preset {})",
        run.run_id,
        run.scope,
        preset.as_str()
    );
    Ok(run)
}

pub async fn status(db: &DatabaseConnection) -> Result<RunStatusReport> {
    let totals = RunMetrics::from_runs(&runs::terminal(db).await?).snapshot();
    Ok(match runs::latest(db).await? {
        Some(run) => RunStatusReport {
            status: run.status.as_str(),
            run: Some(run),
            totals,
        },
        None => RunStatusReport {
            status: "idle",
            run: None,
            totals,
        },
    })
}

pub async fn list_runs(
    db: &DatabaseConnection,
    cursor: Option<&str>,
    limit: Option<u64>,
) -> Result<Page<discovery_run::Model>> {
    let page = PageRequest::parse(cursor, limit)?;
    Ok(runs::list(db, &page).await?)
}

pub async fn get_run(db: &DatabaseConnection, run_id: i32) -> Result<discovery_run::Model> {
    runs::get(db, run_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("run {}", run_id)))
}

pub async fn run_logs(
    db: &DatabaseConnection,
    run_id: i32,
    cursor: Option<&str>,
    limit: Option<u64>,
) -> Result<Page<discovery_run_log::Model>> {
    let page = PageRequest::parse(cursor, limit)?;
    get_run(db, run_id).await?;
    Ok(runs::logs(db, run_id, &page).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use netatlas_entity::discovery_run::RunStatus;

    #[tokio::test]
    async fn status_is_idle_without_runs() {
        let db = test_connection().await;
        let report = status(&db).await.unwrap();
        assert_eq!(report.status, "idle");
        assert!(report.run.is_none());
        assert_eq!(report.totals, MetricsSnapshot::default());
    }

    #[tokio::test]
    async fn status_totals_come_from_stored_runs() {
        let db = test_connection().await;
        let t0 = Utc::now();
        let seconds = chrono::Duration::seconds;
        let request = StartRun {
            scope: Some("10.0.1.0/24".to_string()),
            ..Default::default()
        };
        for (outcome, took) in [(RunStatus::Succeeded, 4), (RunStatus::Failed, 1)] {
            start_run(&db, &DiscoveryConfig::default(), &request, t0).await.unwrap();
            let run = runs::claim_next(&db, t0).await.unwrap().unwrap();
            runs::finalize(&db, run.run_id, outcome, serde_json::json!({}), None, t0 + seconds(took))
                .await
                .unwrap();
        }
        // Still queued; not counted.
        start_run(&db, &DiscoveryConfig::default(), &request, t0).await.unwrap();

        let report = status(&db).await.unwrap();
        assert_eq!(report.status, "queued");
        assert_eq!(
            report.totals,
            MetricsSnapshot {
                runs_succeeded: 1,
                runs_failed: 1,
                last_duration_ms: 4000,
                total_duration_ms: 5000,
            }
        );
    }

    #[tokio::test]
    async fn start_run_canonicalizes_scope_and_keeps_tags() {
        let db = test_connection().await;
        let request = StartRun {
            scope: Some("10.0.1.77/24".to_string()),
            preset: Some("quick".to_string()),
            tags: vec![" lab ".to_string(), "lab".to_string(), "".to_string()],
        };
        let run = start_run(&db, &DiscoveryConfig::default(), &request, Utc::now())
            .await
            .unwrap();
        assert_eq!(run.scope, "10.0.1.0/24");
        assert_eq!(run.preset, "quick");
        assert_eq!(run.tags, serde_json::json!(["lab"]));
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(status(&db).await.unwrap().status, "queued");
    }

    #[tokio::test]
    async fn configured_default_scope_is_used() {
        let db = test_connection().await;
        let config = DiscoveryConfig {
            default_scope: Some("192.168.7.0/24".to_string()),
            ..Default::default()
        };
        let run = start_run(&db, &config, &StartRun::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(run.scope, "192.168.7.0/24");
        assert_eq!(run.preset, "standard");
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_queueing() {
        let db = test_connection().await;
        let config = DiscoveryConfig::default();
        let bad_scope = StartRun {
            scope: Some("10.0.0.0/33".to_string()),
            ..Default::default()
        };
        assert_eq!(
            start_run(&db, &config, &bad_scope, Utc::now())
                .await
                .unwrap_err()
                .code(),
            "invalid_scope"
        );
        let bad_preset = StartRun {
            scope: Some("10.0.0.1".to_string()),
            preset: Some("exhaustive".to_string()),
            ..Default::default()
        };
        assert_eq!(
            start_run(&db, &config, &bad_preset, Utc::now())
                .await
                .unwrap_err()
                .code(),
            "invalid_preset"
        );
        assert_eq!(status(&db).await.unwrap().status, "idle");
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let db = test_connection().await;
        assert_eq!(get_run(&db, 5).await.unwrap_err().status(), 404);
        assert_eq!(run_logs(&db, 5, None, None).await.unwrap_err().status(), 404);
    }
}
