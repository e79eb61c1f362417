// Discovery run rows and their logs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::Level;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::*;
use serde_json::Value;

use netatlas_entity::discovery_run::{self, RunStatus};
use netatlas_entity::discovery_run_log;

use crate::pagination::{after_cursor, Page, PageRequest};

pub const ABANDONED_ERROR: &str = "abandoned: exceeded runtime budget without completing";

pub async fn queue(
    db: &DatabaseConnection,
    scope: &str,
    preset: &str,
    tags: &[String],
    now: DateTime<Utc>,
) -> Result<discovery_run::Model, DbErr> {
    discovery_run::ActiveModel {
        status: Set(RunStatus::Queued),
        scope: Set(scope.to_string()),
        preset: Set(preset.to_string()),
        tags: Set(Value::from(tags.to_vec())),
        stats: Set(serde_json::json!({})),
        created_at: Set(now),
        started_at: Set(None),
        completed_at: Set(None),
        last_error: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn get(db: &DatabaseConnection, run_id: i32) -> Result<Option<discovery_run::Model>, DbErr> {
    discovery_run::Entity::find_by_id(run_id).one(db).await
}

pub async fn latest(db: &DatabaseConnection) -> Result<Option<discovery_run::Model>, DbErr> {
    discovery_run::Entity::find()
        .order_by_desc(discovery_run::Column::CreatedAt)
        .order_by_desc(discovery_run::Column::RunId)
        .one(db)
        .await
}

/// Succeeded and failed runs, oldest completion first.
pub async fn terminal(db: &DatabaseConnection) -> Result<Vec<discovery_run::Model>, DbErr> {
    discovery_run::Entity::find()
        .filter(discovery_run::Column::Status.is_in([RunStatus::Succeeded, RunStatus::Failed]))
        .order_by_asc(discovery_run::Column::CompletedAt)
        .order_by_asc(discovery_run::Column::RunId)
        .all(db)
        .await
}

/// Move the oldest queued run to `running`.
///
/// The transition is a single conditional UPDATE that only matches while no
/// other run is `running`, so two pollers can never both win.
pub async fn claim_next(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Option<discovery_run::Model>, DbErr> {
    let candidate = discovery_run::Entity::find()
        .filter(discovery_run::Column::Status.eq(RunStatus::Queued))
        .order_by_asc(discovery_run::Column::CreatedAt)
        .order_by_asc(discovery_run::Column::RunId)
        .one(db)
        .await?;
    let candidate = match candidate {
        Some(run) => run,
        None => return Ok(None),
    };

    let active = Query::select()
        .column(discovery_run::Column::RunId)
        .from(discovery_run::Entity)
        .and_where(discovery_run::Column::Status.eq(RunStatus::Running))
        .to_owned();
    let claimed = discovery_run::Entity::update_many()
        .col_expr(discovery_run::Column::Status, Expr::value(RunStatus::Running))
        .col_expr(discovery_run::Column::StartedAt, Expr::value(Some(now)))
        .filter(discovery_run::Column::RunId.eq(candidate.run_id))
        .filter(discovery_run::Column::Status.eq(RunStatus::Queued))
        .filter(Expr::exists(active).not())
        .exec(db)
        .await?
        .rows_affected;
    if claimed != 1 {
        return Ok(None);
    }
    get(db, candidate.run_id).await
}

// Terminal states are immutable: only a running run can be finalized.
pub async fn finalize(
    db: &DatabaseConnection,
    run_id: i32,
    status: RunStatus,
    stats: Value,
    error: Option<String>,
    now: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let result = discovery_run::Entity::update_many()
        .col_expr(discovery_run::Column::Status, Expr::value(status))
        .col_expr(discovery_run::Column::Stats, Expr::value(stats))
        .col_expr(discovery_run::Column::LastError, Expr::value(error))
        .col_expr(discovery_run::Column::CompletedAt, Expr::value(Some(now)))
        .filter(discovery_run::Column::RunId.eq(run_id))
        .filter(discovery_run::Column::Status.eq(RunStatus::Running))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

// Fail runs left `running` by a process that died mid-run.
pub async fn recover_stale(
    db: &DatabaseConnection,
    max_runtime: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<i32>, DbErr> {
    let budget = chrono::Duration::from_std(max_runtime * 2)
        .unwrap_or_else(|_| chrono::Duration::days(1));
    let stale = discovery_run::Entity::find()
        .filter(discovery_run::Column::Status.eq(RunStatus::Running))
        .filter(discovery_run::Column::StartedAt.lt(now - budget))
        .all(db)
        .await?;

    let mut recovered = Vec::new();
    for run in stale {
        if finalize(
            db,
            run.run_id,
            RunStatus::Failed,
            run.stats.clone(),
            Some(ABANDONED_ERROR.to_string()),
            now,
        )
        .await?
        {
            append_log(db, run.run_id, Level::Error, ABANDONED_ERROR, now).await?;
            recovered.push(run.run_id);
        }
    }
    Ok(recovered)
}

/// Append a run log row and mirror it to the process log.
pub async fn append_log(
    db: &DatabaseConnection,
    run_id: i32,
    level: Level,
    message: &str,
    now: DateTime<Utc>,
) -> Result<discovery_run_log::Model, DbErr> {
    log::log!(level, "run {}: {}", run_id, message);
    discovery_run_log::ActiveModel {
        run_id: Set(run_id),
        level: Set(level.as_str().to_lowercase()),
        message: Set(message.to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn list(
    db: &DatabaseConnection,
    page: &PageRequest,
) -> Result<Page<discovery_run::Model>, DbErr> {
    let mut select = discovery_run::Entity::find();
    if let Some(cursor) = &page.cursor {
        select = select.filter(after_cursor(
            discovery_run::Column::CreatedAt,
            discovery_run::Column::RunId,
            cursor,
        ));
    }
    let rows = select
        .order_by_desc(discovery_run::Column::CreatedAt)
        .order_by_desc(discovery_run::Column::RunId)
        .limit(page.fetch_limit())
        .all(db)
        .await?;
    Ok(Page::from_rows(rows, page.limit, |row| (row.created_at, row.run_id)))
}

pub async fn logs(
    db: &DatabaseConnection,
    run_id: i32,
    page: &PageRequest,
) -> Result<Page<discovery_run_log::Model>, DbErr> {
    let mut select =
        discovery_run_log::Entity::find().filter(discovery_run_log::Column::RunId.eq(run_id));
    if let Some(cursor) = &page.cursor {
        select = select.filter(after_cursor(
            discovery_run_log::Column::CreatedAt,
            discovery_run_log::Column::LogId,
            cursor,
        ));
    }
    let rows = select
        .order_by_desc(discovery_run_log::Column::CreatedAt)
        .order_by_desc(discovery_run_log::Column::LogId)
        .limit(page.fetch_limit())
        .all(db)
        .await?;
    Ok(Page::from_rows(rows, page.limit, |row| (row.created_at, row.log_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[tokio::test]
    async fn only_one_run_is_claimed_at_a_time() {
        let db = test_connection().await;
        let now = Utc::now();
        let first = queue(&db, "10.0.1.0/24", "standard", &[], now).await.unwrap();
        let second = queue(&db, "10.0.2.0/24", "standard", &[], now).await.unwrap();

        let claimed = claim_next(&db, now).await.unwrap().unwrap();
        assert_eq!(claimed.run_id, first.run_id);
        assert_eq!(claimed.status, RunStatus::Running);
        assert_eq!(claimed.started_at, Some(now));

        // The second run waits while the first is running.
        assert!(claim_next(&db, now).await.unwrap().is_none());

        assert!(finalize(&db, first.run_id, RunStatus::Succeeded, serde_json::json!({}), None, now)
            .await
            .unwrap());
        let claimed = claim_next(&db, now).await.unwrap().unwrap();
        assert_eq!(claimed.run_id, second.run_id);
    }

    #[tokio::test]
    async fn terminal_state_is_immutable() {
        let db = test_connection().await;
        let now = Utc::now();
        let run = queue(&db, "10.0.1.1", "quick", &[], now).await.unwrap();
        claim_next(&db, now).await.unwrap();
        assert!(finalize(&db, run.run_id, RunStatus::Failed, serde_json::json!({}), Some("boom".into()), now)
            .await
            .unwrap());
        assert!(!finalize(&db, run.run_id, RunStatus::Succeeded, serde_json::json!({}), None, now)
            .await
            .unwrap());
        let run = get(&db, run.run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn stale_running_run_is_failed() {
        let db = test_connection().await;
        let started = Utc::now() - chrono::Duration::hours(1);
        let run = queue(&db, "10.0.1.0/24", "standard", &[], started).await.unwrap();
        claim_next(&db, started).await.unwrap();

        let now = Utc::now();
        let recovered = recover_stale(&db, Duration::from_secs(600), now).await.unwrap();
        assert_eq!(recovered, vec![run.run_id]);
        let run = get(&db, run.run_id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.last_error.as_deref(), Some(ABANDONED_ERROR));

        let logs = logs(&db, run.run_id, &PageRequest::parse(None, None).unwrap())
            .await
            .unwrap();
        assert_eq!(logs.items[0].level, "error");
    }

    #[tokio::test]
    async fn run_logs_page_newest_first() {
        let db = test_connection().await;
        let now = Utc::now();
        let run = queue(&db, "10.0.1.0/24", "standard", &[], now).await.unwrap();
        for i in 0..5 {
            append_log(&db, run.run_id, Level::Info, &format!("line {}", i), now)
                .await
                .unwrap();
        }

        let first = logs(&db, run.run_id, &PageRequest::parse(None, Some(3)).unwrap())
            .await
            .unwrap();
        assert_eq!(first.items[0].message, "line 4");
        let cursor = first.next_cursor.clone().unwrap();
        let second = logs(&db, run.run_id, &PageRequest::parse(Some(&cursor), Some(3)).unwrap())
            .await
            .unwrap();
        assert_eq!(
            second.items.iter().map(|l| l.message.as_str()).collect::<Vec<_>>(),
            vec!["line 1", "line 0"]
        );
        assert!(second.next_cursor.is_none());
    }
}
