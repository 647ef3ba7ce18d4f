//! Execution ledger repository — the append-only record of every run and
//! its event timeline.
//!
//! This is the persistence half of the execution ledger; `engine::ledger`
//! wraps these functions with event-bus publication and domain types.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::{ExecutionEventRow, ExecutionRow}, DbError};

/// Fields needed to create a new execution row. `idempotency_key`, when
/// present, must be unique among non-terminal executions — callers should
/// check `get_by_idempotency_key` first.
pub struct NewExecution {
    pub workflow: String,
    pub params: Value,
    pub lane: String,
    pub trigger_source: String,
    pub parent_execution_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
}

/// Inserts the execution row and its `CREATED` event in a single
/// transaction, so the ledger's event timeline never has a gap for the
/// first transition.
pub async fn create_execution(pool: &PgPool, new: NewExecution) -> Result<ExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ExecutionRow>(
        r#"
        INSERT INTO core_executions
            (id, workflow, params, status, lane, trigger_source, parent_execution_id, idempotency_key)
        VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7)
        RETURNING id, workflow, params, status, lane, trigger_source, parent_execution_id,
                  created_at, started_at, completed_at, result, error, retry_count, idempotency_key
        "#,
    )
    .bind(id)
    .bind(&new.workflow)
    .bind(&new.params)
    .bind(&new.lane)
    .bind(&new.trigger_source)
    .bind(new.parent_execution_id)
    .bind(&new.idempotency_key)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"INSERT INTO core_execution_events (id, execution_id, event_type, data)
           VALUES ($1, $2, 'CREATED', $3)"#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(serde_json::json!({ "workflow": new.workflow, "params": new.params }))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

pub async fn get_execution(pool: &PgPool, id: Uuid) -> Result<ExecutionRow, DbError> {
    sqlx::query_as::<_, ExecutionRow>(
        r#"SELECT id, workflow, params, status, lane, trigger_source, parent_execution_id,
                  created_at, started_at, completed_at, result, error, retry_count, idempotency_key
           FROM core_executions WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Look up a live execution by its idempotency key, used by the dispatcher
/// to deduplicate resubmissions of the same logical request.
///
/// Excludes executions in a terminal-failed status (`failed`,
/// `dead_lettered`): per spec.md §4.D, a key attached to a run that ended
/// in failure is free to be reused by a fresh submission rather than
/// permanently shadowing it. `cancelled`/`succeeded` runs still dedupe,
/// matching "not in a terminal failed state, return it".
pub async fn get_by_idempotency_key(
    pool: &PgPool,
    key: &str,
) -> Result<Option<ExecutionRow>, DbError> {
    let row = sqlx::query_as::<_, ExecutionRow>(
        r#"SELECT id, workflow, params, status, lane, trigger_source, parent_execution_id,
                  created_at, started_at, completed_at, result, error, retry_count, idempotency_key
           FROM core_executions
           WHERE idempotency_key = $1 AND status NOT IN ('failed', 'dead_lettered')"#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Transition an execution's status and record the matching event in the
/// same transaction, stamping `started_at`/`completed_at` as appropriate.
/// Every status change writes exactly one event (spec.md §4.B).
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: &str,
    result: Option<Value>,
    error: Option<String>,
    event_type: &str,
    event_data: Value,
) -> Result<(), DbError> {
    let now = Utc::now();
    let starting = status == "running";
    let completing = matches!(status, "succeeded" | "failed" | "cancelled" | "dead_lettered");

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE core_executions
        SET status = $1,
            result = COALESCE($2, result),
            error = COALESCE($3, error),
            started_at = CASE WHEN $4 THEN $5 ELSE started_at END,
            completed_at = CASE WHEN $6 THEN $5 ELSE completed_at END
        WHERE id = $7
        "#,
    )
    .bind(status)
    .bind(result)
    .bind(error)
    .bind(starting)
    .bind(now)
    .bind(completing)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"INSERT INTO core_execution_events (id, execution_id, event_type, data)
           VALUES ($1, $2, $3, $4)"#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(event_type)
    .bind(event_data)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Atomically bump `retry_count`, record the matching `RETRIED` event, and
/// return the new count.
pub async fn increment_retry(pool: &PgPool, id: Uuid) -> Result<i32, DbError> {
    let mut tx = pool.begin().await?;

    let (retry_count,): (i32,) = sqlx::query_as(
        r#"UPDATE core_executions SET retry_count = retry_count + 1 WHERE id = $1
           RETURNING retry_count"#,
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"INSERT INTO core_execution_events (id, execution_id, event_type, data)
           VALUES ($1, $2, 'RETRIED', $3)"#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(serde_json::json!({ "retry_count": retry_count }))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(retry_count)
}

pub async fn record_event(
    pool: &PgPool,
    execution_id: Uuid,
    event_type: &str,
    data: Value,
) -> Result<ExecutionEventRow, DbError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, ExecutionEventRow>(
        r#"
        INSERT INTO core_execution_events (id, execution_id, event_type, data)
        VALUES ($1, $2, $3, $4)
        RETURNING id, execution_id, event_type, timestamp, data
        "#,
    )
    .bind(id)
    .bind(execution_id)
    .bind(event_type)
    .bind(data)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_events(
    pool: &PgPool,
    execution_id: Uuid,
) -> Result<Vec<ExecutionEventRow>, DbError> {
    let rows = sqlx::query_as::<_, ExecutionEventRow>(
        r#"SELECT id, execution_id, event_type, timestamp, data
           FROM core_execution_events WHERE execution_id = $1 ORDER BY timestamp ASC"#,
    )
    .bind(execution_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Filters accepted by [`list_executions`]. All fields are optional;
/// `None` means "no filter on this column".
#[derive(Debug, Default)]
pub struct ListExecutionsFilter {
    pub workflow: Option<String>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

/// Row count matching the same filters as [`list_executions`], used to
/// populate the `page.total` field in a paginated API response.
pub async fn count_executions(pool: &PgPool, filter: &ListExecutionsFilter) -> Result<i64, DbError> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM core_executions
        WHERE ($1::text IS NULL OR workflow = $1)
          AND ($2::text IS NULL OR status = $2)
          AND ($3::timestamptz IS NULL OR created_at >= $3)
        "#,
    )
    .bind(&filter.workflow)
    .bind(&filter.status)
    .bind(filter.since)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn list_executions(
    pool: &PgPool,
    filter: ListExecutionsFilter,
) -> Result<Vec<ExecutionRow>, DbError> {
    let rows = sqlx::query_as::<_, ExecutionRow>(
        r#"
        SELECT id, workflow, params, status, lane, trigger_source, parent_execution_id,
               created_at, started_at, completed_at, result, error, retry_count, idempotency_key
        FROM core_executions
        WHERE ($1::text IS NULL OR workflow = $1)
          AND ($2::text IS NULL OR status = $2)
          AND ($3::timestamptz IS NULL OR created_at >= $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(filter.workflow)
    .bind(filter.status)
    .bind(filter.since)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
