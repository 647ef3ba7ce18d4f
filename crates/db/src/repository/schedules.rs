//! Schedule repository, grounded in the cron/interval trigger model: a
//! schedule row records what to fire and when it's next due, and a
//! schedule-run row audits each firing.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::{ScheduleRow, ScheduleRunRow}, DbError};

pub struct NewSchedule {
    pub name: String,
    pub target_type: String,
    pub target_name: String,
    pub schedule_type: String,
    pub cron_expression: Option<String>,
    pub interval_seconds: Option<i64>,
    pub timezone: String,
    pub misfire_grace_seconds: i64,
    pub params: Value,
    pub created_by: Option<String>,
}

pub async fn create(pool: &PgPool, new: NewSchedule) -> Result<ScheduleRow, DbError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, ScheduleRow>(
        r#"
        INSERT INTO core_schedules
            (id, name, target_type, target_name, schedule_type, cron_expression,
             interval_seconds, timezone, misfire_grace_seconds, params, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, name, target_type, target_name, schedule_type, cron_expression,
                  interval_seconds, timezone, enabled, misfire_grace_seconds, next_run_at,
                  last_run_at, last_run_status, last_run_execution_id, params, version,
                  created_by, created_at
        "#,
    )
    .bind(id)
    .bind(new.name)
    .bind(new.target_type)
    .bind(new.target_name)
    .bind(new.schedule_type)
    .bind(new.cron_expression)
    .bind(new.interval_seconds)
    .bind(new.timezone)
    .bind(new.misfire_grace_seconds)
    .bind(new.params)
    .bind(new.created_by)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<ScheduleRow, DbError> {
    sqlx::query_as::<_, ScheduleRow>(
        r#"SELECT id, name, target_type, target_name, schedule_type, cron_expression,
                  interval_seconds, timezone, enabled, misfire_grace_seconds, next_run_at,
                  last_run_at, last_run_status, last_run_execution_id, params, version,
                  created_by, created_at
           FROM core_schedules WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

pub async fn get_by_name(pool: &PgPool, name: &str) -> Result<ScheduleRow, DbError> {
    sqlx::query_as::<_, ScheduleRow>(
        r#"SELECT id, name, target_type, target_name, schedule_type, cron_expression,
                  interval_seconds, timezone, enabled, misfire_grace_seconds, next_run_at,
                  last_run_at, last_run_status, last_run_execution_id, params, version,
                  created_by, created_at
           FROM core_schedules WHERE name = $1"#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

pub async fn count(pool: &PgPool) -> Result<i64, DbError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM core_schedules")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<ScheduleRow>, DbError> {
    let rows = sqlx::query_as::<_, ScheduleRow>(
        r#"SELECT id, name, target_type, target_name, schedule_type, cron_expression,
                  interval_seconds, timezone, enabled, misfire_grace_seconds, next_run_at,
                  last_run_at, last_run_status, last_run_execution_id, params, version,
                  created_by, created_at
           FROM core_schedules ORDER BY name ASC LIMIT $1 OFFSET $2"#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Schedules whose `next_run_at` has passed (or is unset, for schedules
/// that have never fired) and are enabled. Used by the scheduler tick.
pub async fn get_due(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<ScheduleRow>, DbError> {
    let rows = sqlx::query_as::<_, ScheduleRow>(
        r#"SELECT id, name, target_type, target_name, schedule_type, cron_expression,
                  interval_seconds, timezone, enabled, misfire_grace_seconds, next_run_at,
                  last_run_at, last_run_status, last_run_execution_id, params, version,
                  created_by, created_at
           FROM core_schedules
           WHERE enabled AND (next_run_at IS NULL OR next_run_at <= $1)
           ORDER BY next_run_at ASC NULLS FIRST"#,
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub struct ScheduleUpdate {
    pub enabled: Option<bool>,
    pub cron_expression: Option<String>,
    pub interval_seconds: Option<i64>,
    pub params: Option<Value>,
}

pub async fn update(pool: &PgPool, id: Uuid, patch: ScheduleUpdate) -> Result<ScheduleRow, DbError> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        r#"
        UPDATE core_schedules
        SET enabled = COALESCE($1, enabled),
            cron_expression = COALESCE($2, cron_expression),
            interval_seconds = COALESCE($3, interval_seconds),
            params = COALESCE($4, params),
            version = version + 1
        WHERE id = $5
        RETURNING id, name, target_type, target_name, schedule_type, cron_expression,
                  interval_seconds, timezone, enabled, misfire_grace_seconds, next_run_at,
                  last_run_at, last_run_status, last_run_execution_id, params, version,
                  created_by, created_at
        "#,
    )
    .bind(patch.enabled)
    .bind(patch.cron_expression)
    .bind(patch.interval_seconds)
    .bind(patch.params)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM core_schedules WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Record a firing, updating `next_run_at`/`last_run_at`/`last_run_status`
/// on the parent schedule and inserting an audit row.
pub async fn record_run(
    pool: &PgPool,
    schedule_id: Uuid,
    execution_id: Option<Uuid>,
    status: &str,
    reason: Option<&str>,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<ScheduleRunRow, DbError> {
    let mut tx = pool.begin().await?;

    let id = Uuid::new_v4();
    let run = sqlx::query_as::<_, ScheduleRunRow>(
        r#"
        INSERT INTO core_schedule_runs (id, schedule_id, execution_id, status, reason)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, schedule_id, execution_id, fired_at, status, reason
        "#,
    )
    .bind(id)
    .bind(schedule_id)
    .bind(execution_id)
    .bind(status)
    .bind(reason)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE core_schedules
        SET last_run_at = now(), last_run_status = $1, last_run_execution_id = $2, next_run_at = $3
        WHERE id = $4
        "#,
    )
    .bind(status)
    .bind(execution_id)
    .bind(next_run_at)
    .bind(schedule_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(run)
}
