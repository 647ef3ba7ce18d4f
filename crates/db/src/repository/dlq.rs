//! Dead letter queue repository.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::DeadLetterRow, DbError};

pub async fn add_to_dlq(
    pool: &PgPool,
    execution_id: Uuid,
    workflow: &str,
    params: Value,
    error: &str,
    retry_count: i32,
    max_retries: i32,
) -> Result<DeadLetterRow, DbError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, DeadLetterRow>(
        r#"
        INSERT INTO core_dead_letters
            (id, execution_id, workflow, params, error, retry_count, max_retries)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, execution_id, workflow, params, error, retry_count, max_retries,
                  created_at, last_retry_at, resolved_at, resolved_by
        "#,
    )
    .bind(id)
    .bind(execution_id)
    .bind(workflow)
    .bind(params)
    .bind(error)
    .bind(retry_count)
    .bind(max_retries)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_dead_letter(pool: &PgPool, id: Uuid) -> Result<DeadLetterRow, DbError> {
    sqlx::query_as::<_, DeadLetterRow>(
        r#"SELECT id, execution_id, workflow, params, error, retry_count, max_retries,
                  created_at, last_retry_at, resolved_at, resolved_by
           FROM core_dead_letters WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

pub async fn list_dead_letters(
    pool: &PgPool,
    include_resolved: bool,
    limit: i64,
    offset: i64,
) -> Result<Vec<DeadLetterRow>, DbError> {
    let rows = sqlx::query_as::<_, DeadLetterRow>(
        r#"
        SELECT id, execution_id, workflow, params, error, retry_count, max_retries,
               created_at, last_retry_at, resolved_at, resolved_by
        FROM core_dead_letters
        WHERE $1 OR resolved_at IS NULL
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(include_resolved)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Mark a dead letter as resolved, e.g. after a manual replay succeeded.
pub async fn resolve(pool: &PgPool, id: Uuid, resolved_by: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE core_dead_letters SET resolved_at = $1, resolved_by = $2 WHERE id = $3",
    )
    .bind(Utc::now())
    .bind(resolved_by)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// `can_retry ⇔ resolved_at IS NULL ∧ retry_count < max_retries` (spec.md
/// §3 DeadLetter). Read straight from the row rather than re-querying so
/// callers that already hold one (e.g. after `get_dead_letter`) don't pay
/// a second round-trip.
pub fn can_retry(row: &DeadLetterRow) -> bool {
    row.resolved_at.is_none() && row.retry_count < row.max_retries
}

/// Record that a replay attempt was made, bumping `retry_count` and
/// stamping `last_retry_at` without resolving the entry.
pub async fn mark_retry_attempted(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE core_dead_letters SET retry_count = retry_count + 1, last_retry_at = $1 WHERE id = $2",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn count_unresolved(pool: &PgPool) -> Result<i64, DbError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM core_dead_letters WHERE resolved_at IS NULL")
            .fetch_one(pool)
            .await?;
    Ok(count)
}

pub async fn count_all(pool: &PgPool, include_resolved: bool) -> Result<i64, DbError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM core_dead_letters WHERE $1 OR resolved_at IS NULL")
            .bind(include_resolved)
            .fetch_one(pool)
            .await?;
    Ok(count)
}
