//! Stage-progression manifest repository, for resumable multi-stage
//! partition processing: each `(domain, partition_key, stage)` triple is
//! recorded at most once and upserted as work advances.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::ManifestRow, DbError};

/// Record that `partition_key` has advanced to `stage`, upserting the row
/// for `(domain, partition_key, stage)`.
#[allow(clippy::too_many_arguments)]
pub async fn advance_to(
    pool: &PgPool,
    domain: &str,
    partition_key: &str,
    stage: &str,
    stage_rank: i32,
    row_count: i64,
    metrics: Value,
    execution_id: Uuid,
    batch_id: Option<&str>,
) -> Result<ManifestRow, DbError> {
    let row = sqlx::query_as::<_, ManifestRow>(
        r#"
        INSERT INTO core_manifest
            (domain, partition_key, stage, stage_rank, row_count, metrics_json, execution_id, batch_id, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
        ON CONFLICT (domain, partition_key, stage)
        DO UPDATE SET
            row_count = EXCLUDED.row_count,
            metrics_json = EXCLUDED.metrics_json,
            execution_id = EXCLUDED.execution_id,
            batch_id = EXCLUDED.batch_id,
            updated_at = now()
        RETURNING domain, partition_key, stage, stage_rank, row_count, metrics_json,
                  execution_id, batch_id, updated_at
        "#,
    )
    .bind(domain)
    .bind(partition_key)
    .bind(stage)
    .bind(stage_rank)
    .bind(row_count)
    .bind(metrics)
    .bind(execution_id)
    .bind(batch_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Return every stage recorded for a partition, ordered by stage rank.
pub async fn get(
    pool: &PgPool,
    domain: &str,
    partition_key: &str,
) -> Result<Vec<ManifestRow>, DbError> {
    let rows = sqlx::query_as::<_, ManifestRow>(
        r#"
        SELECT domain, partition_key, stage, stage_rank, row_count, metrics_json,
               execution_id, batch_id, updated_at
        FROM core_manifest
        WHERE domain = $1 AND partition_key = $2
        ORDER BY stage_rank ASC
        "#,
    )
    .bind(domain)
    .bind(partition_key)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Return every partition currently sitting at `stage` for `domain`, most
/// recently updated first.
pub async fn list_at_stage(
    pool: &PgPool,
    domain: &str,
    stage: &str,
    limit: i64,
) -> Result<Vec<ManifestRow>, DbError> {
    let rows = sqlx::query_as::<_, ManifestRow>(
        r#"
        SELECT domain, partition_key, stage, stage_rank, row_count, metrics_json,
               execution_id, batch_id, updated_at
        FROM core_manifest
        WHERE domain = $1 AND stage = $2
        ORDER BY updated_at DESC
        LIMIT $3
        "#,
    )
    .bind(domain)
    .bind(stage)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
