//! Quality/rejects/anomalies repository. All three tables are append-only
//! audit trails — there is no update or delete path, only insert and list.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::{AnomalyRow, QualityResultRow, RejectRow}, DbError};

// ---------------------------------------------------------------------------
// quality results
// ---------------------------------------------------------------------------

pub struct NewQualityResult {
    pub domain: String,
    pub execution_id: Option<Uuid>,
    pub check_name: String,
    pub category: String,
    pub status: String,
    pub message: Option<String>,
    pub actual_value: Option<serde_json::Value>,
    pub expected_value: Option<serde_json::Value>,
}

pub async fn record_quality_result(
    pool: &PgPool,
    new: NewQualityResult,
) -> Result<QualityResultRow, DbError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, QualityResultRow>(
        r#"
        INSERT INTO core_quality_results
            (id, domain, execution_id, check_name, category, status, message, actual_value, expected_value)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, domain, execution_id, check_name, category, status, message,
                  actual_value, expected_value, created_at
        "#,
    )
    .bind(id)
    .bind(new.domain)
    .bind(new.execution_id)
    .bind(new.check_name)
    .bind(new.category)
    .bind(new.status)
    .bind(new.message)
    .bind(new.actual_value)
    .bind(new.expected_value)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn count_quality_results(pool: &PgPool, domain: Option<&str>) -> Result<i64, DbError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM core_quality_results WHERE ($1::text IS NULL OR domain = $1)",
    )
    .bind(domain)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn list_quality_results(
    pool: &PgPool,
    domain: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<QualityResultRow>, DbError> {
    let rows = sqlx::query_as::<_, QualityResultRow>(
        r#"SELECT id, domain, execution_id, check_name, category, status, message,
                  actual_value, expected_value, created_at
           FROM core_quality_results
           WHERE ($1::text IS NULL OR domain = $1)
           ORDER BY created_at DESC LIMIT $2 OFFSET $3"#,
    )
    .bind(domain)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// rejects
// ---------------------------------------------------------------------------

pub struct NewReject {
    pub domain: String,
    pub execution_id: Option<Uuid>,
    pub source: String,
    pub reason: String,
    pub payload: serde_json::Value,
}

pub async fn record_reject(pool: &PgPool, new: NewReject) -> Result<RejectRow, DbError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, RejectRow>(
        r#"
        INSERT INTO core_rejects (id, domain, execution_id, source, reason, payload)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, domain, execution_id, source, reason, payload, created_at
        "#,
    )
    .bind(id)
    .bind(new.domain)
    .bind(new.execution_id)
    .bind(new.source)
    .bind(new.reason)
    .bind(new.payload)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn count_rejects(pool: &PgPool, domain: Option<&str>) -> Result<i64, DbError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM core_rejects WHERE ($1::text IS NULL OR domain = $1)",
    )
    .bind(domain)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn list_rejects(
    pool: &PgPool,
    domain: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<RejectRow>, DbError> {
    let rows = sqlx::query_as::<_, RejectRow>(
        r#"SELECT id, domain, execution_id, source, reason, payload, created_at
           FROM core_rejects
           WHERE ($1::text IS NULL OR domain = $1)
           ORDER BY created_at DESC LIMIT $2 OFFSET $3"#,
    )
    .bind(domain)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// anomalies
// ---------------------------------------------------------------------------

pub struct NewAnomaly {
    pub domain: String,
    pub execution_id: Option<Uuid>,
    pub metric: String,
    pub observed: f64,
    pub expected: Option<f64>,
    pub deviation: Option<f64>,
    pub severity: String,
    pub details: serde_json::Value,
}

pub async fn record_anomaly(pool: &PgPool, new: NewAnomaly) -> Result<AnomalyRow, DbError> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, AnomalyRow>(
        r#"
        INSERT INTO core_anomalies
            (id, domain, execution_id, metric, observed, expected, deviation, severity, details)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, domain, execution_id, metric, observed, expected, deviation, severity, details, created_at
        "#,
    )
    .bind(id)
    .bind(new.domain)
    .bind(new.execution_id)
    .bind(new.metric)
    .bind(new.observed)
    .bind(new.expected)
    .bind(new.deviation)
    .bind(new.severity)
    .bind(new.details)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn count_anomalies(pool: &PgPool, domain: Option<&str>) -> Result<i64, DbError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM core_anomalies WHERE ($1::text IS NULL OR domain = $1)",
    )
    .bind(domain)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn list_anomalies(
    pool: &PgPool,
    domain: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<AnomalyRow>, DbError> {
    let rows = sqlx::query_as::<_, AnomalyRow>(
        r#"SELECT id, domain, execution_id, metric, observed, expected, deviation, severity, details, created_at
           FROM core_anomalies
           WHERE ($1::text IS NULL OR domain = $1)
           ORDER BY created_at DESC LIMIT $2 OFFSET $3"#,
    )
    .bind(domain)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
