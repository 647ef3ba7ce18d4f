//! Anomaly audit trail — detected statistical or business-rule
//! deviations. Append-only, same shape as quality results and rejects.

use serde_json::Value;
use uuid::Uuid;

use db::models::AnomalyRow;
use db::repository::quality::{self as quality_repo, NewAnomaly};
use db::DbPool;
use engine::SpineError;

pub async fn record(
    pool: &DbPool,
    domain: &str,
    execution_id: Option<Uuid>,
    metric: &str,
    observed: f64,
    expected: Option<f64>,
    severity: &str,
    details: Value,
) -> Result<AnomalyRow, SpineError> {
    let deviation = expected.map(|e| observed - e);
    Ok(quality_repo::record_anomaly(
        pool,
        NewAnomaly {
            domain: domain.to_string(),
            execution_id,
            metric: metric.to_string(),
            observed,
            expected,
            deviation,
            severity: severity.to_string(),
            details,
        },
    )
    .await?)
}

pub async fn list(pool: &DbPool, domain: Option<&str>, limit: i64, offset: i64) -> Result<Vec<AnomalyRow>, SpineError> {
    Ok(quality_repo::list_anomalies(pool, domain, limit, offset).await?)
}

pub async fn count(pool: &DbPool, domain: Option<&str>) -> Result<i64, SpineError> {
    Ok(quality_repo::count_anomalies(pool, domain).await?)
}
