//! Reject audit trail — rows kept for bad input records encountered
//! during processing. Append-only: there is no update or delete path,
//! only `record` and the read-only listings.

use serde_json::Value;
use uuid::Uuid;

use db::models::RejectRow;
use db::repository::quality::{self as quality_repo, NewReject};
use db::DbPool;
use engine::SpineError;

pub async fn record(
    pool: &DbPool,
    domain: &str,
    execution_id: Option<Uuid>,
    source: &str,
    reason: &str,
    payload: Value,
) -> Result<RejectRow, SpineError> {
    Ok(quality_repo::record_reject(
        pool,
        NewReject {
            domain: domain.to_string(),
            execution_id,
            source: source.to_string(),
            reason: reason.to_string(),
            payload,
        },
    )
    .await?)
}

pub async fn list(pool: &DbPool, domain: Option<&str>, limit: i64, offset: i64) -> Result<Vec<RejectRow>, SpineError> {
    Ok(quality_repo::list_rejects(pool, domain, limit, offset).await?)
}

pub async fn count(pool: &DbPool, domain: Option<&str>) -> Result<i64, SpineError> {
    Ok(quality_repo::count_rejects(pool, domain).await?)
}
