//! `/database/health`, `/database/init`, `/database/tables`, `/database/purge`.

use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::envelope::{ok, RequestStart};
use crate::error::ApiError;
use crate::AppState;

pub async fn health(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
) -> Result<impl IntoResponse, ApiError> {
    db::pool::health_check(&state.pool).await?;
    Ok(ok(start, json!({ "status": "ok" })))
}

pub async fn init(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
) -> Result<impl IntoResponse, ApiError> {
    db::pool::run_migrations(&state.pool).await?;
    Ok(ok(start, json!({ "status": "migrated" })))
}

pub async fn tables(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
) -> Result<impl IntoResponse, ApiError> {
    let tables = db::pool::list_tables(&state.pool).await?;
    Ok(ok(start, json!({ "tables": tables })))
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    older_than_days: i64,
}

pub async fn purge(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Query(query): Query<PurgeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.older_than_days < 0 {
        return Err(engine::SpineError::Validation("older_than_days must be >= 0".into()).into());
    }
    let summary = db::pool::purge_older_than(&state.pool, query.older_than_days).await?;
    Ok(ok(start, summary))
}
