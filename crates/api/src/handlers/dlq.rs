//! `GET /dlq`, `POST /dlq/{id}/retry`.

use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use db::repository::dlq as dlq_repo;

use crate::envelope::{ok, ok_paged, Page, RequestStart};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DlqQuery {
    #[serde(default)]
    include_resolved: bool,
    #[serde(default = "super::default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Query(query): Query<DlqQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = dlq_repo::list_dead_letters(&state.pool, query.include_resolved, query.limit, query.offset).await?;
    let total = dlq_repo::count_all(&state.pool, query.include_resolved).await?;
    Ok(ok_paged(start, rows, Page::new(total, query.limit, query.offset)))
}

/// Resubmits the dead letter's workflow/params as a fresh execution with
/// `trigger_source = "retry"`. 409s via `ApiError` if the dead letter is
/// already resolved or its retry budget is exhausted.
pub async fn retry(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let execution = state.dispatcher.retry_dead_letter(id).await?;
    Ok(ok(start, execution))
}
