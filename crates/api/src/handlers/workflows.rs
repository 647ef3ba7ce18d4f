//! `GET /workflows`, `GET /workflows/{name}`.

use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;

use db::repository::workflows as workflow_repo;

use crate::envelope::{ok, ok_paged, Page, RequestStart};
use crate::error::ApiError;
use crate::handlers::ListQuery;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = workflow_repo::list_latest_workflows(&state.pool, query.limit, query.offset).await?;
    let total = workflow_repo::count_workflows(&state.pool).await?;
    Ok(ok_paged(start, rows, Page::new(total, query.limit, query.offset)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = workflow_repo::get_latest_by_name(&state.pool, &name).await?;
    Ok(ok(start, row))
}
