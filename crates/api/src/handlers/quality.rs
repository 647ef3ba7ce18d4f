//! `GET /quality`, `GET /anomalies`.

use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;

use crate::envelope::{ok_paged, Page, RequestStart};
use crate::error::ApiError;
use crate::handlers::DomainListQuery;
use crate::AppState;

pub async fn list_quality(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Query(query): Query<DomainListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let domain = query.domain.as_deref();
    let rows = ops::quality::list_quality_results(&state.pool, domain, query.limit, query.offset).await?;
    let total = ops::quality::count_quality_results(&state.pool, domain).await?;
    Ok(ok_paged(start, rows, Page::new(total, query.limit, query.offset)))
}

pub async fn list_anomalies(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Query(query): Query<DomainListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let domain = query.domain.as_deref();
    let rows = ops::anomalies::list(&state.pool, domain, query.limit, query.offset).await?;
    let total = ops::anomalies::count(&state.pool, domain).await?;
    Ok(ok_paged(start, rows, Page::new(total, query.limit, query.offset)))
}
