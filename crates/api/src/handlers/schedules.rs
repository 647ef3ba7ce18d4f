//! `GET/POST /schedules`, `GET/PUT/DELETE /schedules/{id}`.

use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use db::repository::schedules as schedule_repo;

use crate::envelope::{ok, ok_paged, Page, RequestStart};
use crate::error::ApiError;
use crate::handlers::ListQuery;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = schedule_repo::list(&state.pool, query.limit, query.offset).await?;
    let total = schedule_repo::count(&state.pool).await?;
    Ok(ok_paged(start, rows, Page::new(total, query.limit, query.offset)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = schedule_repo::get(&state.pool, id).await?;
    Ok(ok(start, row))
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleBody {
    name: String,
    target_type: String,
    target_name: String,
    schedule_type: String,
    cron_expression: Option<String>,
    interval_seconds: Option<i64>,
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default = "default_grace")]
    misfire_grace_seconds: i64,
    #[serde(default)]
    params: Value,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_grace() -> i64 {
    60
}

pub async fn create(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    axum::Json(body): axum::Json<CreateScheduleBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row = schedule_repo::create(
        &state.pool,
        schedule_repo::NewSchedule {
            name: body.name,
            target_type: body.target_type,
            target_name: body.target_name,
            schedule_type: body.schedule_type,
            cron_expression: body.cron_expression,
            interval_seconds: body.interval_seconds,
            timezone: body.timezone,
            misfire_grace_seconds: body.misfire_grace_seconds,
            params: body.params,
            created_by: None,
        },
    )
    .await?;
    Ok((axum::http::StatusCode::CREATED, ok(start, row)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleBody {
    enabled: Option<bool>,
    cron_expression: Option<String>,
    interval_seconds: Option<i64>,
    params: Option<Value>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<UpdateScheduleBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row = schedule_repo::update(
        &state.pool,
        id,
        schedule_repo::ScheduleUpdate {
            enabled: body.enabled,
            cron_expression: body.cron_expression,
            interval_seconds: body.interval_seconds,
            params: body.params,
        },
    )
    .await?;
    Ok(ok(start, row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    schedule_repo::delete(&state.pool, id).await?;
    Ok(ok(start, serde_json::json!({ "id": id, "deleted": true })))
}
