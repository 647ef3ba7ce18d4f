//! `GET /alerts`, `POST /alerts/{id}/ack`, `GET/POST/PUT/DELETE /alerts/channels`.

use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use db::repository::alerts::{AlertChannelUpdate, NewAlertChannel};

use crate::envelope::{ok, ok_paged, Page, RequestStart};
use crate::error::ApiError;
use crate::handlers::StatusListQuery;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Query(query): Query<StatusListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query.status.as_deref();
    let rows = ops::alerts::list(&state.pool, status, query.limit, query.offset).await?;
    let total = ops::alerts::count(&state.pool, status).await?;
    Ok(ok_paged(start, rows, Page::new(total, query.limit, query.offset)))
}

#[derive(Debug, Deserialize)]
pub struct AckBody {
    #[serde(default = "default_acknowledged_by")]
    acknowledged_by: String,
}

fn default_acknowledged_by() -> String {
    "api".to_string()
}

pub async fn acknowledge(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<AckBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row = ops::alerts::acknowledge(&state.pool, id, &body.acknowledged_by).await?;
    Ok(ok(start, row))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = ops::alerts::list_channels(&state.pool).await?;
    Ok(ok(start, rows))
}

#[derive(Debug, Deserialize)]
pub struct CreateChannelBody {
    name: String,
    channel_type: String,
    #[serde(default)]
    config: Value,
    #[serde(default = "default_min_severity")]
    min_severity: String,
    #[serde(default = "default_throttle_minutes")]
    throttle_minutes: i32,
    description: Option<String>,
}

fn default_min_severity() -> String {
    "warning".to_string()
}

fn default_throttle_minutes() -> i32 {
    15
}

pub async fn create_channel(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    axum::Json(body): axum::Json<CreateChannelBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row = ops::alerts::create_channel(
        &state.pool,
        NewAlertChannel {
            name: body.name,
            channel_type: body.channel_type,
            config: body.config,
            min_severity: body.min_severity,
            throttle_minutes: body.throttle_minutes,
            description: body.description,
        },
    )
    .await?;
    Ok((axum::http::StatusCode::CREATED, ok(start, row)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateChannelBody {
    enabled: Option<bool>,
    min_severity: Option<String>,
    throttle_minutes: Option<i32>,
    config: Option<Value>,
}

pub async fn update_channel(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<UpdateChannelBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row = db::repository::alerts::update_alert_channel(
        &state.pool,
        id,
        AlertChannelUpdate {
            enabled: body.enabled,
            min_severity: body.min_severity,
            throttle_minutes: body.throttle_minutes,
            config: body.config,
        },
    )
    .await?;
    Ok(ok(start, row))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    ops::alerts::delete_channel(&state.pool, id).await?;
    Ok(ok(start, serde_json::json!({ "id": id, "deleted": true })))
}
