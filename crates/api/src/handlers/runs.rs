//! `POST /runs`, `GET /runs`, `GET /runs/{id}`, `POST /runs/{id}/cancel`,
//! `GET /runs/{id}/events`, `GET /runs/{id}/steps`, `GET /runs/{id}/logs`.

use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use db::repository::ledger::ListExecutionsFilter;
use db::repository::{ledger as ledger_repo, workflows as workflow_repo};
use engine::{SubmitRequest, SubmitWorkflowRequest};
use nodes::HandlerKind;

use crate::envelope::{ok, ok_paged, Page, RequestStart};
use crate::error::ApiError;
use crate::handlers::StatusListQuery;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SubmitKind {
    Task,
    Operation,
    Workflow,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    kind: SubmitKind,
    name: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    lane: Option<String>,
    #[serde(default)]
    idempotency_key: Option<String>,
    #[serde(default)]
    correlation_id: Option<String>,
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    axum::Json(body): axum::Json<SubmitBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row = match body.kind {
        SubmitKind::Workflow => {
            let mut req = SubmitWorkflowRequest::new(body.name, body.params);
            req.idempotency_key = body.idempotency_key;
            req.correlation_id = body.correlation_id;
            if let Some(lane) = body.lane {
                req.lane = lane;
            }
            state.dispatcher.submit_workflow(req).await?
        }
        kind => {
            let handler_kind = match kind {
                SubmitKind::Task => HandlerKind::Task,
                SubmitKind::Operation => HandlerKind::Operation,
                SubmitKind::Workflow => unreachable!(),
            };
            let mut req = SubmitRequest::new(handler_kind, body.name, body.params);
            req.idempotency_key = body.idempotency_key;
            if let Some(lane) = body.lane {
                req.lane = lane;
            }
            state.dispatcher.submit(req).await?
        }
    };

    Ok((axum::http::StatusCode::ACCEPTED, ok(start, json!({ "run_id": row.id, "status": row.status }))))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Query(query): Query<StatusListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ListExecutionsFilter {
        workflow: None,
        status: query.status.clone(),
        since: None,
        limit: query.limit,
        offset: query.offset,
    };
    let total = ledger_repo::count_executions(&state.pool, &filter).await?;
    let rows = state.dispatcher.list(filter).await?;
    Ok(ok_paged(start, rows, Page::new(total, query.limit, query.offset)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.dispatcher.get(id).await?;
    Ok(ok(start, row))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.dispatcher.cancel(id).await?;
    Ok(ok(start, json!({ "run_id": id, "cancelled": true })))
}

pub async fn events(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.dispatcher.events(id).await?;
    Ok(ok(start, rows))
}

pub async fn steps(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = workflow_repo::list_step_runs(&state.pool, id).await?;
    Ok(ok(start, rows))
}

/// Logs are modeled as the execution's event timeline filtered to
/// `*.log` entries — there is no separate log store.
pub async fn logs(
    State(state): State<AppState>,
    Extension(start): Extension<RequestStart>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = ledger_repo::get_events(&state.pool, id).await?;
    let logs: Vec<_> = rows.into_iter().filter(|e| e.event_type.ends_with(".log")).collect();
    Ok(ok(start, logs))
}
