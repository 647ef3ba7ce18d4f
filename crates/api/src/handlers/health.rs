//! `/health`, `/health/ready`, `/health/live`, `/capabilities`.

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::envelope::{ok, RequestStart};
use crate::AppState;

pub async fn health(Extension(start): Extension<RequestStart>) -> impl IntoResponse {
    ok(start, json!({ "status": "ok" }))
}

/// Returns 503 the moment the database — the one required dependency — is
/// unreachable. There are no optional dependencies in this build, so
/// "degraded" never applies.
pub async fn ready(State(state): State<AppState>, Extension(start): Extension<RequestStart>) -> impl IntoResponse {
    match db::pool::health_check(&state.pool).await {
        Ok(()) => ok(start, json!({ "status": "ready", "database": "ok" })).into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ok(start, json!({ "status": "unavailable", "database": err.to_string() })),
        )
            .into_response(),
    }
}

pub async fn live(Extension(start): Extension<RequestStart>) -> impl IntoResponse {
    ok(start, json!({ "status": "alive" }))
}

pub async fn capabilities(Extension(start): Extension<RequestStart>) -> impl IntoResponse {
    let data = json!({
        "database_backend": std::env::var("SPINE_DATABASE_BACKEND").unwrap_or_else(|_| "postgres".into()),
        "scheduler_backend": std::env::var("SPINE_SCHEDULER_BACKEND").unwrap_or_else(|_| "db_advisory_lock".into()),
        "cache_backend": std::env::var("SPINE_CACHE_BACKEND").unwrap_or_else(|_| "none".into()),
        "worker_backend": std::env::var("SPINE_WORKER_BACKEND").unwrap_or_else(|_| "in_process".into()),
        "metrics_backend": std::env::var("SPINE_METRICS_BACKEND").unwrap_or_else(|_| "none".into()),
        "tracing_backend": std::env::var("SPINE_TRACING_BACKEND").unwrap_or_else(|_| "none".into()),
        "features": {
            "workflows": true,
            "schedules": true,
            "dlq": true,
            "alerts": true,
            "quality": true,
            "sse": true,
            "runtime_adapters": false,
        }
    });
    ok(start, data)
}
