//! `api` crate — the HTTP surface over the dispatcher, ledger, and ops
//! audit trails. Every route is nested under `/api/v1` and returns the
//! shared envelope (`envelope::ApiEnvelope`) on success or
//! `{"error": {"code", "message"}}` on failure.

pub mod envelope;
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::routing::{get, post, put};
use axum::Router;
use db::DbPool;
use engine::Dispatcher;
use queue::events::EventBus;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub dispatcher: Dispatcher,
    pub events: EventBus,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let v1 = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/ready", get(handlers::health::ready))
        .route("/health/live", get(handlers::health::live))
        .route("/capabilities", get(handlers::health::capabilities))
        .route("/database/health", get(handlers::database::health))
        .route("/database/init", post(handlers::database::init))
        .route("/database/tables", get(handlers::database::tables))
        .route("/database/purge", post(handlers::database::purge))
        .route("/workflows", get(handlers::workflows::list))
        .route("/workflows/:name", get(handlers::workflows::get))
        .route("/runs", post(handlers::runs::submit).get(handlers::runs::list))
        .route("/runs/:id", get(handlers::runs::get))
        .route("/runs/:id/cancel", post(handlers::runs::cancel))
        .route("/runs/:id/events", get(handlers::runs::events))
        .route("/runs/:id/steps", get(handlers::runs::steps))
        .route("/runs/:id/logs", get(handlers::runs::logs))
        .route("/schedules", get(handlers::schedules::list).post(handlers::schedules::create))
        .route(
            "/schedules/:id",
            get(handlers::schedules::get).put(handlers::schedules::update).delete(handlers::schedules::delete),
        )
        .route("/dlq", get(handlers::dlq::list))
        .route("/dlq/:id/retry", post(handlers::dlq::retry))
        .route("/anomalies", get(handlers::quality::list_anomalies))
        .route("/quality", get(handlers::quality::list_quality))
        .route("/alerts", get(handlers::alerts::list))
        .route("/alerts/:id/ack", post(handlers::alerts::acknowledge))
        .route(
            "/alerts/channels",
            get(handlers::alerts::list_channels).post(handlers::alerts::create_channel),
        )
        .route(
            "/alerts/channels/:id",
            put(handlers::alerts::update_channel).delete(handlers::alerts::delete_channel),
        )
        .route("/events/stream", get(handlers::events::stream));

    Router::new()
        .nest("/api/v1", v1)
        .layer(axum::middleware::from_fn(middleware::track_request))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> Result<(), std::io::Error> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "api listening");
    axum::serve(listener, app).await
}
