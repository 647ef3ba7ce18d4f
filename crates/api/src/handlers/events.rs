//! `GET /events/stream` — server-sent events over the execution event bus.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use queue::events::{Event, EventBus, FnHandler};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    run_id: Option<Uuid>,
    /// Comma-separated glob patterns (`"run.*"`, `"*"`, exact literal).
    /// Defaults to everything.
    types: Option<String>,
}

/// Drops the bus subscription once the SSE response stream is dropped
/// (client disconnect, or the connection otherwise tearing down).
struct Subscription {
    bus: EventBus,
    sub_id: Uuid,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let bus = self.bus.clone();
        let sub_id = self.sub_id;
        tokio::spawn(async move {
            bus.unsubscribe(sub_id).await;
        });
    }
}

fn type_matches(patterns: &[String], event_type: &str) -> bool {
    patterns.iter().any(|pattern| {
        if pattern == "*" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix(".*") {
            return event_type == prefix || event_type.starts_with(&format!("{prefix}."));
        }
        pattern == event_type
    })
}

pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let patterns: Vec<String> = query
        .types
        .as_deref()
        .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
        .unwrap_or_else(|| vec!["*".to_string()]);

    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let run_id = query.run_id;

    let sub_id = state
        .events
        .subscribe(
            "*",
            std::sync::Arc::new(FnHandler(move |event: Event| {
                let tx = tx.clone();
                let run_id = run_id;
                let patterns = patterns.clone();
                async move {
                    if let Some(run_id) = run_id {
                        if event.execution_id != Some(run_id) {
                            return;
                        }
                    }
                    if !type_matches(&patterns, &event.event_type) {
                        return;
                    }
                    let _ = tx.send(event);
                }
            })),
        )
        .await;

    let subscription = Subscription { bus: state.events.clone(), sub_id };

    let connected = stream::once(async { SseEvent::default().data(json!({ "event_type": "connected" }).to_string()) });

    let forwarded = UnboundedReceiverStream::new(rx).map(|event| {
        SseEvent::default().data(serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string()))
    });

    let body = connected.chain(forwarded).map(Ok).map(move |item| {
        // keep `subscription` alive for the lifetime of the stream
        let _ = &subscription;
        item
    });

    Sse::new(body).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)).text("heartbeat"))
}
