//! In-process event bus — pub/sub fan-out of lifecycle events.
//!
//! Grounded on the original source's `tests/core/test_events.py`: glob
//! subscriptions (`"*"`, `"a.b.*"`, exact literal), FIFO delivery per
//! subscriber, and isolation so one subscriber's failure never blocks
//! delivery to the others. There is no cross-process fan-out here — the
//! default implementation is purely in-memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::QueueError;

/// One fact published on the bus — a lifecycle transition, a scheduler
/// tick, an alert, etc. `event_type` is dot-namespaced (`"run.submitted"`,
/// `"run.dead_lettered"`) so glob subscriptions can filter on a prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub execution_id: Option<Uuid>,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            execution_id: None,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn for_execution(mut self, execution_id: Uuid) -> Self {
        self.execution_id = Some(execution_id);
        self
    }
}

/// Anything that can receive events from the bus. Implementors should not
/// assume panics are caught upstream of their own logic — but a panic
/// inside `handle` only poisons that subscriber's delivery task, never the
/// publisher or other subscribers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event);
}

/// Wraps a plain async closure as an [`EventHandler`], for call sites that
/// don't want to define a named type (tests, small ad-hoc subscribers).
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ()> + Send,
{
    async fn handle(&self, event: Event) {
        (self.0)(event).await;
    }
}

struct Subscription {
    pattern: String,
    sender: mpsc::UnboundedSender<Event>,
}

/// In-process pub/sub bus. `publish` is `async` (a suspension point)
/// but never blocks on subscriber work — it hands each
/// matching subscriber its event over a per-subscriber queue and returns.
#[derive(Clone)]
pub struct EventBus {
    subscriptions: Arc<Mutex<HashMap<Uuid, Subscription>>>,
    closed: Arc<AtomicBool>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register `handler` against `pattern`. Delivery to this subscriber is
    /// strict FIFO with respect to a single publisher: events are queued on
    /// an unbounded channel and drained by a dedicated task, one at a time.
    pub async fn subscribe(&self, pattern: impl Into<String>, handler: Arc<dyn EventHandler>) -> Uuid {
        let pattern = pattern.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let sub_id = Uuid::new_v4();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                // Isolate subscriber panics: a poisoned task here never
                // touches the publisher or other subscribers' tasks.
                let handler = handler.clone();
                let join = tokio::spawn(async move { handler.handle(event).await });
                let _ = join.await;
            }
        });

        self.subscriptions.lock().await.insert(sub_id, Subscription { pattern, sender: tx });
        sub_id
    }

    pub async fn unsubscribe(&self, sub_id: Uuid) {
        self.subscriptions.lock().await.remove(&sub_id);
    }

    /// Publish `event` to every subscriber whose pattern matches
    /// `event.event_type`. Returns `Err(QueueError::BusClosed)` once
    /// [`close`](Self::close) has been called.
    pub async fn publish(&self, event: Event) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::BusClosed);
        }

        let subs = self.subscriptions.lock().await;
        for sub in subs.values() {
            if pattern_matches(&sub.pattern, &event.event_type) {
                // A dropped receiver (unsubscribed) just means the send
                // fails silently — that subscriber is gone.
                let _ = sub.sender.send(event.clone());
            }
        }
        Ok(())
    }

    /// Reject all future publishes. Already-queued events continue
    /// draining to their subscribers.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Glob matching: exact literal, `"*"` matches everything, and
/// `"a.b.*"` matches any event type whose prefix is `"a.b"`, split on the
/// `.` boundary (so `"a.bc"` does NOT match `"a.b.*"`).
fn pattern_matches(pattern: &str, event_type: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(".*") {
        return event_type == prefix || event_type.starts_with(&format!("{prefix}."));
    }
    pattern == event_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{sleep, Duration};

    #[test]
    fn exact_literal_matches_only_itself() {
        assert!(pattern_matches("run.submitted", "run.submitted"));
        assert!(!pattern_matches("run.submitted", "run.completed"));
    }

    #[test]
    fn star_matches_everything() {
        assert!(pattern_matches("*", "anything.at.all"));
    }

    #[test]
    fn prefix_glob_matches_on_dot_boundary() {
        assert!(pattern_matches("run.*", "run.submitted"));
        assert!(pattern_matches("run.*", "run.dead_lettered"));
        assert!(!pattern_matches("run.*", "running"));
        assert!(!pattern_matches("a.b.*", "a.bc"));
        assert!(pattern_matches("a.b.*", "a.b"));
        assert!(pattern_matches("a.b.*", "a.b.c"));
    }

    #[tokio::test]
    async fn subscriber_receives_matching_events_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();

        bus.subscribe("run.*", Arc::new(FnHandler(move |e: Event| {
            let seen = seen2.clone();
            async move {
                seen.lock().await.push(e.event_type);
            }
        }))).await;

        for i in 0..5 {
            bus.publish(Event::new("run.submitted", serde_json::json!({"i": i}))).await.unwrap();
        }
        // allow the drain task to run
        sleep(Duration::from_millis(50)).await;

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|t| t == "run.submitted"));
    }

    #[tokio::test]
    async fn non_matching_pattern_is_not_delivered() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();

        bus.subscribe("schedule.*", Arc::new(FnHandler(move |_e: Event| {
            let count = count2.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }))).await;

        bus.publish(Event::new("run.submitted", serde_json::json!({}))).await.unwrap();
        sleep(Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe("*", Arc::new(FnHandler(move |_e: Event| async move {
            panic!("boom");
        }))).await;

        let count2 = count.clone();
        bus.subscribe("*", Arc::new(FnHandler(move |_e: Event| {
            let count = count2.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }))).await;

        bus.publish(Event::new("x", serde_json::json!({}))).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_bus_rejects_publish() {
        let bus = EventBus::new();
        bus.close().await;
        let err = bus.publish(Event::new("x", serde_json::json!({}))).await.unwrap_err();
        assert!(matches!(err, QueueError::BusClosed));
    }
}
