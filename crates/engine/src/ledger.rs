//! Execution ledger — the domain wrapper around
//! `db::repository::ledger` that also publishes lifecycle events onto the
//! bus: every status transition is both persisted and published.
//! Statuses only ever move forward: PENDING → RUNNING → one of
//! SUCCEEDED/FAILED/CANCELLED/DEAD_LETTERED.

use serde_json::Value;
use uuid::Uuid;

use db::models::{ExecutionRow, ExecutionStatus};
use db::repository::ledger as ledger_repo;
use db::DbPool;
use queue::events::{Event, EventBus};

use crate::error::SpineError;

#[derive(Clone)]
pub struct Ledger {
    pool: DbPool,
    events: EventBus,
}

impl Ledger {
    pub fn new(pool: DbPool, events: EventBus) -> Self {
        Self { pool, events }
    }

    pub async fn create(
        &self,
        workflow: &str,
        params: Value,
        lane: &str,
        trigger_source: &str,
        parent_execution_id: Option<Uuid>,
        idempotency_key: Option<String>,
    ) -> Result<ExecutionRow, SpineError> {
        let row = ledger_repo::create_execution(
            &self.pool,
            ledger_repo::NewExecution {
                workflow: workflow.to_string(),
                params,
                lane: lane.to_string(),
                trigger_source: trigger_source.to_string(),
                parent_execution_id,
                idempotency_key,
            },
        )
        .await?;

        self.publish("run.submitted", &row, None).await;
        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Result<ExecutionRow, SpineError> {
        Ok(ledger_repo::get_execution(&self.pool, id).await?)
    }

    pub async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<ExecutionRow>, SpineError> {
        Ok(ledger_repo::get_by_idempotency_key(&self.pool, key).await?)
    }

    pub async fn list(&self, filter: ledger_repo::ListExecutionsFilter) -> Result<Vec<ExecutionRow>, SpineError> {
        Ok(ledger_repo::list_executions(&self.pool, filter).await?)
    }

    pub async fn events_for(&self, id: Uuid) -> Result<Vec<db::models::ExecutionEventRow>, SpineError> {
        Ok(ledger_repo::get_events(&self.pool, id).await?)
    }

    /// Move `id` to RUNNING. A no-op in terms of validation — the caller
    /// (the dispatcher) only calls this once per submitted execution.
    pub async fn mark_running(&self, id: Uuid) -> Result<(), SpineError> {
        ledger_repo::update_status(&self.pool, id, "running", None, None, "STARTED", Value::Null).await?;
        self.publish_id("run.started", id, None).await;
        Ok(())
    }

    pub async fn mark_succeeded(&self, id: Uuid, result: Value) -> Result<(), SpineError> {
        let event_data = serde_json::json!({ "result": result });
        ledger_repo::update_status(&self.pool, id, "succeeded", Some(result), None, "COMPLETED", event_data.clone()).await?;
        self.publish_id("run.succeeded", id, Some(event_data)).await;
        Ok(())
    }

    pub async fn mark_failed(&self, id: Uuid, error: &SpineError) -> Result<(), SpineError> {
        let event_data = serde_json::json!({ "error": error.to_string(), "category": error.category() });
        ledger_repo::update_status(&self.pool, id, "failed", None, Some(error.to_string()), "FAILED", event_data.clone()).await?;
        self.publish_id("run.failed", id, Some(event_data)).await;
        Ok(())
    }

    pub async fn mark_cancelled(&self, id: Uuid) -> Result<(), SpineError> {
        ledger_repo::update_status(&self.pool, id, "cancelled", None, None, "CANCELLED", Value::Null).await?;
        self.publish_id("run.cancelled", id, None).await;
        Ok(())
    }

    pub async fn mark_dead_lettered(&self, id: Uuid, error: &str) -> Result<(), SpineError> {
        let event_data = serde_json::json!({ "error": error });
        ledger_repo::update_status(&self.pool, id, "dead_lettered", None, Some(error.to_string()), "DEAD_LETTERED", event_data.clone()).await?;
        self.publish_id("run.dead_lettered", id, Some(event_data)).await;
        Ok(())
    }

    pub async fn increment_retry(&self, id: Uuid) -> Result<i32, SpineError> {
        let count = ledger_repo::increment_retry(&self.pool, id).await?;
        self.publish_id("run.retrying", id, Some(serde_json::json!({ "retry_count": count }))).await;
        Ok(count)
    }

    pub async fn record_event(&self, execution_id: Uuid, event_type: &str, data: Value) -> Result<(), SpineError> {
        ledger_repo::record_event(&self.pool, execution_id, event_type, data).await?;
        Ok(())
    }

    async fn publish(&self, event_type: &str, row: &ExecutionRow, data: Option<Value>) {
        let payload = data.unwrap_or_else(|| serde_json::json!({ "workflow": row.workflow }));
        let event = Event::new(event_type, payload).for_execution(row.id);
        let _ = self.events.publish(event).await;
    }

    async fn publish_id(&self, event_type: &str, execution_id: Uuid, data: Option<Value>) {
        let event = Event::new(event_type, data.unwrap_or(Value::Null)).for_execution(execution_id);
        let _ = self.events.publish(event).await;
    }
}

/// Narrow helper the dispatcher uses to decide whether a status string
/// already on the execution row is terminal, without re-parsing it at
/// every call site.
pub fn is_terminal_status(status: &str) -> bool {
    status
        .parse::<ExecutionStatus>()
        .map(|s| s.is_terminal())
        .unwrap_or(false)
}
