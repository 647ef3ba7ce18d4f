//! The dispatcher — the single entry point the HTTP API, CLI, and
//! scheduler all submit work through.
//!
//! Sits above a direct executor call as a layer that: deduplicates on
//! idempotency key, persists + publishes
//! every lifecycle transition through the [`Ledger`], runs submissions
//! through a per-target circuit breaker and retry policy, and routes
//! exhausted retries to the dead letter queue. It also implements
//! [`Runnable`] so the workflow engine can dispatch PIPELINE steps back
//! through the very same path a top-level submission takes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};
use uuid::Uuid;

use db::models::ExecutionRow;
use db::repository::dlq as dlq_repo;
use db::repository::workflows as workflow_repo;
use db::DbPool;
use nodes::HandlerKind;
use queue::events::EventBus;
use queue::resilience::{CircuitBreakerRegistry, ErrorCategory, RetryPolicy};

use crate::cancel::CancelToken;
use crate::error::SpineError;
use crate::executor::{Executor, RefStatus, WorkSpec};
use crate::ledger::{self, Ledger};
use crate::workflow::{Runnable, Workflow, WorkflowEngine, WorkflowRegistry, WorkflowRunStatus};

#[derive(Clone)]
pub struct Dispatcher {
    pool: DbPool,
    ledger: Ledger,
    executor: Arc<dyn Executor>,
    circuit_breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryPolicy,
    cancel_tokens: Arc<Mutex<HashMap<Uuid, CancelToken>>>,
    work_refs: Arc<Mutex<HashMap<Uuid, Uuid>>>,
    /// Set once via [`attach_workflow_engine`](Self::attach_workflow_engine).
    /// The dispatcher and the workflow engine are mutually referential (the
    /// engine dispatches PIPELINE steps back through the dispatcher as a
    /// [`Runnable`]), so neither can be fully constructed before the other
    /// exists — this cell breaks the cycle.
    workflow_engine: Arc<OnceCell<WorkflowEngine>>,
}

pub struct SubmitRequest {
    pub kind: HandlerKind,
    pub name: String,
    pub params: Value,
    pub lane: String,
    pub trigger_source: String,
    pub idempotency_key: Option<String>,
    pub timeout: Option<Duration>,
    /// If true, block until the execution reaches a terminal status before
    /// returning. If false (the default submission mode), the execution
    /// runs in a spawned task and the caller polls the ledger.
    pub sync: bool,
}

impl SubmitRequest {
    pub fn new(kind: HandlerKind, name: impl Into<String>, params: Value) -> Self {
        Self {
            kind,
            name: name.into(),
            params,
            lane: "default".to_string(),
            trigger_source: "api".to_string(),
            idempotency_key: None,
            timeout: None,
            sync: false,
        }
    }
}

pub struct SubmitWorkflowRequest {
    pub workflow_name: String,
    pub params: Value,
    pub lane: String,
    pub trigger_source: String,
    pub idempotency_key: Option<String>,
    pub correlation_id: Option<String>,
    pub sync: bool,
}

impl SubmitWorkflowRequest {
    pub fn new(workflow_name: impl Into<String>, params: Value) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            params,
            lane: "default".to_string(),
            trigger_source: "api".to_string(),
            idempotency_key: None,
            correlation_id: None,
            sync: false,
        }
    }
}

impl Dispatcher {
    pub fn new(
        pool: DbPool,
        events: EventBus,
        executor: Arc<dyn Executor>,
        circuit_breakers: Arc<CircuitBreakerRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ledger: Ledger::new(pool.clone(), events),
            pool,
            executor,
            circuit_breakers,
            retry,
            cancel_tokens: Arc::new(Mutex::new(HashMap::new())),
            work_refs: Arc::new(Mutex::new(HashMap::new())),
            workflow_engine: Arc::new(OnceCell::new()),
        }
    }

    /// Wires a [`WorkflowEngine`] that dispatches its PIPELINE steps back
    /// through this dispatcher. Call once at startup, before any call to
    /// [`submit_workflow`](Self::submit_workflow).
    pub fn attach_workflow_engine(&self, registry: Arc<WorkflowRegistry>) -> Result<(), SpineError> {
        let engine = WorkflowEngine::new(self.pool.clone(), registry, Arc::new(self.clone()));
        self.workflow_engine
            .set(engine)
            .map_err(|_| SpineError::Internal("workflow engine already attached".into()))
    }

    fn workflow_engine(&self) -> Result<&WorkflowEngine, SpineError> {
        self.workflow_engine
            .get()
            .ok_or_else(|| SpineError::Internal("workflow engine not attached".into()))
    }

    pub async fn get(&self, id: Uuid) -> Result<ExecutionRow, SpineError> {
        self.ledger.get(id).await
    }

    pub async fn list(&self, filter: db::repository::ledger::ListExecutionsFilter) -> Result<Vec<ExecutionRow>, SpineError> {
        self.ledger.list(filter).await
    }

    pub async fn events(&self, id: Uuid) -> Result<Vec<db::models::ExecutionEventRow>, SpineError> {
        self.ledger.events_for(id).await
    }

    /// Best-effort cancellation: signals the run's [`CancelToken`] and asks
    /// the executor to cancel its in-flight ref. A handler already mid-call
    /// may not observe this promptly, matching `Executor::cancel`'s own
    /// contract.
    pub async fn cancel(&self, execution_id: Uuid) -> Result<(), SpineError> {
        let row = self.ledger.get(execution_id).await?;
        if ledger::is_terminal_status(&row.status) {
            return Err(SpineError::Conflict(format!(
                "execution {execution_id} already in terminal status '{}'",
                row.status
            )));
        }

        if let Some(token) = self.cancel_tokens.lock().await.get(&execution_id) {
            token.cancel();
        }
        if let Some(work_ref) = self.work_refs.lock().await.get(&execution_id).copied() {
            self.executor.cancel(work_ref).await;
        }
        Ok(())
    }

    /// Replays a dead-lettered execution: checks `can_retry`, stamps the
    /// dead letter's `retry_count`/`last_retry_at`, and submits a fresh
    /// `Execution` with `trigger_source = "retry"`. The dead letter row
    /// itself is left unresolved — only an operator calling
    /// `dlq_repo::resolve` (once the replay is confirmed good) clears it.
    ///
    /// `core_dead_letters` (spec.md §3) records `workflow`/`params` but not
    /// the original `WorkSpec.kind`, so the replay is always submitted as
    /// `HandlerKind::Task` — the kind every DLQ-eligible submission in this
    /// build (`Dispatcher::submit`) is dispatched under.
    pub async fn retry_dead_letter(&self, dead_letter_id: Uuid) -> Result<ExecutionRow, SpineError> {
        let dead_letter = dlq_repo::get_dead_letter(&self.pool, dead_letter_id).await?;
        if !dlq_repo::can_retry(&dead_letter) {
            return Err(SpineError::Conflict(format!(
                "dead letter {dead_letter_id} is not eligible for retry (resolved or retries exhausted)"
            )));
        }

        dlq_repo::mark_retry_attempted(&self.pool, dead_letter_id).await?;

        let mut req = SubmitRequest::new(HandlerKind::Task, dead_letter.workflow.clone(), dead_letter.params.clone());
        req.trigger_source = "retry".to_string();
        self.submit(req).await
    }

    pub async fn submit(&self, req: SubmitRequest) -> Result<ExecutionRow, SpineError> {
        if let Some(key) = &req.idempotency_key {
            if let Some(existing) = self.ledger.get_by_idempotency_key(key).await? {
                return Ok(existing);
            }
        }

        let row = self
            .ledger
            .create(&req.name, req.params.clone(), &req.lane, &req.trigger_source, None, req.idempotency_key.clone())
            .await?;

        let mut spec = WorkSpec::new(req.kind, req.name.clone(), req.params.clone());
        if let Some(timeout) = req.timeout {
            spec = spec.with_timeout(timeout);
        }

        let cancel = CancelToken::new();
        self.cancel_tokens.lock().await.insert(row.id, cancel.clone());

        if req.sync {
            self.run_to_completion(row.id, spec, cancel).await;
            self.ledger.get(row.id).await
        } else {
            let dispatcher = self.clone();
            let execution_id = row.id;
            tokio::spawn(async move {
                dispatcher.run_to_completion(execution_id, spec, cancel).await;
            });
            Ok(row)
        }
    }

    pub async fn submit_workflow(&self, req: SubmitWorkflowRequest) -> Result<ExecutionRow, SpineError> {
        if let Some(key) = &req.idempotency_key {
            if let Some(existing) = self.ledger.get_by_idempotency_key(key).await? {
                return Ok(existing);
            }
        }

        let workflow_row = workflow_repo::get_latest_by_name(&self.pool, &req.workflow_name).await?;
        let workflow: Workflow = serde_json::from_value(workflow_row.definition.clone())
            .map_err(|e| SpineError::Internal(format!("stored workflow '{}' is invalid: {e}", req.workflow_name)))?;

        let row = self
            .ledger
            .create(&req.workflow_name, req.params.clone(), &req.lane, &req.trigger_source, None, req.idempotency_key.clone())
            .await?;

        let cancel = CancelToken::new();
        self.cancel_tokens.lock().await.insert(row.id, cancel.clone());

        let execution_id = row.id;
        let ledger = self.ledger.clone();
        let params = req.params.clone();
        let correlation_id = req.correlation_id.clone();
        let engine = self.workflow_engine()?;

        let run_fut = {
            let workflow = workflow.clone();
            async move {
                ledger.mark_running(execution_id).await.ok();
                match engine.run(&workflow, execution_id, params, correlation_id, cancel).await {
                    Ok(outcome) => {
                        let output = serde_json::to_value(&outcome.context.outputs).unwrap_or(Value::Null);
                        match outcome.status {
                            WorkflowRunStatus::Completed | WorkflowRunStatus::Partial => {
                                ledger.mark_succeeded(execution_id, output).await.ok();
                            }
                            WorkflowRunStatus::Failed => {
                                let message = format!("steps failed: {}", outcome.failed_steps.join(", "));
                                ledger.mark_failed(execution_id, &SpineError::Internal(message)).await.ok();
                            }
                            WorkflowRunStatus::Cancelled => {
                                ledger.mark_cancelled(execution_id).await.ok();
                            }
                        }
                    }
                    Err(err) => {
                        warn!(execution_id = %execution_id, error = %err, "workflow run failed to start");
                        ledger.mark_failed(execution_id, &err).await.ok();
                    }
                }
            }
        };

        if req.sync {
            run_fut.await;
            self.ledger.get(row.id).await
        } else {
            tokio::spawn(run_fut);
            Ok(row)
        }
    }

    /// Drives a single task/operation submission through circuit-breaker
    /// gating and the retry policy to a terminal ledger state, routing to
    /// the dead letter queue once retries are exhausted.
    async fn run_to_completion(&self, execution_id: Uuid, spec: WorkSpec, cancel: CancelToken) {
        self.ledger.mark_running(execution_id).await.ok();

        let breaker_name = format!("{}:{}", spec.kind, spec.name);
        let breaker = self.circuit_breakers.get_or_create(&breaker_name, 5, Duration::from_secs(30));

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            if cancel.is_cancelled() {
                self.ledger.mark_cancelled(execution_id).await.ok();
                return;
            }

            if !breaker.allow_request() {
                let err = SpineError::CircuitOpen(breaker_name.clone());
                self.finalize_failure(execution_id, err, attempt).await;
                return;
            }

            let work_ref = match self.executor.submit(spec.clone()).await {
                Ok(r) => r,
                Err(err) => {
                    breaker.record_failure();
                    self.finalize_failure(execution_id, err, attempt).await;
                    return;
                }
            };
            self.work_refs.lock().await.insert(execution_id, work_ref);

            let status = self.executor.wait(work_ref, spec.timeout).await;
            match status {
                RefStatus::Completed => {
                    breaker.record_success();
                    let result = self.executor.get_result(work_ref).await.unwrap_or(Value::Null);
                    self.ledger.mark_succeeded(execution_id, result).await.ok();
                    return;
                }
                RefStatus::Cancelled => {
                    self.ledger.mark_cancelled(execution_id).await.ok();
                    return;
                }
                RefStatus::Failed => {
                    breaker.record_failure();
                    let err = self
                        .executor
                        .get_error(work_ref)
                        .await
                        .unwrap_or_else(|| SpineError::Internal("handler failed with no recorded error".into()));

                    if err.is_retryable() && attempt < self.retry.max_attempts {
                        self.ledger.increment_retry(execution_id).await.ok();
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                        continue;
                    }
                    self.finalize_failure(execution_id, err, attempt).await;
                    return;
                }
                RefStatus::Pending | RefStatus::Running | RefStatus::NotFound => {
                    let err = SpineError::Timeout(format!("execution {execution_id} did not complete in time"));
                    self.finalize_failure(execution_id, err, attempt).await;
                    return;
                }
            }
        }
    }

    async fn finalize_failure(&self, execution_id: Uuid, err: SpineError, attempt: u32) {
        if attempt >= self.retry.max_attempts {
            if let Ok(row) = self.ledger.get(execution_id).await {
                let _ = dlq_repo::add_to_dlq(
                    &self.pool,
                    execution_id,
                    &row.workflow,
                    row.params.clone(),
                    &err.to_string(),
                    row.retry_count,
                    self.retry.max_attempts as i32,
                )
                .await;
            }
            info!(execution_id = %execution_id, "execution dead-lettered after exhausting retries");
            self.ledger.mark_dead_lettered(execution_id, &err.to_string()).await.ok();
        } else {
            self.ledger.mark_failed(execution_id, &err).await.ok();
        }
    }
}

#[async_trait]
impl Runnable for Dispatcher {
    async fn submit_and_await(&self, spec: WorkSpec, parent_execution_id: Uuid) -> Result<Value, SpineError> {
        let row = self
            .ledger
            .create(&spec.name, spec.params.clone(), "default", "workflow", Some(parent_execution_id), None)
            .await?;

        self.run_to_completion(row.id, spec, CancelToken::new()).await;

        let final_row = self.ledger.get(row.id).await?;
        match final_row.status.as_str() {
            "succeeded" => Ok(final_row.result.unwrap_or(Value::Null)),
            "cancelled" => Err(SpineError::Internal(format!("child execution {} was cancelled", row.id))),
            _ => Err(SpineError::from_category(
                ErrorCategory::Internal,
                final_row
                    .error
                    .unwrap_or_else(|| format!("child execution {} ended in status '{}'", row.id, final_row.status)),
            )),
        }
    }
}
