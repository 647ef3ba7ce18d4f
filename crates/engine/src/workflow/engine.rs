//! `WorkflowEngine` — drives a single workflow run over its step graph:
//! validates the DAG, walks steps in dependency order, and persists each
//! step's result. Supports the richer step-kind model: PIPELINE/LAMBDA/
//! CHOICE/WAIT/MAP bodies, SEQUENTIAL/PARALLEL scheduling, STOP/CONTINUE
//! failure semantics, and per-step persistence enabling idempotent
//! resume.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use db::repository::workflows as workflow_repo;
use db::DbPool;

use crate::cancel::CancelToken;
use crate::error::SpineError;
use crate::executor::WorkSpec;
use crate::workflow::context::{StepResult, WorkflowContext};
use crate::workflow::definition::{ExecutionPolicy, OnFailure, PipelineKind, Step, StepType, Workflow};
use crate::workflow::graph::{frontier, propagate_skips, topological_order, StepState};
use crate::workflow::registry::WorkflowRegistry;
use crate::workflow::runnable::Runnable;
use nodes::HandlerKind;
use queue::resilience::ErrorCategory;

/// The workflow run's terminal disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    Completed,
    Partial,
    Failed,
    Cancelled,
}

#[derive(Debug)]
pub struct WorkflowRunOutcome {
    pub status: WorkflowRunStatus,
    pub context: WorkflowContext,
    pub failed_steps: Vec<String>,
}

pub struct WorkflowEngine {
    pool: DbPool,
    registry: Arc<WorkflowRegistry>,
    runnable: Arc<dyn Runnable>,
}

impl WorkflowEngine {
    pub fn new(pool: DbPool, registry: Arc<WorkflowRegistry>, runnable: Arc<dyn Runnable>) -> Self {
        Self { pool, registry, runnable }
    }

    #[instrument(skip(self, workflow, params, cancel), fields(workflow = %workflow.name, run_id = %run_id))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        params: Value,
        correlation_id: Option<String>,
        cancel: CancelToken,
    ) -> Result<WorkflowRunOutcome, SpineError> {
        let merged_params = merge_objects(&workflow.defaults, &params);
        let mut context = WorkflowContext::new(run_id, merged_params).with_correlation_id(correlation_id);
        let mut states: HashMap<String, StepState> = HashMap::new();
        let mut step_orders: HashMap<String, i32> = HashMap::new();

        self.resume_completed_steps(workflow, run_id, &mut context, &mut states).await?;

        if cancel.is_cancelled() {
            return Ok(self.cancel_remaining(workflow, context, states));
        }

        match &workflow.execution_policy {
            ExecutionPolicy::Sequential => {
                self.run_sequential(workflow, run_id, &mut context, &mut states, &mut step_orders, &cancel)
                    .await?;
            }
            ExecutionPolicy::Parallel { max_concurrency } => {
                self.run_parallel(
                    workflow,
                    run_id,
                    &mut context,
                    &mut states,
                    &mut step_orders,
                    *max_concurrency,
                    &cancel,
                )
                .await?;
            }
        }

        Ok(self.finalize(workflow, context, states))
    }

    async fn resume_completed_steps(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        context: &mut WorkflowContext,
        states: &mut HashMap<String, StepState>,
    ) -> Result<(), SpineError> {
        for step in &workflow.steps {
            if let Some(row) = workflow_repo::get_step_run(&self.pool, run_id, &step.name).await? {
                if row.status == "completed" {
                    states.insert(step.name.clone(), StepState::Completed);
                    *context = context.advance(&step.name, row.result, None);
                } else if row.status == "skipped" {
                    states.insert(step.name.clone(), StepState::Skipped);
                }
            }
        }
        Ok(())
    }

    async fn run_sequential(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        context: &mut WorkflowContext,
        states: &mut HashMap<String, StepState>,
        step_orders: &mut HashMap<String, i32>,
        cancel: &CancelToken,
    ) -> Result<(), SpineError> {
        let order = topological_order(workflow)?;
        for (idx, name) in order.iter().enumerate() {
            step_orders.entry(name.clone()).or_insert(idx as i32);

            if states.contains_key(name) {
                continue;
            }
            let skipped_now = propagate_skips(workflow, states);
            if skipped_now.contains(name) {
                states.insert(name.clone(), StepState::Skipped);
                continue;
            }
            if cancel.is_cancelled() {
                states.insert(name.clone(), StepState::Cancelled);
                continue;
            }

            let step = workflow.step(name).expect("name from topological_order exists");
            let order_idx = step_orders[name];
            let (new_states, failed) =
                self.execute_one(workflow, run_id, step, context, order_idx, cancel).await?;
            states.extend(new_states);

            if failed && workflow.on_failure == OnFailure::Stop {
                self.cancel_pending(workflow, states);
                break;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_parallel(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        context: &mut WorkflowContext,
        states: &mut HashMap<String, StepState>,
        step_orders: &mut HashMap<String, i32>,
        max_concurrency: usize,
        cancel: &CancelToken,
    ) -> Result<(), SpineError> {
        let mut next_order = 0i32;
        loop {
            let skipped_now = propagate_skips(workflow, states);
            for name in &skipped_now {
                states.entry(name.clone()).or_insert(StepState::Skipped);
            }

            if cancel.is_cancelled() {
                self.cancel_pending(workflow, states);
                return Ok(());
            }

            let ready = frontier(workflow, states);
            if ready.is_empty() {
                break;
            }

            let mut stop_requested = false;
            for batch in ready.chunks(max_concurrency.max(1)) {
                for step in batch {
                    step_orders.entry(step.name.clone()).or_insert_with(|| {
                        let v = next_order;
                        next_order += 1;
                        v
                    });
                }
                for step in batch {
                    let order_idx = step_orders[&step.name];
                    let (new_states, failed) =
                        self.execute_one(workflow, run_id, step, context, order_idx, cancel).await?;
                    states.extend(new_states);
                    if failed && workflow.on_failure == OnFailure::Stop {
                        stop_requested = true;
                    }
                }
                if stop_requested {
                    break;
                }
            }

            if stop_requested {
                self.cancel_pending(workflow, states);
                break;
            }
        }
        Ok(())
    }

    /// Runs a single step end to end: persists the RUNNING row, executes
    /// it, persists the terminal row, and returns the state updates
    /// (the step itself plus, for CHOICE, the untaken branch forced to
    /// SKIPPED) along with whether it failed.
    async fn execute_one(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        step: &Step,
        context: &mut WorkflowContext,
        order_idx: i32,
        cancel: &CancelToken,
    ) -> Result<(HashMap<String, StepState>, bool), SpineError> {
        let step_type_label = step_type_label(&step.step_type);
        let row = workflow_repo::create_step_run(
            &self.pool,
            workflow_repo::NewStepRun {
                run_id,
                step_name: step.name.clone(),
                step_type: step_type_label.to_string(),
                step_order: order_idx,
            },
        )
        .await?;
        workflow_repo::mark_step_running(&self.pool, row.step_id).await?;

        let started = std::time::Instant::now();
        let result = self.run_step_body(workflow, run_id, step, context, cancel).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        let mut updates = HashMap::new();
        let failed;

        if result.skipped {
            workflow_repo::complete_step_run(
                &self.pool,
                row.step_id,
                "skipped",
                duration_ms,
                None,
                result.skip_reason.clone(),
                Value::Null,
            )
            .await?;
            updates.insert(step.name.clone(), StepState::Skipped);
            failed = false;
        } else if result.success {
            workflow_repo::complete_step_run(
                &self.pool,
                row.step_id,
                "completed",
                duration_ms,
                result.output.clone(),
                None,
                Value::Null,
            )
            .await?;
            *context = context.advance(&step.name, result.output.clone(), result.context_updates.clone());
            updates.insert(step.name.clone(), StepState::Completed);
            failed = false;

            if let StepType::Choice { then_step, else_step, .. } = &step.step_type {
                let taken = result.next_step.as_deref().unwrap_or(then_step.as_str());
                let untaken = if taken == then_step {
                    else_step.clone()
                } else {
                    Some(then_step.clone())
                };
                if let Some(untaken) = untaken {
                    updates.insert(untaken, StepState::Skipped);
                }
            }
        } else {
            let cancelled_by_signal = cancel.is_cancelled();
            let status = if cancelled_by_signal { "cancelled" } else { "failed" };
            workflow_repo::complete_step_run(
                &self.pool,
                row.step_id,
                status,
                duration_ms,
                None,
                result.error.clone(),
                Value::Null,
            )
            .await?;
            updates.insert(
                step.name.clone(),
                if cancelled_by_signal { StepState::Cancelled } else { StepState::Failed },
            );
            warn!(step = %step.name, error = ?result.error, "step failed");
            failed = true;
        }

        Ok((updates, failed))
    }

    async fn run_step_body(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        step: &Step,
        context: &WorkflowContext,
        cancel: &CancelToken,
    ) -> StepResult {
        match &step.step_type {
            StepType::Pipeline { pipeline_name, kind } => {
                let handler_kind = match kind {
                    PipelineKind::Task => HandlerKind::Task,
                    PipelineKind::Operation => HandlerKind::Operation,
                };
                let params = merge_objects(&context.params, &step.config);
                let spec = WorkSpec::new(handler_kind, pipeline_name.clone(), params);
                match self.runnable.submit_and_await(spec, run_id).await {
                    Ok(output) => StepResult::ok(Some(output)),
                    Err(err) => StepResult::fail(err.to_string(), err.category()),
                }
            }
            StepType::Lambda { handler_name } => match self.registry.lambda(handler_name) {
                Some(handler) => handler.call(context, &step.config).await,
                None => StepResult::fail(
                    format!("no lambda handler registered for '{handler_name}'"),
                    ErrorCategory::Internal,
                ),
            },
            StepType::Choice { condition_name, then_step, else_step } => {
                match self.registry.condition(condition_name) {
                    Some(condition) => {
                        let truthy = condition.evaluate(context, &step.config);
                        let chosen = if truthy {
                            then_step.clone()
                        } else {
                            else_step.clone().unwrap_or_default()
                        };
                        let mut result = StepResult::ok(Some(serde_json::json!({})));
                        if !chosen.is_empty() {
                            result = result.with_next_step(chosen);
                        }
                        result
                    }
                    None => StepResult::fail(
                        format!("no condition registered for '{condition_name}'"),
                        ErrorCategory::Internal,
                    ),
                }
            }
            StepType::Wait { duration_seconds } => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(*duration_seconds)) => StepResult::ok(None),
                    _ = cancel.cancelled() => StepResult::fail("cancelled while waiting", ErrorCategory::Internal),
                }
            }
            StepType::Map { items_name, body_handler_name } => {
                self.run_map(workflow, step, items_name, body_handler_name, context).await
            }
        }
    }

    async fn run_map(
        &self,
        workflow: &Workflow,
        step: &Step,
        items_name: &str,
        body_handler_name: &str,
        context: &WorkflowContext,
    ) -> StepResult {
        let Some(provider) = self.registry.items_provider(items_name) else {
            return StepResult::fail(format!("no items provider registered for '{items_name}'"), ErrorCategory::Internal);
        };
        let Some(handler) = self.registry.lambda(body_handler_name) else {
            return StepResult::fail(format!("no lambda handler registered for '{body_handler_name}'"), ErrorCategory::Internal);
        };

        let items = provider.items(context, &step.config);
        let mut results = Vec::with_capacity(items.len());
        let mut first_error: Option<StepResult> = None;

        for item in items {
            let mut item_params = context.params.clone();
            if let Value::Object(ref mut obj) = item_params {
                obj.insert("item".to_string(), item.clone());
            }
            let item_context = WorkflowContext {
                run_id: context.run_id,
                correlation_id: context.correlation_id.clone(),
                params: item_params,
                outputs: context.outputs.clone(),
            };

            let item_result = handler.call(&item_context, &step.config).await;
            if item_result.success {
                results.push(item_result.output.clone().unwrap_or(Value::Null));
            } else {
                results.push(serde_json::json!({
                    "error": item_result.error.clone(),
                    "category": item_result.error_category,
                }));
                if first_error.is_none() {
                    first_error = Some(item_result.clone());
                }
                if workflow.on_failure == OnFailure::Stop {
                    break;
                }
            }
        }

        if workflow.on_failure == OnFailure::Stop {
            if let Some(err) = first_error {
                return StepResult::fail(
                    err.error.unwrap_or_else(|| "map item failed".to_string()),
                    err.error_category.unwrap_or(ErrorCategory::Internal),
                );
            }
        }

        StepResult::ok(Some(Value::Array(results)))
    }

    fn cancel_pending(&self, workflow: &Workflow, states: &mut HashMap<String, StepState>) {
        for step in &workflow.steps {
            states.entry(step.name.clone()).or_insert(StepState::Cancelled);
        }
    }

    fn cancel_remaining(
        &self,
        workflow: &Workflow,
        context: WorkflowContext,
        mut states: HashMap<String, StepState>,
    ) -> WorkflowRunOutcome {
        self.cancel_pending(workflow, &mut states);
        WorkflowRunOutcome { status: WorkflowRunStatus::Cancelled, context, failed_steps: Vec::new() }
    }

    fn finalize(
        &self,
        workflow: &Workflow,
        context: WorkflowContext,
        states: HashMap<String, StepState>,
    ) -> WorkflowRunOutcome {
        let failed_steps: Vec<String> = states
            .iter()
            .filter(|(_, s)| matches!(s, StepState::Failed))
            .map(|(name, _)| name.clone())
            .collect();
        let cancelled = states.values().any(|s| matches!(s, StepState::Cancelled));

        // Any step cancelled mid-flight takes precedence over steps that
        // completed before the cancel signal arrived — an explicitly
        // cancelled run must never be reported as succeeded.
        let status = if cancelled {
            WorkflowRunStatus::Cancelled
        } else if failed_steps.is_empty() {
            WorkflowRunStatus::Completed
        } else if failed_steps.len() == workflow.steps.len() {
            WorkflowRunStatus::Failed
        } else {
            match workflow.on_failure {
                OnFailure::Stop => WorkflowRunStatus::Failed,
                OnFailure::Continue => WorkflowRunStatus::Partial,
            }
        };

        info!(status = ?status, "workflow run finished");
        WorkflowRunOutcome { status, context, failed_steps }
    }
}

fn step_type_label(step_type: &StepType) -> &'static str {
    match step_type {
        StepType::Pipeline { .. } => "pipeline",
        StepType::Lambda { .. } => "lambda",
        StepType::Choice { .. } => "choice",
        StepType::Wait { .. } => "wait",
        StepType::Map { .. } => "map",
    }
}

/// Shallow-merges `overlay` onto `base`: `overlay` keys win. Non-object
/// inputs fall back to returning `overlay` (or `base` if `overlay` is
/// null), matching "submitted params override workflow defaults".
fn merge_objects(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (k, v) in overlay_map {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        (_, Value::Null) => base.clone(),
        (Value::Null, _) => overlay.clone(),
        _ => overlay.clone(),
    }
}
