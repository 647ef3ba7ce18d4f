//! `WorkflowContext` and `StepResult` — the immutable data a workflow run
//! threads between steps.
//!
//! Context is value-typed: a step never mutates it in place. It returns a
//! `StepResult` whose `context_updates` the engine merges into a *new*
//! immutable context for downstream steps.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SpineError;
use queue::resilience::ErrorCategory;

/// The effective parameters and accumulated outputs visible to a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub run_id: Uuid,
    pub correlation_id: Option<String>,
    /// `workflow.defaults` merged with the submitted params, then with
    /// any `context_updates` emitted by upstream steps.
    pub params: Value,
    /// `step_name -> step output`.
    pub outputs: HashMap<String, Value>,
}

impl WorkflowContext {
    pub fn new(run_id: Uuid, params: Value) -> Self {
        Self { run_id, correlation_id: None, params, outputs: HashMap::new() }
    }

    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn output_of(&self, step_name: &str) -> Option<&Value> {
        self.outputs.get(step_name)
    }

    /// Produce a new context with `step_name`'s output recorded and
    /// `context_updates` merged into `params`. Overlapping keys between
    /// concurrently-scheduled steps are a construction error detected
    /// where steps are written, not here — this merge is last-write-wins
    /// by design for the single caller that owns a frontier slot.
    pub fn advance(&self, step_name: &str, output: Option<Value>, context_updates: Option<Value>) -> Self {
        let mut next = self.clone();
        if let Some(output) = output {
            next.outputs.insert(step_name.to_string(), output);
        }
        if let Some(Value::Object(updates)) = context_updates {
            if let Value::Object(ref mut params) = next.params {
                for (k, v) in updates {
                    params.insert(k, v);
                }
            }
        }
        next
    }
}

/// Quality gate attached to a step's result, surfaced for downstream
/// CHOICE conditions or alerting without forcing a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepQuality {
    pub status: String,
    pub message: Option<String>,
}

/// `(success, output, context_updates, error?, error_category?, quality?,
/// events?, next_step?)` — the tagged record every step returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub output: Option<Value>,
    pub context_updates: Option<Value>,
    pub error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub quality: Option<StepQuality>,
    pub events: Vec<String>,
    /// Explicit next-step override, used by CHOICE.
    pub next_step: Option<String>,
    pub skipped: bool,
    pub skip_reason: Option<String>,
}

impl StepResult {
    pub fn ok(output: Option<Value>) -> Self {
        Self {
            success: true,
            output,
            context_updates: None,
            error: None,
            error_category: None,
            quality: None,
            events: Vec::new(),
            next_step: None,
            skipped: false,
            skip_reason: None,
        }
    }

    pub fn with_context_updates(mut self, updates: Value) -> Self {
        self.context_updates = Some(updates);
        self
    }

    pub fn with_next_step(mut self, next_step: impl Into<String>) -> Self {
        self.next_step = Some(next_step.into());
        self
    }

    pub fn fail(error: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            success: false,
            output: None,
            context_updates: None,
            error: Some(error.into()),
            error_category: Some(category),
            quality: None,
            events: Vec::new(),
            next_step: None,
            skipped: false,
            skip_reason: None,
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            output: None,
            context_updates: None,
            error: None,
            error_category: None,
            quality: None,
            events: Vec::new(),
            next_step: None,
            skipped: true,
            skip_reason: Some(reason.into()),
        }
    }

    pub fn into_spine_error(self, step_name: &str) -> Option<SpineError> {
        if self.success {
            return None;
        }
        let category = self.error_category.unwrap_or(ErrorCategory::Internal);
        let message = self.error.unwrap_or_else(|| format!("step '{step_name}' failed"));
        Some(match category {
            ErrorCategory::Validation => SpineError::Validation(message),
            ErrorCategory::NotFound => SpineError::NotFound(message),
            ErrorCategory::Conflict => SpineError::Conflict(message),
            ErrorCategory::Timeout => SpineError::Timeout(message),
            ErrorCategory::RateLimited => SpineError::RateLimited(message),
            ErrorCategory::Unavailable => SpineError::Unavailable(message),
            ErrorCategory::Auth => SpineError::Auth(message),
            ErrorCategory::Source | ErrorCategory::Transient => SpineError::Source(message),
            ErrorCategory::Internal => SpineError::Internal(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn advance_records_output_and_merges_updates() {
        let ctx = WorkflowContext::new(Uuid::new_v4(), json!({"a": 1}));
        let next = ctx.advance("step1", Some(json!({"count": 3})), Some(json!({"b": 2})));
        assert_eq!(next.output_of("step1"), Some(&json!({"count": 3})));
        assert_eq!(next.params, json!({"a": 1, "b": 2}));
        // original untouched
        assert_eq!(ctx.params, json!({"a": 1}));
        assert!(ctx.output_of("step1").is_none());
    }

    #[test]
    fn fail_produces_matching_spine_error_category() {
        let result = StepResult::fail("boom", ErrorCategory::Timeout);
        let err = result.into_spine_error("s").unwrap();
        assert!(matches!(err, SpineError::Timeout(_)));
    }
}
