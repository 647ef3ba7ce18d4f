//! The `Handler` trait — the contract every registered unit of work
//! (task, operation, or LAMBDA step) must fulfil.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::NodeError;

/// Shared context passed to every handler during execution.
///
/// Defined here (in the nodes crate) so both `engine` and individual
/// handler implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the execution this handler is running under.
    pub execution_id: Uuid,
    /// ID of the parent execution, if this run was submitted by a workflow step.
    pub parent_execution_id: Option<Uuid>,
    /// Effective params for this run (workflow defaults merged with submitted params).
    pub params: Value,
    /// Correlation id threaded through for tracing/log grouping.
    pub correlation_id: Option<String>,
}

impl ExecutionContext {
    pub fn new(execution_id: Uuid, params: Value) -> Self {
        Self {
            execution_id,
            parent_execution_id: None,
            params,
            correlation_id: None,
        }
    }
}

/// The core handler trait. All built-in handlers, test doubles, and
/// externally registered callbacks implement this.
///
/// A handler that returns a non-object JSON value is wrapped by the
/// registry as `{"result": value}` before it reaches callers, matching
/// the registry's "structured output" contract.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &ExecutionContext) -> Result<Value, NodeError>;
}
