//! `Runnable` — the structural port the workflow engine dispatches PIPELINE
//! steps through, so the engine depends on a trait rather than
//! `engine::dispatcher::Dispatcher` directly. The real dispatcher, test
//! doubles, and external orchestrators all satisfy this.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::SpineError;
use crate::executor::WorkSpec;

#[async_trait]
pub trait Runnable: Send + Sync {
    /// Submit `spec` as a child of `parent_execution_id` and block until
    /// it reaches a terminal state, returning its output or error.
    async fn submit_and_await(&self, spec: WorkSpec, parent_execution_id: Uuid) -> Result<Value, SpineError>;
}
