//! Executor abstraction.
//!
//! Every executor implementation satisfies the same capability set
//! (`submit`/`get_status`/`get_result`/`get_error`/`wait`/`cancel`/
//! `active_count`) over an opaque `ref` (a `Uuid`). Generalizes the
//! teacher's single inline `WorkflowExecutor::run` loop into pluggable
//! backends the dispatcher composes with.

mod async_local;
mod local;
mod memory;
mod store;

pub use async_local::AsyncLocalExecutor;
pub use local::LocalExecutor;
pub use memory::MemoryExecutor;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use nodes::HandlerKind;

use crate::error::SpineError;

/// `(kind, name, params, optional runtime hint)` — the unit of work an
/// executor is asked to run.
#[derive(Debug, Clone)]
pub struct WorkSpec {
    pub kind: HandlerKind,
    pub name: String,
    pub params: Value,
    pub runtime_hint: Option<String>,
    pub timeout: Option<Duration>,
}

impl WorkSpec {
    pub fn new(kind: HandlerKind, name: impl Into<String>, params: Value) -> Self {
        Self { kind, name: name.into(), params, runtime_hint: None, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Where a submitted ref currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    NotFound,
}

/// The capability set every executor backend must provide.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Enqueue or start `spec`, returning an opaque ref.
    async fn submit(&self, spec: WorkSpec) -> Result<Uuid, SpineError>;

    async fn get_status(&self, work_ref: Uuid) -> RefStatus;

    async fn get_result(&self, work_ref: Uuid) -> Option<Value>;

    async fn get_error(&self, work_ref: Uuid) -> Option<SpineError>;

    /// Block until `work_ref` reaches a terminal status or `timeout`
    /// elapses, returning the terminal status observed.
    async fn wait(&self, work_ref: Uuid, timeout: Option<Duration>) -> RefStatus;

    /// Request cancellation of `work_ref`. Best-effort: a handler already
    /// mid-execution may not observe the signal promptly.
    async fn cancel(&self, work_ref: Uuid) -> bool;

    /// Number of refs not yet in a terminal status.
    async fn active_count(&self) -> usize;
}
