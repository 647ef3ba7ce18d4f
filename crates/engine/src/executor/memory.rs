//! `MemoryExecutor` — runs handlers immediately, in-line on the caller's
//! runtime. No additional concurrency; `submit` does not return until the
//! handler has finished.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use nodes::{ExecutionContext, HandlerRegistry};

use crate::error::SpineError;
use crate::executor::store::ResultStore;
use crate::executor::{Executor, RefStatus, WorkSpec};

const DEFAULT_CAPACITY: usize = 10_000;

pub struct MemoryExecutor {
    registry: Arc<HandlerRegistry>,
    store: ResultStore,
}

impl MemoryExecutor {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry, store: ResultStore::new(DEFAULT_CAPACITY) }
    }

    pub fn with_capacity(registry: Arc<HandlerRegistry>, capacity: usize) -> Self {
        Self { registry, store: ResultStore::new(capacity) }
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn submit(&self, spec: WorkSpec) -> Result<Uuid, SpineError> {
        let work_ref = Uuid::new_v4();
        self.store.insert_pending(work_ref);
        self.store.set_running(work_ref);

        let ctx = ExecutionContext::new(work_ref, spec.params.clone());
        match self.registry.call(spec.kind, &spec.name, &ctx).await {
            Ok(output) => self.store.set_completed(work_ref, output),
            Err(e) => self.store.set_failed(work_ref, &SpineError::from(e)),
        }
        Ok(work_ref)
    }

    async fn get_status(&self, work_ref: Uuid) -> RefStatus {
        self.store.status(work_ref)
    }

    async fn get_result(&self, work_ref: Uuid) -> Option<Value> {
        self.store.result(work_ref)
    }

    async fn get_error(&self, work_ref: Uuid) -> Option<SpineError> {
        self.store.error(work_ref)
    }

    async fn wait(&self, work_ref: Uuid, _timeout: Option<Duration>) -> RefStatus {
        // Already terminal by the time submit() returns.
        self.store.status(work_ref)
    }

    async fn cancel(&self, work_ref: Uuid) -> bool {
        self.store.set_cancelled(work_ref)
    }

    async fn active_count(&self) -> usize {
        self.store.active_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::{Handler, HandlerKind};
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(&self, ctx: &ExecutionContext) -> Result<Value, nodes::NodeError> {
            Ok(ctx.params.clone())
        }
    }

    #[tokio::test]
    async fn submit_runs_inline_and_stores_result() {
        let mut registry = HandlerRegistry::new();
        registry.register(HandlerKind::Task, "echo", Arc::new(Echo));
        let executor = MemoryExecutor::new(Arc::new(registry));

        let spec = WorkSpec::new(HandlerKind::Task, "echo", json!({"x": 1}));
        let work_ref = executor.submit(spec).await.unwrap();

        assert_eq!(executor.get_status(work_ref).await, RefStatus::Completed);
        assert_eq!(executor.get_result(work_ref).await, Some(json!({"x": 1})));
        assert_eq!(executor.active_count().await, 0);
    }

    #[tokio::test]
    async fn missing_handler_surfaces_as_failed() {
        let registry = HandlerRegistry::new();
        let executor = MemoryExecutor::new(Arc::new(registry));
        let work_ref = executor.submit(WorkSpec::new(HandlerKind::Task, "ghost", Value::Null)).await.unwrap();
        assert_eq!(executor.get_status(work_ref).await, RefStatus::Failed);
        assert!(executor.get_error(work_ref).await.is_some());
    }
}
