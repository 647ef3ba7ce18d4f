//! `LocalExecutor` — a bounded worker pool standing in for a thread pool
//! of synchronous handlers. `submit` offers the work
//! onto the pool and returns immediately; a background task drains the
//! queue under a `max_workers`-wide `Semaphore`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;
use uuid::Uuid;

use nodes::{ExecutionContext, HandlerRegistry};

use crate::error::SpineError;
use crate::executor::store::ResultStore;
use crate::executor::{Executor, RefStatus, WorkSpec};

const DEFAULT_CAPACITY: usize = 10_000;

pub struct LocalExecutor {
    registry: Arc<HandlerRegistry>,
    store: Arc<ResultStore>,
    semaphore: Arc<Semaphore>,
}

impl LocalExecutor {
    pub fn new(registry: Arc<HandlerRegistry>, max_workers: usize) -> Self {
        Self {
            registry,
            store: Arc::new(ResultStore::new(DEFAULT_CAPACITY)),
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn submit(&self, spec: WorkSpec) -> Result<Uuid, SpineError> {
        let work_ref = Uuid::new_v4();
        self.store.insert_pending(work_ref);

        let registry = self.registry.clone();
        let store = self.store.clone();
        let semaphore = self.semaphore.clone();

        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            store.set_running(work_ref);
            let ctx = ExecutionContext::new(work_ref, spec.params.clone());
            match registry.call(spec.kind, &spec.name, &ctx).await {
                Ok(output) => store.set_completed(work_ref, output),
                Err(e) => store.set_failed(work_ref, &SpineError::from(e)),
            }
        });

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

    async fn wait(&self, work_ref: Uuid, timeout: Option<Duration>) -> RefStatus {
        let poll = async {
            loop {
                let status = self.store.status(work_ref);
                if is_terminal(status) || status == RefStatus::NotFound {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        match timeout {
            Some(d) => tokio::time::timeout(d, poll).await.unwrap_or_else(|_| self.store.status(work_ref)),
            None => poll.await,
        }
    }

    async fn cancel(&self, work_ref: Uuid) -> bool {
        self.store.set_cancelled(work_ref)
    }

    async fn active_count(&self) -> usize {
        self.store.active_count()
    }
}

fn is_terminal(status: RefStatus) -> bool {
    matches!(status, RefStatus::Completed | RefStatus::Failed | RefStatus::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::{Handler, HandlerKind};
    use serde_json::json;

    struct Slow;

    #[async_trait]
    impl Handler for Slow {
        async fn call(&self, ctx: &ExecutionContext) -> Result<Value, nodes::NodeError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(ctx.params.clone())
        }
    }

    #[tokio::test]
    async fn submit_returns_immediately_and_completes_async() {
        let mut registry = HandlerRegistry::new();
        registry.register(HandlerKind::Task, "slow", Arc::new(Slow));
        let executor = LocalExecutor::new(Arc::new(registry), 2);

        let work_ref = executor.submit(WorkSpec::new(HandlerKind::Task, "slow", json!({"x": 1}))).await.unwrap();
        let status = executor.wait(work_ref, Some(Duration::from_secs(1))).await;
        assert_eq!(status, RefStatus::Completed);
        assert_eq!(executor.get_result(work_ref).await, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn pool_bounds_concurrency() {
        let mut registry = HandlerRegistry::new();
        registry.register(HandlerKind::Task, "slow", Arc::new(Slow));
        let executor = LocalExecutor::new(Arc::new(registry), 1);

        let r1 = executor.submit(WorkSpec::new(HandlerKind::Task, "slow", Value::Null)).await.unwrap();
        let r2 = executor.submit(WorkSpec::new(HandlerKind::Task, "slow", Value::Null)).await.unwrap();
        // With pool width 1, at least one must still be pending/running shortly after submit.
        let active = executor.active_count().await;
        assert!(active >= 1);
        executor.wait(r1, Some(Duration::from_secs(1))).await;
        executor.wait(r2, Some(Duration::from_secs(1))).await;
    }
}
