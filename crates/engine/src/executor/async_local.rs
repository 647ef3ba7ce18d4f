//! `AsyncLocalExecutor` — cooperatively-scheduled handlers bounded by a
//! counting semaphore (`max_concurrency`).
//!
//! Distinct from [`super::local::LocalExecutor`] in intent rather than
//! mechanism on this runtime: `Local` stands in for a thread pool of
//! blocking handlers, `AsyncLocal` for native `async fn` handlers that
//! yield cooperatively. Both ultimately run on `tokio::spawn` here since
//! every registered [`nodes::Handler`] is already `async`; sync and async
//! handlers are never mixed, and that separation is enforced at the
//! handler-registration layer, not the executor's scheduling mechanism.

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

pub struct AsyncLocalExecutor {
    registry: Arc<HandlerRegistry>,
    store: Arc<ResultStore>,
    semaphore: Arc<Semaphore>,
}

impl AsyncLocalExecutor {
    pub fn new(registry: Arc<HandlerRegistry>, max_concurrency: usize) -> Self {
        Self {
            registry,
            store: Arc::new(ResultStore::new(DEFAULT_CAPACITY)),
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl Executor for AsyncLocalExecutor {
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
            let run = async {
                match spec.timeout {
                    Some(d) => match tokio::time::timeout(d, registry.call(spec.kind, &spec.name, &ctx)).await {
                        Ok(r) => r.map_err(SpineError::from),
                        Err(_) => Err(SpineError::Timeout(format!("{} timed out after {d:?}", spec.name))),
                    },
                    None => registry.call(spec.kind, &spec.name, &ctx).await.map_err(SpineError::from),
                }
            };
            match run.await {
                Ok(output) => store.set_completed(work_ref, output),
                Err(e) => store.set_failed(work_ref, &e),
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

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(&self, ctx: &ExecutionContext) -> Result<Value, nodes::NodeError> {
            Ok(ctx.params.clone())
        }
    }

    struct Never;

    #[async_trait]
    impl Handler for Never {
        async fn call(&self, _ctx: &ExecutionContext) -> Result<Value, nodes::NodeError> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn completes_within_concurrency_bound() {
        let mut registry = HandlerRegistry::new();
        registry.register(HandlerKind::Task, "echo", Arc::new(Echo));
        let executor = AsyncLocalExecutor::new(Arc::new(registry), 4);

        let work_ref = executor.submit(WorkSpec::new(HandlerKind::Task, "echo", json!({"a": 1}))).await.unwrap();
        let status = executor.wait(work_ref, Some(Duration::from_secs(1))).await;
        assert_eq!(status, RefStatus::Completed);
    }

    #[tokio::test]
    async fn timeout_fails_with_timeout_category() {
        let mut registry = HandlerRegistry::new();
        registry.register(HandlerKind::Task, "never", Arc::new(Never));
        let executor = AsyncLocalExecutor::new(Arc::new(registry), 1);

        let spec = WorkSpec::new(HandlerKind::Task, "never", Value::Null).with_timeout(Duration::from_millis(20));
        let work_ref = executor.submit(spec).await.unwrap();
        let status = executor.wait(work_ref, Some(Duration::from_secs(1))).await;
        assert_eq!(status, RefStatus::Failed);
        assert!(matches!(executor.get_error(work_ref).await, Some(SpineError::Timeout(_))));
    }
}
