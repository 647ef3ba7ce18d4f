//! Handler registry: `(kind, name) -> Handler`, with a `kind:__all__`
//! catch-all fallback for generic executors that accept any name under a
//! given kind.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{error::NodeError, traits::{ExecutionContext, Handler}};

/// The three kinds of work a `WorkSpec` may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Task,
    Operation,
    Workflow,
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Operation => write!(f, "operation"),
            Self::Workflow => write!(f, "workflow"),
        }
    }
}

const CATCH_ALL: &str = "__all__";

/// A process-wide map from `(kind, name)` to the `Handler` that serves it.
///
/// Lookup order on `resolve(kind, name)`: exact `kind:name` first, then
/// `kind:__all__`; failing both is "no handler registered".
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<(HandlerKind, String), Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: HandlerKind, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert((kind, name.into()), handler);
    }

    /// Register a catch-all handler for `kind`, invoked when no exact
    /// `kind:name` entry exists.
    pub fn register_catch_all(&mut self, kind: HandlerKind, handler: Arc<dyn Handler>) {
        self.register(kind, CATCH_ALL, handler);
    }

    pub fn resolve(&self, kind: HandlerKind, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .get(&(kind, name.to_string()))
            .or_else(|| self.handlers.get(&(kind, CATCH_ALL.to_string())))
            .cloned()
    }

    /// Resolve and invoke a handler, wrapping a non-object return value as
    /// `{"result": value}` so every call site gets a structured output.
    pub async fn call(
        &self,
        kind: HandlerKind,
        name: &str,
        ctx: &ExecutionContext,
    ) -> Result<Value, NodeError> {
        let handler = self
            .resolve(kind, name)
            .ok_or_else(|| NodeError::Fatal(format!("no handler registered for {kind}:{name}")))?;

        let output = handler.call(ctx).await?;
        Ok(wrap_structured(output))
    }
}

fn wrap_structured(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        json!({ "result": value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
            Ok(ctx.params.clone())
        }
    }

    struct ReturnsScalar;

    #[async_trait]
    impl Handler for ReturnsScalar {
        async fn call(&self, _ctx: &ExecutionContext) -> Result<Value, NodeError> {
            Ok(json!(42))
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(uuid::Uuid::new_v4(), json!({"x": 1}))
    }

    #[tokio::test]
    async fn exact_match_wins_over_catch_all() {
        let mut reg = HandlerRegistry::new();
        reg.register(HandlerKind::Task, "echo", Arc::new(Echo));
        reg.register_catch_all(HandlerKind::Task, Arc::new(ReturnsScalar));

        let out = reg.call(HandlerKind::Task, "echo", &ctx()).await.unwrap();
        assert_eq!(out, json!({"x": 1}));
    }

    #[tokio::test]
    async fn catch_all_used_when_no_exact_match() {
        let mut reg = HandlerRegistry::new();
        reg.register_catch_all(HandlerKind::Task, Arc::new(ReturnsScalar));

        let out = reg.call(HandlerKind::Task, "anything", &ctx()).await.unwrap();
        assert_eq!(out, json!({"result": 42}));
    }

    #[tokio::test]
    async fn missing_handler_is_fatal() {
        let reg = HandlerRegistry::new();
        let err = reg.call(HandlerKind::Task, "missing", &ctx()).await.unwrap_err();
        assert!(matches!(err, NodeError::Fatal(_)));
    }

    #[tokio::test]
    async fn scalar_output_is_wrapped() {
        let mut reg = HandlerRegistry::new();
        reg.register(HandlerKind::Operation, "scalar", Arc::new(ReturnsScalar));

        let out = reg.call(HandlerKind::Operation, "scalar", &ctx()).await.unwrap();
        assert_eq!(out, json!({"result": 42}));
    }
}
