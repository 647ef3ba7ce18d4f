//! Registries for the callable surfaces a workflow step references by
//! name: LAMBDA handlers, CHOICE conditions, and MAP item providers.
//!
//! Grounded on `nodes::HandlerRegistry`'s `(kind, name) -> handler` map,
//! generalized to the three distinct function shapes the workflow engine
//! needs instead of the single `Handler::call` signature task/operation
//! dispatch uses.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::workflow::context::{StepResult, WorkflowContext};

/// A LAMBDA step body: runs in-process against the current context and a
/// step-local config blob.
#[async_trait]
pub trait LambdaHandler: Send + Sync {
    async fn call(&self, ctx: &WorkflowContext, config: &Value) -> StepResult;
}

/// A CHOICE step's predicate.
pub trait ConditionFn: Send + Sync {
    fn evaluate(&self, ctx: &WorkflowContext, config: &Value) -> bool;
}

/// A MAP step's finite item source.
pub trait ItemsProvider: Send + Sync {
    fn items(&self, ctx: &WorkflowContext, config: &Value) -> Vec<Value>;
}

/// Process-wide map of the three registries, constructed once at startup
/// and shared (via `Arc`) by the workflow engine and dispatcher.
#[derive(Default, Clone)]
pub struct WorkflowRegistry {
    lambdas: HashMap<String, Arc<dyn LambdaHandler>>,
    conditions: HashMap<String, Arc<dyn ConditionFn>>,
    items: HashMap<String, Arc<dyn ItemsProvider>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_lambda(&mut self, name: impl Into<String>, handler: Arc<dyn LambdaHandler>) {
        self.lambdas.insert(name.into(), handler);
    }

    pub fn register_condition(&mut self, name: impl Into<String>, condition: Arc<dyn ConditionFn>) {
        self.conditions.insert(name.into(), condition);
    }

    pub fn register_items_provider(&mut self, name: impl Into<String>, provider: Arc<dyn ItemsProvider>) {
        self.items.insert(name.into(), provider);
    }

    pub fn lambda(&self, name: &str) -> Option<Arc<dyn LambdaHandler>> {
        self.lambdas.get(name).cloned()
    }

    pub fn condition(&self, name: &str) -> Option<Arc<dyn ConditionFn>> {
        self.conditions.get(name).cloned()
    }

    pub fn items_provider(&self, name: &str) -> Option<Arc<dyn ItemsProvider>> {
        self.items.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    struct AlwaysTrue;
    impl ConditionFn for AlwaysTrue {
        fn evaluate(&self, _ctx: &WorkflowContext, _config: &Value) -> bool {
            true
        }
    }

    #[test]
    fn registry_resolves_registered_condition() {
        let mut registry = WorkflowRegistry::new();
        registry.register_condition("always_true", Arc::new(AlwaysTrue));
        let ctx = WorkflowContext::new(Uuid::new_v4(), json!({}));
        let condition = registry.condition("always_true").unwrap();
        assert!(condition.evaluate(&ctx, &Value::Null));
        assert!(registry.condition("missing").is_none());
    }
}
