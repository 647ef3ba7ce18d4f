//! `MockHandler` — a test double for `Handler`.
//!
//! Useful in unit and integration tests where a real handler
//! implementation is either unavailable or irrelevant.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use crate::{traits::ExecutionContext, Handler, NodeError};

/// Behaviour injected into `MockHandler` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
}

/// A mock handler that records every call it receives and returns a
/// programmer-specified result.
pub struct MockHandler {
    /// Label used in test assertions.
    pub name: String,
    /// What the handler will do when `call` is invoked.
    pub behaviour: MockBehaviour,
    /// All params seen by this handler (in call order).
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl MockHandler {
    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::ReturnValue(value),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::FailFatal(msg.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::FailRetryable(msg.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this handler has been called.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Handler for MockHandler {
    async fn call(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        self.calls.lock().unwrap().push(ctx.params.clone());

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => {
                let mut out = json!({ "handler": self.name });
                if let (Some(out_obj), Some(v_obj)) = (out.as_object_mut(), v.as_object()) {
                    for (k, val) in v_obj {
                        out_obj.insert(k.clone(), val.clone());
                    }
                }
                Ok(out)
            }
            MockBehaviour::FailRetryable(msg) => Err(NodeError::Retryable(msg.clone())),
            MockBehaviour::FailFatal(msg) => Err(NodeError::Fatal(msg.clone())),
        }
    }
}

/// A handler that fails a fixed number of times before succeeding,
/// matching the "retryable failure" scenario: fails with `Retryable` on
/// the first `fail_times` calls, then returns `success`.
pub struct FlakyHandler {
    pub fail_times: usize,
    pub success: Value,
    calls: Mutex<usize>,
}

impl FlakyHandler {
    pub fn new(fail_times: usize, success: Value) -> Self {
        Self {
            fail_times,
            success,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Handler for FlakyHandler {
    async fn call(&self, _ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls <= self.fail_times {
            Err(NodeError::Retryable(format!("flaky failure #{calls}")))
        } else {
            Ok(self.success.clone())
        }
    }
}
