//! The workflow subsystem: definitions, execution context, step-graph
//! scheduling, callable registries, and the engine that drives a run.

pub mod context;
pub mod definition;
pub mod engine;
pub mod graph;
pub mod registry;
pub mod runnable;

pub use context::{StepQuality, StepResult, WorkflowContext};
pub use definition::{ExecutionPolicy, OnFailure, PipelineKind, Step, StepType, Workflow};
pub use engine::{WorkflowEngine, WorkflowRunOutcome, WorkflowRunStatus};
pub use graph::StepState;
pub use registry::{ConditionFn, ItemsProvider, LambdaHandler, WorkflowRegistry};
pub use runnable::Runnable;
