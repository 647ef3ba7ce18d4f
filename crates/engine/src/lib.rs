//! `engine` crate — the orchestration core: the workflow engine, the
//! executor abstraction, and the single error hierarchy they share.

pub mod cancel;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod runtime;
pub mod scheduler;
pub mod workflow;

pub use cancel::CancelToken;
pub use dispatcher::{Dispatcher, SubmitRequest, SubmitWorkflowRequest};
pub use error::SpineError;
pub use executor::{AsyncLocalExecutor, Executor, LocalExecutor, MemoryExecutor, RefStatus, WorkSpec};
pub use ledger::Ledger;
pub use runtime::{ContainerJobSpec, JobError, JobErrorCategory, Router, RuntimeAdapter};
pub use scheduler::Scheduler;
pub use workflow::{
    ExecutionPolicy, OnFailure, PipelineKind, Step, StepResult, StepState, StepType, Workflow,
    WorkflowContext, WorkflowEngine, WorkflowRegistry, WorkflowRunOutcome, WorkflowRunStatus,
};
