//! `nodes` crate — the `Handler` trait, the handler registry, and test
//! doubles used by `engine` to run LAMBDA steps and leaf tasks/operations.
//!
//! Every unit of work the dispatcher can name — a task, an operation, or
//! a LAMBDA step's body — implements [`Handler`]. The engine looks
//! handlers up through [`registry::HandlerRegistry`] by `(kind, name)`.

pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;

pub use error::NodeError;
pub use registry::{HandlerKind, HandlerRegistry};
pub use traits::{ExecutionContext, Handler};
