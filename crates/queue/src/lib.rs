//! `queue` crate — concurrency, event bus, and resilience primitives.
//!
//! This is the pure, in-process half of the orchestration platform: the
//! event bus fan-out, the advisory-lock client, and the resilience building
//! blocks (retry, circuit breaker, rate limiter, timeout) that `engine`
//! composes into the dispatcher and executors. No HTTP, no CLI, no
//! workflow graph lives here.

pub mod error;
pub mod events;
pub mod locks;
pub mod resilience;

pub use error::QueueError;
pub use events::{Event, EventBus, EventHandler};
pub use locks::AdvisoryLock;
