//! Typed error type for the queue crate.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum QueueError {
    #[error("circuit '{0}' is open")]
    CircuitOpen(String),

    #[error("rate limit exceeded, retry after {retry_after_secs:.3}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("retries exhausted after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("event bus is closed")]
    BusClosed,

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}
