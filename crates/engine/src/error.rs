//! The single error hierarchy shared across the orchestration core.
//!
//! Every layer — dispatcher, workflow engine, scheduler, runtime router —
//! returns `Result<_, SpineError>` so HTTP and CLI boundaries can map one
//! `category` to a status code / exit code without per-layer translation
//! tables.

use thiserror::Error;

use queue::resilience::ErrorCategory;

/// `SpineError(message, category, cause?)` — the error taxonomy shared
/// across the dispatcher, executors, and workflow engine.
#[derive(Debug, Error)]
pub enum SpineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Auth(String),

    #[error("external source failure: {0}")]
    Source(String),

    #[error("circuit open: {0}")]
    CircuitOpen(String),

    #[error(transparent)]
    Database(#[from] db::DbError),
}

impl SpineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::Internal(_) => ErrorCategory::Internal,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::RateLimited(_) => ErrorCategory::RateLimited,
            Self::Unavailable(_) => ErrorCategory::Unavailable,
            Self::Auth(_) => ErrorCategory::Auth,
            Self::Source(_) => ErrorCategory::Source,
            // A tripped breaker is modeled as UNAVAILABLE for HTTP/retry
            // purposes even though it carries its own envelope code.
            Self::CircuitOpen(_) => ErrorCategory::Unavailable,
            Self::Database(e) => match e {
                db::DbError::NotFound => ErrorCategory::NotFound,
                db::DbError::Conflict(_) => ErrorCategory::Conflict,
                db::DbError::Invalid(_) => ErrorCategory::Validation,
                db::DbError::Sqlx(_) | db::DbError::Migration(_) => ErrorCategory::Internal,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable_default()
    }

    /// Reconstruct a `SpineError` from a previously-recorded
    /// `(category, message)` pair, used where the concrete variant isn't
    /// preserved across a store round-trip (e.g. the executor result
    /// store).
    pub fn from_category(category: ErrorCategory, message: impl Into<String>) -> Self {
        let message = message.into();
        match category {
            ErrorCategory::Validation => Self::Validation(message),
            ErrorCategory::NotFound => Self::NotFound(message),
            ErrorCategory::Conflict => Self::Conflict(message),
            ErrorCategory::Timeout => Self::Timeout(message),
            ErrorCategory::RateLimited => Self::RateLimited(message),
            ErrorCategory::Unavailable => Self::Unavailable(message),
            ErrorCategory::Auth => Self::Auth(message),
            ErrorCategory::Source | ErrorCategory::Transient => Self::Source(message),
            ErrorCategory::Internal => Self::Internal(message),
        }
    }
}

impl From<nodes::NodeError> for SpineError {
    fn from(e: nodes::NodeError) -> Self {
        match e {
            nodes::NodeError::Retryable(msg) => SpineError::Source(msg),
            nodes::NodeError::Fatal(msg) => SpineError::Internal(msg),
        }
    }
}

impl From<queue::QueueError> for SpineError {
    fn from(e: queue::QueueError) -> Self {
        match e {
            queue::QueueError::CircuitOpen(name) => SpineError::CircuitOpen(name),
            queue::QueueError::RateLimited { retry_after_secs } => {
                SpineError::RateLimited(format!("retry after {retry_after_secs:.1}s"))
            }
            queue::QueueError::Timeout(d) => SpineError::Timeout(format!("timed out after {d:?}")),
            queue::QueueError::RetriesExhausted { attempts, message } => {
                SpineError::Internal(format!("retries exhausted after {attempts} attempts: {message}"))
            }
            queue::QueueError::BusClosed => SpineError::Unavailable("event bus closed".into()),
            queue::QueueError::InvalidPattern(p) => SpineError::Validation(format!("invalid pattern: {p}")),
        }
    }
}
