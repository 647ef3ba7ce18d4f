//! Container-runtime error taxonomy, distinct from `SpineError` because
//! it carries provider-specific detail an adapter surfaces back to the
//! router.

use std::fmt;

/// `AUTH/QUOTA/NOT_FOUND/RUNTIME_UNAVAILABLE/IMAGE_PULL/OOM/TIMEOUT/
/// USER_CODE/VALIDATION/UNKNOWN` with a default-retryable policy: quota,
/// runtime-unavailable, image-pull and unknown are retryable; the rest
/// are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobErrorCategory {
    Auth,
    Quota,
    NotFound,
    RuntimeUnavailable,
    ImagePull,
    Oom,
    Timeout,
    UserCode,
    Validation,
    Unknown,
}

impl JobErrorCategory {
    pub fn default_retryable(&self) -> bool {
        matches!(self, Self::Quota | Self::RuntimeUnavailable | Self::ImagePull | Self::Unknown)
    }
}

impl fmt::Display for JobErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auth => "AUTH",
            Self::Quota => "QUOTA",
            Self::NotFound => "NOT_FOUND",
            Self::RuntimeUnavailable => "RUNTIME_UNAVAILABLE",
            Self::ImagePull => "IMAGE_PULL",
            Self::Oom => "OOM",
            Self::Timeout => "TIMEOUT",
            Self::UserCode => "USER_CODE",
            Self::Validation => "VALIDATION",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// An error raised by a runtime adapter or the router/validator in front
/// of it. `retryable` defaults from the category but an adapter may
/// override it for a specific failure (e.g. a QUOTA error the provider
/// flags as permanent for this account).
#[derive(Debug, Clone)]
pub struct JobError {
    pub category: JobErrorCategory,
    pub message: String,
    pub retryable: bool,
    pub provider_code: Option<String>,
    pub exit_code: Option<i32>,
    pub runtime: Option<String>,
}

impl JobError {
    pub fn new(category: JobErrorCategory, message: impl Into<String>) -> Self {
        let retryable = category.default_retryable();
        Self { category, message: message.into(), retryable, provider_code: None, exit_code: None, runtime: None }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(JobErrorCategory::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(JobErrorCategory::NotFound, message)
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

impl std::error::Error for JobError {}

impl From<JobError> for crate::error::SpineError {
    fn from(e: JobError) -> Self {
        match e.category {
            JobErrorCategory::Auth => crate::error::SpineError::Auth(e.message),
            JobErrorCategory::NotFound => crate::error::SpineError::NotFound(e.message),
            JobErrorCategory::Validation => crate::error::SpineError::Validation(e.message),
            JobErrorCategory::Timeout => crate::error::SpineError::Timeout(e.message),
            JobErrorCategory::Quota | JobErrorCategory::RuntimeUnavailable => {
                crate::error::SpineError::Unavailable(e.message)
            }
            JobErrorCategory::ImagePull | JobErrorCategory::Oom | JobErrorCategory::UserCode | JobErrorCategory::Unknown => {
                crate::error::SpineError::Internal(e.message)
            }
        }
    }
}
