//! Retry strategy — exponential backoff with optional jitter, gated on a
//! retryable error category. Grounded on the original source's retry
//! examples referenced from `02_circuit_breaker.py` ("combine with
//! RetryStrategy — retry inside the breaker, not outside").

use std::time::Duration;

use rand::Rng;

/// The single error category taxonomy shared across the whole workspace,
/// with the runtime-adapter categories folded in rather than nested under
/// their own variant, since every one of them needs a retryable default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Internal,
    Timeout,
    RateLimited,
    Unavailable,
    Auth,
    Source,
    /// Generic "transient, try again" bucket for handler errors that don't
    /// map onto a more specific category (used throughout the retryable
    /// failure scenario).
    Transient,
}

impl ErrorCategory {
    /// Default retryable policy absent any per-call override:
    /// validation/not-found/conflict/auth are never retried; timeouts,
    /// rate limits, unavailability, transient and external-source
    /// failures are.
    pub fn is_retryable_default(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Timeout
                | ErrorCategory::RateLimited
                | ErrorCategory::Unavailable
                | ErrorCategory::Source
                | ErrorCategory::Transient
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
            Self::Timeout => "TIMEOUT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Auth => "AUTH",
            Self::Source => "SOURCE",
            Self::Transient => "TRANSIENT",
        };
        write!(f, "{s}")
    }
}

/// `(max attempts, initial delay, backoff factor, delay cap)` with optional
/// jitter, fails-with semantics: retries only continue while the operation
/// keeps failing with a retryable category.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, factor: f64) -> Self {
        Self { max_attempts, initial_delay, factor, ..Default::default() }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry attempt `attempt` (1-indexed: the wait before the
    /// *second* call is `delay_for(1)`), capped at `max_delay` and
    /// optionally jittered uniformly in `[0, wait)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.initial_delay.as_secs_f64() * self.factor.powi(attempt as i32 - 1);
        let capped = raw.min(self.max_delay.as_secs_f64()).max(0.0);
        let secs = if self.jitter && capped > 0.0 {
            rand::thread_rng().gen_range(0.0..capped)
        } else {
            capped
        };
        Duration::from_secs_f64(secs)
    }

    /// Run `f`, retrying while it fails with a retryable category, up to
    /// `max_attempts` total calls. `classify` maps the operation's error
    /// into an [`ErrorCategory`]; retry continues only while
    /// `category.is_retryable_default()`. Returns the last error once
    /// attempts are exhausted or a non-retryable category is hit.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut f: F,
        classify: impl Fn(&E) -> ErrorCategory,
    ) -> Result<T, (E, u32)>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    let category = classify(&e);
                    if attempt >= self.max_attempts || !category.is_retryable_default() {
                        return Err((e, attempt - 1));
                    }
                    tokio::time::sleep(self.delay_for(attempt)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10), 2.0)
            .with_max_delay(Duration::from_millis(35));
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(35)); // would be 40, capped
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0);
        let mut calls = 0;
        let result: Result<i32, (String, u32)> = policy
            .run(
                || {
                    calls += 1;
                    let c = calls;
                    async move {
                        if c < 3 {
                            Err("transient".to_string())
                        } else {
                            Ok(42)
                        }
                    }
                },
                |_| ErrorCategory::Transient,
            )
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn non_retryable_category_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), 2.0);
        let mut calls = 0;
        let result: Result<i32, (String, u32)> = policy
            .run(
                || {
                    calls += 1;
                    async move { Err::<i32, _>("bad input".to_string()) }
                },
                |_| ErrorCategory::Validation,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0);
        let mut calls = 0;
        let result: Result<i32, (String, u32)> = policy
            .run(
                || {
                    calls += 1;
                    async move { Err::<i32, _>("always fails".to_string()) }
                },
                |_| ErrorCategory::Transient,
            )
            .await;
        let (_, retry_count) = result.unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(retry_count, 2);
    }
}
