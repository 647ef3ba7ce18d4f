//! Timeout helper — bounds a future by a deadline, failing with
//! [`ErrorCategory::Timeout`] semantics when the deadline elapses.
//!
//! Spec.md §4.E: "if the runtime supports cooperative cancellation, send a
//! cancel signal; otherwise mark the execution FAILED(TIMEOUT) and let the
//! handler finish detached." Tokio futures are cooperatively cancellable by
//! construction (dropping them stops their progress at the next await
//! point), so `tokio::time::timeout` already gives us the former; we
//! surface that as a plain `Result` rather than a panic or a detached task.

use std::time::Duration;

/// Run `fut`, returning `Err(elapsed)` if it hasn't resolved by `deadline`.
/// On timeout the future is dropped (cancelled at its next await point).
pub async fn run_with_timeout<T, Fut>(fut: Fut, deadline: Duration) -> Result<T, Duration>
where
    Fut: std::future::Future<Output = T>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(v) => Ok(v),
        Err(_) => Err(deadline),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration as D};

    #[tokio::test]
    async fn returns_ok_when_finishing_in_time() {
        let result = run_with_timeout(async { 42 }, D::from_millis(50)).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn returns_err_on_deadline_exceeded() {
        let result = run_with_timeout(
            async {
                sleep(D::from_millis(100)).await;
                42
            },
            D::from_millis(10),
        )
        .await;
        assert!(result.is_err());
    }
}
