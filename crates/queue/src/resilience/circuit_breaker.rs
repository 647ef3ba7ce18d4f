//! Circuit breaker — per-name fail-fast protection.
//!
//! Grounded on the original source's `examples/03_resilience/02_circuit_breaker.py`
//! state machine: CLOSED counts consecutive failures; at `failure_threshold`
//! it trips OPEN; after `recovery_timeout` it allows a probe (HALF_OPEN);
//! `success_threshold` consecutive probe successes close it again, any
//! probe failure reopens it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Running counters exposed for dashboards / `/capabilities`-style
/// introspection.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CircuitStats {
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    pub trips: u64,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_calls_in_flight: u32,
    opened_at: Option<Instant>,
    stats: CircuitStats,
}

/// A single named breaker. Cheap to clone (the mutable state lives behind
/// a `Mutex` so clones share the same counters) — construct one per
/// protected resource via [`CircuitBreakerRegistry`] rather than per call.
pub struct CircuitBreaker {
    pub name: String,
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub half_open_max_calls: u32,
    pub success_threshold: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            recovery_timeout,
            half_open_max_calls: 1,
            success_threshold: 2,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                half_open_calls_in_flight: 0,
                opened_at: None,
                stats: CircuitStats::default(),
            }),
        }
    }

    pub fn with_half_open_max_calls(mut self, n: u32) -> Self {
        self.half_open_max_calls = n;
        self
    }

    pub fn with_success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n;
        self
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap();
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    pub fn stats(&self) -> CircuitStats {
        self.inner.lock().unwrap().stats
    }

    fn maybe_transition_to_half_open(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.half_open_calls_in_flight = 0;
                }
            }
        }
    }

    /// Whether a new call may proceed right now. Callers must pair a
    /// `true` result with exactly one of [`record_success`](Self::record_success)
    /// / [`record_failure`](Self::record_failure).
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        self.maybe_transition_to_half_open(&mut inner);

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                inner.stats.rejected_requests += 1;
                false
            }
            CircuitState::HalfOpen => {
                if inner.half_open_calls_in_flight < self.half_open_max_calls {
                    inner.half_open_calls_in_flight += 1;
                    true
                } else {
                    inner.stats.rejected_requests += 1;
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stats.successful_requests += 1;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stats.failed_requests += 1;
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.stats.trips += 1;
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
                inner.stats.trips += 1;
            }
            CircuitState::Open => {}
        }
    }

    /// Run `f` through the breaker: rejects immediately with
    /// [`QueueError::CircuitOpen`] if not allowed, else runs it and records
    /// success/failure based on `is_err`.
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, QueueError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.allow_request() {
            return Err(QueueError::CircuitOpen(self.name.clone()));
        }
        match f().await {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(_e) => {
                self.record_failure();
                Err(QueueError::CircuitOpen(self.name.clone()))
            }
        }
    }
}

/// Process-wide map of named breakers, created lazily on first lookup.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, std::sync::Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &self,
        name: &str,
        failure_threshold: u32,
        recovery_timeout: Duration,
    ) -> std::sync::Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| std::sync::Arc::new(CircuitBreaker::new(name, failure_threshold, recovery_timeout)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<std::sync::Arc<CircuitBreaker>> {
        self.breakers.lock().unwrap().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn trips_after_consecutive_failures() {
        let cb = CircuitBreaker::new("svc", 3, Duration::from_millis(200));
        for _ in 0..3 {
            assert!(cb.allow_request());
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[tokio::test]
    async fn recovers_through_half_open_after_timeout() {
        let cb = CircuitBreaker::new("svc", 2, Duration::from_millis(50)).with_success_threshold(2);
        cb.allow_request();
        cb.record_failure();
        cb.allow_request();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        sleep(Duration::from_millis(60)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert!(cb.allow_request());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert!(cb.allow_request());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new("svc", 1, Duration::from_millis(30));
        cb.allow_request();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        sleep(Duration::from_millis(40)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allow_request());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn registry_returns_same_instance_for_same_name() {
        let reg = CircuitBreakerRegistry::new();
        let a = reg.get_or_create("x", 3, Duration::from_secs(1));
        let b = reg.get_or_create("x", 99, Duration::from_secs(99));
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }
}
