//! Rate limiters — token bucket, sliding window, keyed, and composite.
//!
//! Grounded on the original source's `examples/03_resilience/03_rate_limiting.py`:
//! token bucket for burst-tolerant APIs, sliding window for hard per-window
//! caps, a keyed wrapper for per-tenant limits, and a composite AND-combiner
//! for layered limits (e.g. "10/sec burst AND 500/minute sustained").

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Common contract every limiter implementation satisfies. `acquire` with
/// `block = false` is non-blocking (returns immediately); with
/// `block = true` it suspends until `n` permits are available.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Attempt to consume `n` permits. Returns `true` if granted.
    fn try_acquire(&self, n: u32) -> bool;

    /// Seconds to wait before `n` permits would be available.
    fn get_wait_time(&self, n: u32) -> f64;

    /// Non-blocking (`block = false`) or suspending (`block = true`)
    /// acquire.
    async fn acquire(&self, n: u32, block: bool) -> bool {
        if self.try_acquire(n) {
            return true;
        }
        if !block {
            return false;
        }
        loop {
            let wait = self.get_wait_time(n);
            if wait <= 0.0 {
                if self.try_acquire(n) {
                    return true;
                }
                continue;
            }
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
            if self.try_acquire(n) {
                return true;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Token bucket
// ---------------------------------------------------------------------------

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// `rate` tokens/sec refill into a bucket capped at `capacity`; bursts up
/// to `capacity` are allowed instantly.
pub struct TokenBucketLimiter {
    pub rate: f64,
    pub capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucketLimiter {
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = Instant::now();
    }

    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        state.tokens
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    fn try_acquire(&self, n: u32) -> bool {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        let need = n as f64;
        if state.tokens >= need {
            state.tokens -= need;
            true
        } else {
            false
        }
    }

    fn get_wait_time(&self, n: u32) -> f64 {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        let need = n as f64 - state.tokens;
        if need <= 0.0 {
            0.0
        } else {
            need / self.rate
        }
    }
}

// ---------------------------------------------------------------------------
// Sliding window
// ---------------------------------------------------------------------------

/// At most `max_requests` granted within any rolling `window` — timestamps
/// of granted requests are tracked and pruned on each call.
pub struct SlidingWindowLimiter {
    pub max_requests: u32,
    pub window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window, timestamps: Mutex::new(VecDeque::new()) }
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>) {
        let cutoff = Instant::now() - self.window;
        while let Some(&front) = timestamps.front() {
            if front < cutoff {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    fn try_acquire(&self, n: u32) -> bool {
        let mut timestamps = self.timestamps.lock().unwrap();
        self.prune(&mut timestamps);
        if timestamps.len() + n as usize <= self.max_requests as usize {
            let now = Instant::now();
            for _ in 0..n {
                timestamps.push_back(now);
            }
            true
        } else {
            false
        }
    }

    fn get_wait_time(&self, n: u32) -> f64 {
        let mut timestamps = self.timestamps.lock().unwrap();
        self.prune(&mut timestamps);
        if timestamps.len() + n as usize <= self.max_requests as usize {
            return 0.0;
        }
        // Wait until enough of the oldest entries fall out of the window.
        let overflow = timestamps.len() + n as usize - self.max_requests as usize;
        match timestamps.get(overflow - 1) {
            Some(&ts) => {
                let expiry = ts + self.window;
                expiry.saturating_duration_since(Instant::now()).as_secs_f64()
            }
            None => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Keyed limiter
// ---------------------------------------------------------------------------

/// Wraps a factory producing a fresh limiter per key, lazily creating
/// buckets on first use and garbage-collecting idle ones.
pub struct KeyedRateLimiter<F>
where
    F: Fn() -> Box<dyn RateLimiter> + Send + Sync,
{
    factory: F,
    buckets: Mutex<HashMap<String, (Box<dyn RateLimiter>, Instant)>>,
    idle_gc_after: Duration,
}

impl<F> KeyedRateLimiter<F>
where
    F: Fn() -> Box<dyn RateLimiter> + Send + Sync,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            buckets: Mutex::new(HashMap::new()),
            idle_gc_after: Duration::from_secs(300),
        }
    }

    pub fn with_idle_gc(mut self, after: Duration) -> Self {
        self.idle_gc_after = after;
        self
    }

    fn gc(&self, buckets: &mut HashMap<String, (Box<dyn RateLimiter>, Instant)>) {
        let cutoff = Instant::now() - self.idle_gc_after;
        buckets.retain(|_, (_, last_used)| *last_used >= cutoff);
    }

    pub fn try_acquire_for(&self, key: &str, n: u32) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        self.gc(&mut buckets);
        let entry = buckets
            .entry(key.to_string())
            .or_insert_with(|| ((self.factory)(), Instant::now()));
        entry.1 = Instant::now();
        entry.0.try_acquire(n)
    }

    pub fn get_wait_time_for(&self, key: &str, n: u32) -> f64 {
        let mut buckets = self.buckets.lock().unwrap();
        let entry = buckets
            .entry(key.to_string())
            .or_insert_with(|| ((self.factory)(), Instant::now()));
        entry.1 = Instant::now();
        entry.0.get_wait_time(n)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// ANDs several limiters together: a request is granted only if every
/// member grants it; reports the max of the members' wait times.
pub struct CompositeRateLimiter {
    members: Vec<Box<dyn RateLimiter>>,
}

impl CompositeRateLimiter {
    pub fn new(members: Vec<Box<dyn RateLimiter>>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl RateLimiter for CompositeRateLimiter {
    fn try_acquire(&self, n: u32) -> bool {
        // All-or-nothing: probe wait times first so a partial acquisition
        // never leaves one limiter debited while another rejects.
        if self.members.iter().any(|m| m.get_wait_time(n) > 0.0) {
            return false;
        }
        self.members.iter().all(|m| m.try_acquire(n))
    }

    fn get_wait_time(&self, n: u32) -> f64 {
        self.members.iter().map(|m| m.get_wait_time(n)).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_allows_burst_up_to_capacity() {
        let limiter = TokenBucketLimiter::new(5.0, 10.0);
        for _ in 0..10 {
            assert!(limiter.try_acquire(1));
        }
        assert!(!limiter.try_acquire(1));
    }

    #[test]
    fn token_bucket_reports_wait_time_when_exhausted() {
        let limiter = TokenBucketLimiter::new(10.0, 2.0);
        assert!(limiter.try_acquire(2));
        let wait = limiter.get_wait_time(1);
        assert!(wait > 0.0 && wait <= 0.1 + 0.01);
    }

    #[test]
    fn sliding_window_limits_strict_count() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(1));
        for _ in 0..5 {
            assert!(limiter.try_acquire(1));
        }
        assert!(!limiter.try_acquire(1));
    }

    #[test]
    fn composite_requires_all_members_to_allow() {
        let per_sec = Box::new(TokenBucketLimiter::new(100.0, 1.0));
        let per_min = Box::new(SlidingWindowLimiter::new(1, Duration::from_secs(60)));
        let composite = CompositeRateLimiter::new(vec![per_sec, per_min]);
        assert!(composite.try_acquire(1));
        assert!(!composite.try_acquire(1));
    }

    #[test]
    fn keyed_limiter_tracks_independent_buckets_per_key() {
        let keyed = KeyedRateLimiter::new(|| Box::new(TokenBucketLimiter::new(1.0, 1.0)) as Box<dyn RateLimiter>);
        assert!(keyed.try_acquire_for("a", 1));
        assert!(!keyed.try_acquire_for("a", 1));
        assert!(keyed.try_acquire_for("b", 1));
        assert_eq!(keyed.bucket_count(), 2);
    }
}
