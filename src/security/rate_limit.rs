//! Fixed-window rate limiting.
//!
//! A bucket counts admissions since `window_start`. The window rotates
//! lazily: the first request at or after `window_start + window` resets the
//! count, however many windows were skipped.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::{KeyStrategy, RateLimitConfig};
use crate::http::middleware::{Interceptor, Next};
use crate::http::response::GatewayError;
use crate::observability::metrics::MetricsSink;
use crate::routing::RouteTable;

/// Key used by [`KeyStrategy::Global`].
pub const GLOBAL_KEY: &str = "global";

/// Buckets kept before idle ones are pruned.
const MAX_TRACKED_KEYS: usize = 10_000;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

#[derive(Debug)]
struct RateBucket {
    window_start: Instant,
    count: u32,
}

impl RateBucket {
    fn new(now: Instant) -> Self {
        Self { window_start: now, count: 0 }
    }

    fn try_acquire(&mut self, now: Instant, capacity: u32, window: Duration) -> Admission {
        if now.saturating_duration_since(self.window_start) >= window {
            self.window_start = now;
            self.count = 0;
        }

        if self.count < capacity {
            self.count += 1;
            Admission::Admitted
        } else {
            let reset_at = self.window_start + window;
            Admission::Rejected {
                retry_after: reset_at.saturating_duration_since(now),
            }
        }
    }
}

/// Fixed-window limiter keyed by string.
///
/// Check-and-increment for a key runs under that key's map shard lock, so
/// concurrent callers can never both take the last slot.
///
/// Past `max_keys` buckets, idle ones are pruned at most once per window.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    buckets: DashMap<String, RateBucket>,
    capacity: u32,
    window: Duration,
    max_keys: usize,
    last_prune: Mutex<Option<Instant>>,
}

impl FixedWindowLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            window,
            max_keys: MAX_TRACKED_KEYS,
            last_prune: Mutex::new(None),
        }
    }

    /// Override the bucket count that triggers pruning.
    pub fn with_key_limit(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.window())
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or reject one request for `key` now.
    pub fn admit(&self, key: &str) -> Admission {
        self.admit_at(key, Instant::now())
    }

    /// Admit or reject one request for `key` at `now`.
    pub fn admit_at(&self, key: &str, now: Instant) -> Admission {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return bucket.try_acquire(now, self.capacity, self.window);
        }

        if self.buckets.len() >= self.max_keys {
            self.maybe_prune(now);
        }
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| RateBucket::new(now))
            .try_acquire(now, self.capacity, self.window)
    }

    /// Prune unless another caller is pruning or one ran within the last window.
    fn maybe_prune(&self, now: Instant) {
        let mut last = match self.last_prune.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        if last.is_some_and(|at| now.saturating_duration_since(at) < self.window) {
            return;
        }
        *last = Some(now);
        self.prune(now);
        tracing::debug!(tracked = self.buckets.len(), "Pruned idle rate limit buckets");
    }

    /// Drop buckets whose window has already ended.
    pub fn prune(&self, now: Instant) {
        let window = self.window;
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.window_start) < window);
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

/// Interceptor applying a [`FixedWindowLimiter`] to every request.
pub struct RateLimit {
    limiter: Arc<FixedWindowLimiter>,
    strategy: KeyStrategy,
    routes: Arc<RouteTable>,
    sink: Arc<dyn MetricsSink>,
}

impl RateLimit {
    pub fn new(
        limiter: Arc<FixedWindowLimiter>,
        strategy: KeyStrategy,
        routes: Arc<RouteTable>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self { limiter, strategy, routes, sink }
    }

    /// Bucket key for a request, or `None` when the request is not limited.
    fn key_for(&self, request: &Request<Body>) -> Option<String> {
        match self.strategy {
            KeyStrategy::Global => Some(GLOBAL_KEY.to_string()),
            KeyStrategy::ClientIp => Some(
                request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            KeyStrategy::Route => self
                .routes
                .match_path(request.uri().path())
                .map(|route| route.prefix().to_string()),
        }
    }

    fn strategy_label(&self) -> &'static str {
        match self.strategy {
            KeyStrategy::Global => "global",
            KeyStrategy::ClientIp => "client_ip",
            KeyStrategy::Route => "route",
        }
    }
}

#[async_trait]
impl Interceptor for RateLimit {
    async fn handle(&self, request: Request<Body>, next: Next<'_>) -> Response {
        let Some(key) = self.key_for(&request) else {
            return next.run(request).await;
        };

        match self.limiter.admit(&key) {
            Admission::Admitted => next.run(request).await,
            Admission::Rejected { retry_after } => {
                tracing::warn!(key = %key, retry_after = ?retry_after, "Rate limit exceeded");
                self.sink.record_rate_limited(self.strategy_label());
                GatewayError::RateLimited { key, retry_after }.into_response()
            }
        }
    }
}
