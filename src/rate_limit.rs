//! Burst rate limiting for the staging endpoint
//!
//! Sliding window per caller key (token lineage or client IP), independent of
//! credit balance. Uses DashMap for lock-free concurrent access.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sliding window rate limiter keyed by caller
pub struct RateLimiter {
    /// Map of key -> request timestamps inside the window
    requests: DashMap<String, Vec<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request for `key`
    ///
    /// Returns `Err(retry_after)` when the window is full. Rejected requests
    /// are not recorded.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let window = self.window;
        let mut entry = self.requests.entry(key.to_string()).or_default();
        let timestamps = entry.value_mut();

        timestamps.retain(|t| now.duration_since(*t) < window);

        if timestamps.len() >= self.max_requests {
            // Oldest entry leaves the window first
            let retry_after = timestamps
                .first()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            warn!(
                key,
                requests = timestamps.len(),
                max = self.max_requests,
                "Rate limit exceeded"
            );
            return Err(retry_after);
        }

        timestamps.push(now);
        Ok(())
    }

    /// Remaining requests for a key in the current window
    pub fn remaining(&self, key: &str) -> usize {
        let now = Instant::now();
        let count = self
            .requests
            .get(key)
            .map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|t| now.duration_since(**t) < self.window)
                    .count()
            })
            .unwrap_or(0);

        self.max_requests.saturating_sub(count)
    }

    /// Drop keys with no requests left in the window
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.window;

        self.requests.retain(|_, times| {
            times.retain(|t| now.duration_since(*t) < window);
            !times.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }
}

/// Prune idle keys once per window for the life of the process
pub fn spawn_cleanup_task(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.window());
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiter.cleanup();
            debug!(keys = limiter.tracked_keys(), "Pruned rate limiter");
        }
    })
}
