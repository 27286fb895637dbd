//! Global admission rate limit for the worker pool.
//!
//! Bounds how many jobs are started per time window across every task of a
//! worker process, so a wide frontier cannot hammer the crawled site. This is
//! the only politeness measure the crawler applies.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use seoscan_core::rate_limit::{RateLimitConfig, RateLimiter};
//!
//! # async fn run() {
//! // At most 10 jobs per second.
//! let limiter = RateLimiter::new(RateLimitConfig::new(10, Duration::from_secs(1)));
//! limiter.acquire().await;
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Configuration for the job rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum jobs admitted within any `window`. Zero disables limiting.
    pub max_jobs: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_jobs: u32, window: Duration) -> Self {
        Self { max_jobs, window }
    }

    /// No limit at all.
    pub fn unlimited() -> Self {
        Self {
            max_jobs: 0,
            window: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_jobs > 0 && !self.window.is_zero()
    }
}

impl Default for RateLimitConfig {
    /// 1000 jobs per 5 seconds.
    fn default() -> Self {
        Self {
            max_jobs: 1000,
            window: Duration::from_secs(5),
        }
    }
}

/// Sliding-window limiter shared by all tasks of a worker pool.
///
/// Keeps the admission time of each job started in the current window and
/// makes callers wait until the oldest one falls out of it.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    admitted: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            admitted: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until one more job may start, then record it.
    pub async fn acquire(&self) {
        if !self.config.is_enabled() {
            return;
        }

        loop {
            let mut admitted = self.admitted.lock().await;
            let now = Instant::now();
            Self::prune(&mut admitted, now, self.config.window);

            if admitted.len() < self.config.max_jobs as usize {
                admitted.push_back(now);
                return;
            }

            // The window is full; the front entry is the next one to expire.
            let wait = match admitted.front() {
                Some(&oldest) => (oldest + self.config.window).saturating_duration_since(now),
                None => Duration::ZERO,
            };
            // Drop the lock while sleeping so other tasks can observe the window.
            drop(admitted);
            tracing::debug!(wait_ms = %wait.as_millis(), "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    fn prune(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&front) = admitted.front() {
            if now.duration_since(front) >= window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}
