//! Token-bucket rate limiter gating provider invocations.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

/// Token bucket settings for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Refill rate in tokens per second.
    pub requests_per_second: f64,

    /// How often a waiting caller re-checks the bucket, in seconds.
    pub check_every_secs: f64,

    /// Maximum burst size.
    pub max_bucket_size: f64,
}

impl RateLimiterConfig {
    /// Primary budget: 9 requests per minute, bursts of up to 9.
    pub fn primary_default() -> Self {
        Self {
            requests_per_second: 9.0 / 60.0,
            check_every_secs: 1.0,
            max_bucket_size: 9.0,
        }
    }

    /// Secondary budget: one request every 5 seconds, safe for the free tier.
    pub fn secondary_default() -> Self {
        Self {
            requests_per_second: 1.0 / 5.0,
            check_every_secs: 1.0,
            max_bucket_size: 3.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.requests_per_second > 0.0 && self.check_every_secs > 0.0 && self.max_bucket_size >= 1.0
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Option<Instant>,
}

/// Blocking token bucket. The bucket starts empty and fills at the
/// configured rate; `acquire` sleeps until a whole token is available.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            bucket: Mutex::new(Bucket {
                tokens: 0.0,
                last_refill: None,
            }),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        if let Some(last) = bucket.last_refill {
            let elapsed = now.duration_since(last).as_secs_f64();
            bucket.tokens =
                (bucket.tokens + elapsed * self.config.requests_per_second).min(self.config.max_bucket_size);
        }
        bucket.last_refill = Some(now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait until a token is available, then consume it.
    pub async fn acquire(&self) {
        let interval = Duration::from_secs_f64(self.config.check_every_secs);
        let mut waited = 0u32;
        while !self.try_acquire() {
            waited += 1;
            tokio::time::sleep(interval).await;
        }
        if waited > 0 {
            debug!("Rate limiter released after {} checks", waited);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rate: f64, capacity: f64) -> RateLimiterConfig {
        RateLimiterConfig {
            requests_per_second: rate,
            check_every_secs: 0.1,
            max_bucket_size: capacity,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_starts_empty() {
        let limiter = RateLimiter::new(config(1.0, 2.0));
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_capped_at_capacity() {
        let limiter = RateLimiter::new(config(1.0, 2.0));
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new(config(1.0, 1.0));
        let start = Instant::now();

        limiter.acquire().await;

        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(1), "waited {waited:?}");
        assert!(waited < Duration::from_secs(2), "waited {waited:?}");
    }

    #[test]
    fn test_default_budgets_are_valid() {
        assert!(RateLimiterConfig::primary_default().is_valid());
        assert!(RateLimiterConfig::secondary_default().is_valid());
        assert!(!config(0.0, 1.0).is_valid());
    }
}
