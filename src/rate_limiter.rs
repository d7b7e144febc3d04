//! Token bucket rate limiter shared across data providers.
//!
//! One bucket is shared by every worker hitting the same upstream host
//! (klines, futures stats, global market data). Tokens refill at a steady
//! rate; [`RateLimiter::acquire`] sleeps until a token is available.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

struct Bucket {
    available: f64,
    last_refill: Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

/// A token bucket rate limiter.
///
/// Safe to share behind an `Arc` across concurrently evaluated symbols.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    permits_issued: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter allowing `max_per_second` requests per second.
    ///
    /// The bucket holds at least one token so `acquire` always makes
    /// progress, even for sub-1/sec rates.
    pub fn new(max_per_second: f64) -> Self {
        let max_tokens = max_per_second.max(1.0);
        Self {
            bucket: Mutex::new(Bucket {
                available: max_tokens,
                last_refill: Instant::now(),
                max_tokens,
                refill_rate: max_per_second,
            }),
            permits_issued: AtomicU64::new(0),
        }
    }

    /// Acquire a token, sleeping if necessary to respect the rate limit.
    pub async fn acquire(&self) {
        loop {
            let sleep_for = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.available =
                    (bucket.available + elapsed * bucket.refill_rate).min(bucket.max_tokens);
                bucket.last_refill = now;

                if bucket.available >= 1.0 {
                    bucket.available -= 1.0;
                    self.permits_issued.fetch_add(1, Ordering::Relaxed);
                    return;
                }

                let deficit = 1.0 - bucket.available;
                Duration::from_secs_f64(deficit / bucket.refill_rate)
            };
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Total permits handed out since construction (metrics hook).
    pub fn permits_issued(&self) -> u64 {
        self.permits_issued.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_immediate_acquire_within_burst() {
        let limiter = RateLimiter::new(10.0);
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.permits_issued(), 10);
    }

    #[tokio::test]
    async fn test_acquire_blocks_when_empty() {
        tokio::time::pause();

        let limiter = RateLimiter::new(2.0);
        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();

        // One token at 2/sec takes ~500ms to refill
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed <= Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_sub_one_per_second_rate() {
        tokio::time::pause();

        let limiter = RateLimiter::new(0.5);
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(1900));
        assert!(elapsed <= Duration::from_millis(2100));
    }
}
