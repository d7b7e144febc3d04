//! Injected capabilities: clock, cache, and rate limiting.
//!
//! Every operation that needs wall-clock time, caching, or throttling takes a
//! [`Context`] instead of reaching for globals. Tests substitute a frozen
//! clock; the backtest engine never uses a `Context` at all, since its clock is
//! the bar timestamp.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Timelike, Utc};

use crate::config::EngineConfig;
use crate::providers::CandleCache;
use crate::rate_limiter::RateLimiter;

/// Source of "now".
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC hour, 0–23 (session-timing checks)
    fn utc_hour(&self) -> u32 {
        self.now().hour()
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a fixed instant. Test double; also used by the live
/// pipeline to evaluate criteria against the bar close rather than "now".
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Freeze at a Unix timestamp (seconds)
    pub fn at_timestamp(secs: i64) -> Self {
        Self(
            Utc.timestamp_opt(secs, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Shared process-wide state for one engine instance.
///
/// Owns the candle cache and the per-host rate-limit bucket; workers running
/// different symbols in parallel share a single `Context` behind `Arc`s.
#[derive(Clone)]
pub struct Context {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Upstream request throttle
    pub limiter: Arc<RateLimiter>,
    /// TTL cache for fetched series
    pub cache: Arc<CandleCache>,
}

impl Context {
    /// Build a context from configuration with the system clock.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            limiter: Arc::new(RateLimiter::new(config.rate_limit_per_sec)),
            cache: Arc::new(CandleCache::new(config.cache_ttl)),
        }
    }

    /// Replace the clock (tests, backfills).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
