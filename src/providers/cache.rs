//! TTL cache for fetched candle series.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::{Series, Timeframe};

/// Cache statistics snapshot (observability hook).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups that returned a fresh entry
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries dropped because their TTL expired
    pub evictions: u64,
    /// Entries currently stored
    pub keys: usize,
}

struct Entry {
    series: Series,
    inserted_at: Instant,
}

/// A `(symbol, timeframe)` keyed series cache with per-entry TTL.
///
/// Series are immutable, so hits hand out clones of the stored value. Live
/// engines use a short TTL (~45 s); historical backfills may use a very long
/// one. Entries only expire, they are never mutated.
pub struct CandleCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, Timeframe), Entry>>,
    stats: Mutex<CacheStats>,
}

impl CandleCache {
    /// Create a cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Fetch a fresh entry, evicting it if expired.
    pub async fn get(&self, symbol: &str, timeframe: Timeframe) -> Option<Series> {
        let key = (symbol.to_string(), timeframe);
        let mut entries = self.entries.lock().await;
        let mut stats = self.stats.lock().await;

        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                stats.hits += 1;
                Some(entry.series.clone())
            }
            Some(_) => {
                entries.remove(&key);
                stats.evictions += 1;
                stats.misses += 1;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Store a series under its own `(symbol, timeframe)` key.
    pub async fn insert(&self, series: Series) {
        let key = (series.symbol.clone(), series.timeframe);
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            Entry {
                series,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Current statistics.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        let stats = self.stats.lock().await;
        CacheStats {
            keys: entries.len(),
            ..*stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candle;

    fn series(symbol: &str, tf: Timeframe) -> Series {
        Series::new(
            symbol,
            tf,
            vec![Candle {
                timestamp: 1_700_000_000,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 10.0,
            }],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_hit_and_miss_accounting() {
        let cache = CandleCache::new(Duration::from_secs(60));
        assert!(cache.get("BTCUSDT", Timeframe::H1).await.is_none());

        cache.insert(series("BTCUSDT", Timeframe::H1)).await;
        assert!(cache.get("BTCUSDT", Timeframe::H1).await.is_some());
        assert!(cache.get("BTCUSDT", Timeframe::H4).await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.keys, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_eviction() {
        let cache = CandleCache::new(Duration::from_secs(30));
        cache.insert(series("BTCUSDT", Timeframe::H1)).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.get("BTCUSDT", Timeframe::H1).await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.keys, 0);
    }
}
