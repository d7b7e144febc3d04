//! Engine configuration.
//!
//! One record covers the whole live pipeline: provider endpoints, cache and
//! throttle settings, filter/planner parameters. Defaults work against public
//! endpoints with no credentials.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::filter::FilterConfig;
use crate::planner::PlannerConfig;

/// Top-level configuration for a [`SignalEngine`](crate::pipeline::SignalEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL for the spot klines API (Binance-compatible)
    pub market_base_url: String,
    /// Base URL for the futures statistics API (funding rate, open interest)
    pub futures_base_url: String,
    /// Base URL for global market data (dominance, ETH/BTC)
    pub global_base_url: String,
    /// Fear & Greed index endpoint (alternative.me format)
    pub fear_greed_url: String,
    /// RSS/Atom feeds polled for headlines
    pub news_feed_urls: Vec<String>,
    /// Optional API key; public endpoints work without one
    pub api_key: Option<String>,
    /// Per-request timeout for every external fetch
    pub request_timeout: Duration,
    /// TTL for the `(symbol, timeframe)` candle cache
    pub cache_ttl: Duration,
    /// Shared upstream request budget, requests per second
    pub rate_limit_per_sec: f64,
    /// Minimum bars required per timeframe in the MTF view
    pub min_bars: usize,
    /// Total wall-clock budget for one signal evaluation
    pub pipeline_budget: Duration,
    /// ML approval threshold (probability 0–1)
    pub ml_threshold: f64,
    /// TP1 distance in risk units R from entry
    pub tp1_r_multiple: f64,
    /// TP2 distance in risk units R from entry
    pub tp2_r_multiple: f64,
    /// Log level hint for hosts that install a subscriber
    pub log_level: String,
    /// Directory for persisted tearsheets and CSV exports
    pub persistence_path: Option<PathBuf>,
    /// Filter thresholds and criterion parameters
    pub filter: FilterConfig,
    /// Execution planner parameters
    pub planner: PlannerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            market_base_url: "https://api.binance.com".to_string(),
            futures_base_url: "https://fapi.binance.com".to_string(),
            global_base_url: "https://api.coingecko.com/api/v3".to_string(),
            fear_greed_url: "https://api.alternative.me/fng/?limit=1&format=json".to_string(),
            news_feed_urls: vec![
                "https://www.coindesk.com/arc/outboundfeeds/rss/".to_string(),
                "https://cointelegraph.com/rss".to_string(),
            ],
            api_key: None,
            request_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(45),
            rate_limit_per_sec: 20.0,
            min_bars: 200,
            pipeline_budget: Duration::from_secs(30),
            ml_threshold: 0.60,
            tp1_r_multiple: 2.0,
            tp2_r_multiple: 3.0,
            log_level: "info".to_string(),
            persistence_path: None,
            filter: FilterConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

/// Per-symbol thresholds used by the criterion evaluator and feature
/// extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolProfile {
    /// Whether the symbol is a crypto pair (selects the crypto criterion set)
    pub is_crypto: bool,
    /// Minimum H1 ATR for the volatility criterion (price units)
    pub atr_floor: f64,
    /// Minimum |EMA21 − EMA50| spacing on H1 (price units)
    pub ema_spacing_floor: f64,
    /// Active session window, UTC hours `[start, end]` inclusive
    pub session_start_hour: u32,
    /// End of the active session window (inclusive)
    pub session_end_hour: u32,
    /// Historical win rate for this pair, feeds the ML features
    pub pair_win_rate: f64,
}

impl SymbolProfile {
    /// Profile for a symbol using scale-appropriate defaults.
    ///
    /// BTC-scale floors for crypto pairs; JPY pairs trade the Tokyo/London
    /// overlap, other forex pairs the London/New York overlap.
    pub fn for_symbol(symbol: &str) -> Self {
        let upper = symbol.to_ascii_uppercase();
        let is_crypto = upper.ends_with("USDT")
            || upper.ends_with("BTC")
            || upper.starts_with("BTC")
            || upper.starts_with("ETH");

        if is_crypto {
            Self {
                is_crypto: true,
                atr_floor: 100.0,
                ema_spacing_floor: 50.0,
                session_start_hour: 13,
                session_end_hour: 17,
                pair_win_rate: 0.58,
            }
        } else if upper.contains("JPY") {
            Self {
                is_crypto: false,
                atr_floor: 0.05,
                ema_spacing_floor: 0.02,
                session_start_hour: 7,
                session_end_hour: 10,
                pair_win_rate: 0.55,
            }
        } else {
            Self {
                is_crypto: false,
                atr_floor: 0.0005,
                ema_spacing_floor: 0.0002,
                session_start_hour: 12,
                session_end_hour: 16,
                pair_win_rate: 0.55,
            }
        }
    }

    /// Whether an UTC hour falls inside the active session window
    pub fn in_session(&self, utc_hour: u32) -> bool {
        if self.session_start_hour <= self.session_end_hour {
            (self.session_start_hour..=self.session_end_hour).contains(&utc_hour)
        } else {
            // Window wraps midnight
            utc_hour >= self.session_start_hour || utc_hour <= self.session_end_hour
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_need_no_credentials() {
        let config = EngineConfig::default();
        assert!(config.api_key.is_none());
        assert!(config.market_base_url.starts_with("https://"));
        assert_eq!(config.min_bars, 200);
        assert_eq!(config.pipeline_budget, Duration::from_secs(30));
    }

    #[test]
    fn test_symbol_profile_crypto() {
        let profile = SymbolProfile::for_symbol("BTCUSDT");
        assert!(profile.is_crypto);
        assert_eq!(profile.atr_floor, 100.0);
        assert!(profile.in_session(15));
        assert!(!profile.in_session(3));
    }

    #[test]
    fn test_symbol_profile_jpy_overlap() {
        let profile = SymbolProfile::for_symbol("EURJPY");
        assert!(!profile.is_crypto);
        assert!(profile.in_session(8));
        assert!(!profile.in_session(20));
    }

    #[test]
    fn test_session_window_wrapping() {
        let profile = SymbolProfile {
            is_crypto: false,
            atr_floor: 0.0,
            ema_spacing_floor: 0.0,
            session_start_hour: 22,
            session_end_hour: 2,
            pair_win_rate: 0.5,
        };
        assert!(profile.in_session(23));
        assert!(profile.in_session(1));
        assert!(!profile.in_session(12));
    }
}
