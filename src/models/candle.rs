//! OHLCV candle and validated candle series.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::models::Timeframe;

/// A single OHLCV candle/bar.
///
/// Immutable once ingested; series constructors validate ordering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open timestamp (Unix seconds)
    pub timestamp: i64,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume in base units
    pub volume: f64,
}

impl Candle {
    /// Typical price `(high + low + close) / 3`
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// An ordered series of candles for a single `(symbol, timeframe)`.
///
/// Construction enforces strictly increasing timestamps with no duplicates;
/// the last bar is the most recent closed bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Instrument symbol (e.g. `"BTCUSDT"`)
    pub symbol: String,
    /// Bar interval
    pub timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl Series {
    /// Build a series, validating ordering.
    ///
    /// Returns `InputInvalid` for an empty vector or any non-monotonic or
    /// duplicate timestamp.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> Result<Self> {
        let symbol = symbol.into();
        if candles.is_empty() {
            return Err(EngineError::input(format!(
                "empty candle series for {symbol} {timeframe}"
            )));
        }
        for pair in candles.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(EngineError::input(format!(
                    "non-monotonic timestamps in {symbol} {timeframe}: {} then {}",
                    pair[0].timestamp, pair[1].timestamp
                )));
            }
        }
        Ok(Self {
            symbol,
            timeframe,
            candles,
        })
    }

    /// All candles, oldest first
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Number of bars
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Whether the series holds no bars (never true for a validated series)
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Most recent closed bar
    pub fn last(&self) -> &Candle {
        // Non-empty by construction
        self.candles.last().unwrap_or_else(|| unreachable!())
    }

    /// Require at least `min` bars, else `InputInvalid`
    pub fn require_len(&self, min: usize) -> Result<()> {
        if self.candles.len() < min {
            return Err(EngineError::input(format!(
                "{} {} has {} bars, need at least {min}",
                self.symbol,
                self.timeframe,
                self.candles.len()
            )));
        }
        Ok(())
    }

    /// Close prices, oldest first
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// High prices, oldest first
    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    /// Low prices, oldest first
    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    /// Volumes, oldest first
    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// View of the last `n` candles (all of them if fewer)
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }
}
