//! Last-bar indicator snapshot for one series.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::indicators::{self, last_value};
use crate::models::{Candle, Series};

/// The most recent bar of a series augmented with computed indicator values.
///
/// Fields are `None` until the underlying series has enough history to warm
/// the indicator up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// The most recent closed bar
    pub candle: Candle,
    /// EMA(9) of closes
    pub ema_9: Option<f64>,
    /// EMA(21) of closes
    pub ema_21: Option<f64>,
    /// EMA(50) of closes
    pub ema_50: Option<f64>,
    /// EMA(200) of closes
    pub ema_200: Option<f64>,
    /// SMA(20) of closes
    pub sma_20: Option<f64>,
    /// RSI(14), Wilder smoothing
    pub rsi_14: Option<f64>,
    /// MACD(12,26,9) line
    pub macd_line: Option<f64>,
    /// MACD signal line
    pub macd_signal: Option<f64>,
    /// MACD histogram
    pub macd_histogram: Option<f64>,
    /// Bollinger(20,2) upper band
    pub bb_upper: Option<f64>,
    /// Bollinger middle band (SMA20)
    pub bb_middle: Option<f64>,
    /// Bollinger lower band
    pub bb_lower: Option<f64>,
    /// ATR(14), Wilder smoothing
    pub atr_14: Option<f64>,
    /// Stochastic %K (14)
    pub stoch_k: Option<f64>,
    /// Stochastic %D (SMA3 of %K)
    pub stoch_d: Option<f64>,
    /// ADX(14)
    pub adx_14: Option<f64>,
    /// Current volume / SMA20(volume)
    pub volume_ratio_20: Option<f64>,
}

impl IndicatorSnapshot {
    /// Compute the snapshot from a series.
    ///
    /// Indicators that cannot warm up on the available history are left
    /// `None`; a series long enough for the criterion evaluator (≥ 200 bars)
    /// fills every field.
    pub fn compute(series: &Series) -> Result<Self> {
        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();
        let volumes = series.volumes();

        let macd = indicators::macd(&closes, 12, 26, 9);
        let bb = indicators::bollinger_bands(&closes, 20, 2.0);
        let stoch = indicators::stochastic(&highs, &lows, &closes, 14, 3);

        Ok(Self {
            candle: *series.last(),
            ema_9: last_value(&indicators::ema(&closes, 9)),
            ema_21: last_value(&indicators::ema(&closes, 21)),
            ema_50: last_value(&indicators::ema(&closes, 50)),
            ema_200: last_value(&indicators::ema(&closes, 200)),
            sma_20: last_value(&indicators::sma(&closes, 20)),
            rsi_14: indicators::rsi(&closes, 14)
                .ok()
                .and_then(|v| last_value(&v)),
            macd_line: macd.as_ref().ok().and_then(|m| last_value(&m.line)),
            macd_signal: macd.as_ref().ok().and_then(|m| last_value(&m.signal)),
            macd_histogram: macd.as_ref().ok().and_then(|m| last_value(&m.histogram)),
            bb_upper: bb.as_ref().ok().and_then(|b| last_value(&b.upper)),
            bb_middle: bb.as_ref().ok().and_then(|b| last_value(&b.middle)),
            bb_lower: bb.as_ref().ok().and_then(|b| last_value(&b.lower)),
            atr_14: indicators::atr(&highs, &lows, &closes, 14)
                .ok()
                .and_then(|v| last_value(&v)),
            stoch_k: stoch.as_ref().ok().and_then(|s| last_value(&s.k)),
            stoch_d: stoch.as_ref().ok().and_then(|s| last_value(&s.d)),
            adx_14: indicators::adx(&highs, &lows, &closes, 14)
                .ok()
                .and_then(|v| last_value(&v)),
            volume_ratio_20: last_value(&indicators::volume_ratio(&volumes, 20)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timeframe;

    fn trending_series(n: usize) -> Series {
        let candles = (0..n)
            .map(|i| {
                let price = 100.0 + i as f64 * 0.5;
                Candle {
                    timestamp: 1_700_000_000 + i as i64 * 3600,
                    open: price,
                    high: price + 1.0,
                    low: price - 1.0,
                    close: price,
                    volume: 1000.0 + (i % 7) as f64 * 50.0,
                }
            })
            .collect();
        Series::new("BTCUSDT", Timeframe::H1, candles).unwrap()
    }

    #[test]
    fn test_snapshot_full_history() {
        let snap = IndicatorSnapshot::compute(&trending_series(250)).unwrap();
        assert!(snap.ema_21.is_some());
        assert!(snap.ema_200.is_some());
        assert!(snap.rsi_14.is_some());
        assert!(snap.macd_histogram.is_some());
        assert!(snap.bb_middle.is_some());
        assert!(snap.atr_14.is_some());
        assert!(snap.stoch_k.is_some());
        assert!(snap.adx_14.is_some());
        assert!(snap.volume_ratio_20.is_some());
        // Uptrend: fast EMA above slow EMA, RSI elevated
        assert!(snap.ema_21.unwrap() > snap.ema_200.unwrap());
        assert!(snap.rsi_14.unwrap() > 50.0);
    }

    #[test]
    fn test_snapshot_short_history_leaves_none() {
        let snap = IndicatorSnapshot::compute(&trending_series(30)).unwrap();
        assert!(snap.ema_21.is_some());
        assert!(snap.ema_200.is_none());
    }
}
