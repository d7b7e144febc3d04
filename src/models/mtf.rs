//! Timeframes and the four-timeframe market view.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::models::Series;

/// Canonical bar intervals used by the signal pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// 15-minute bars
    M15,
    /// 1-hour bars
    H1,
    /// 4-hour bars
    H4,
    /// Daily bars
    D1,
}

impl Timeframe {
    /// All canonical timeframes, shortest first
    pub const ALL: [Timeframe; 4] = [Timeframe::M15, Timeframe::H1, Timeframe::H4, Timeframe::D1];

    /// Bar length in seconds
    pub fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::M15 => 15 * 60,
            Timeframe::H1 => 60 * 60,
            Timeframe::H4 => 4 * 60 * 60,
            Timeframe::D1 => 24 * 60 * 60,
        }
    }

    /// Upstream interval token (Binance kline format)
    pub fn api_token(&self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        write!(f, "{tag}")
    }
}

impl std::str::FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "M15" | "15M" => Ok(Timeframe::M15),
            "H1" | "1H" => Ok(Timeframe::H1),
            "H4" | "4H" => Ok(Timeframe::H4),
            "D1" | "1D" => Ok(Timeframe::D1),
            other => Err(EngineError::input(format!("unknown timeframe '{other}'"))),
        }
    }
}

/// The multi-timeframe view: one series per canonical timeframe, all
/// terminating at the same aligned bar close.
///
/// The D1 close defines the anchor; each lower timeframe must end on the
/// latest close that falls within one D1 period of the anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtfView {
    /// Instrument symbol shared by all four series
    pub symbol: String,
    series: BTreeMap<Timeframe, Series>,
}

impl MtfView {
    /// Assemble and validate the four-timeframe view.
    ///
    /// Fails with `InputInvalid` when a timeframe is missing, holds fewer than
    /// `min_bars`, belongs to a different symbol, or is not aligned with the
    /// D1 anchor.
    pub fn new(series: Vec<Series>, min_bars: usize) -> Result<Self> {
        let mut map = BTreeMap::new();
        let mut symbol: Option<String> = None;

        for s in series {
            match &symbol {
                None => symbol = Some(s.symbol.clone()),
                Some(sym) if *sym != s.symbol => {
                    return Err(EngineError::input(format!(
                        "mixed symbols in MTF view: {sym} vs {}",
                        s.symbol
                    )));
                }
                _ => {}
            }
            s.require_len(min_bars)?;
            map.insert(s.timeframe, s);
        }

        let symbol = symbol.ok_or_else(|| EngineError::input("no series supplied"))?;

        for tf in Timeframe::ALL {
            if !map.contains_key(&tf) {
                return Err(EngineError::input(format!(
                    "missing {tf} series for {symbol}"
                )));
            }
        }

        // Alignment: the anchor is the D1 close; every lower timeframe must
        // terminate within one of its own periods *behind* the anchor close
        // but never beyond the anchor plus one D1 period.
        let d1 = &map[&Timeframe::D1];
        let anchor_close = d1.last().timestamp + Timeframe::D1.duration_secs();
        for tf in [Timeframe::M15, Timeframe::H1, Timeframe::H4] {
            let s = &map[&tf];
            let tf_close = s.last().timestamp + tf.duration_secs();
            if tf_close > anchor_close || anchor_close - tf_close >= Timeframe::D1.duration_secs() {
                return Err(EngineError::input(format!(
                    "{tf} series misaligned with D1 anchor for {symbol}: \
                     {tf} closes at {tf_close}, anchor at {anchor_close}"
                )));
            }
        }

        Ok(Self { symbol, series: map })
    }

    /// Series for a timeframe (all four exist by construction)
    pub fn series(&self, tf: Timeframe) -> &Series {
        &self.series[&tf]
    }

    /// Close price of the most recent M15 bar, the working "current price"
    pub fn current_price(&self) -> f64 {
        self.series(Timeframe::M15).last().close
    }

    /// Timestamp of the most recent M15 bar
    pub fn current_timestamp(&self) -> i64 {
        self.series(Timeframe::M15).last().timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candle;

    fn series(tf: Timeframe, count: usize, end_ts: i64) -> Series {
        let step = tf.duration_secs();
        let start = end_ts - (count as i64 - 1) * step;
        let candles = (0..count)
            .map(|i| Candle {
                timestamp: start + i as i64 * step,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 10.0,
            })
            .collect();
        Series::new("BTCUSDT", tf, candles).unwrap()
    }

    fn aligned_view(min_bars: usize) -> Result<MtfView> {
        // D1 closes at t=0 anchor; lower TFs close at the same instant
        let anchor = 1_700_000_000_i64;
        MtfView::new(
            vec![
                series(Timeframe::M15, 200, anchor - Timeframe::M15.duration_secs()),
                series(Timeframe::H1, 200, anchor - Timeframe::H1.duration_secs()),
                series(Timeframe::H4, 200, anchor - Timeframe::H4.duration_secs()),
                series(Timeframe::D1, 200, anchor - Timeframe::D1.duration_secs()),
            ],
            min_bars,
        )
    }

    #[test]
    fn test_timeframe_parse_roundtrip() {
        for tf in Timeframe::ALL {
            let parsed: Timeframe = tf.to_string().parse().unwrap();
            assert_eq!(parsed, tf);
        }
        assert!("M30".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_view_accepts_aligned_series() {
        let view = aligned_view(200).unwrap();
        assert_eq!(view.symbol, "BTCUSDT");
        assert_eq!(view.series(Timeframe::H4).len(), 200);
    }

    #[test]
    fn test_view_rejects_short_series() {
        assert!(aligned_view(201).is_err());
    }

    #[test]
    fn test_view_rejects_missing_timeframe() {
        let anchor = 1_700_000_000_i64;
        let result = MtfView::new(
            vec![
                series(Timeframe::M15, 200, anchor - 900),
                series(Timeframe::H1, 200, anchor - 3600),
                series(Timeframe::D1, 200, anchor - 86_400),
            ],
            100,
        );
        assert!(matches!(result, Err(EngineError::InputInvalid(_))));
    }

    #[test]
    fn test_view_rejects_stale_lower_timeframe() {
        let anchor = 1_700_000_000_i64;
        // M15 ends two days behind the anchor
        let result = MtfView::new(
            vec![
                series(
                    Timeframe::M15,
                    200,
                    anchor - 2 * Timeframe::D1.duration_secs(),
                ),
                series(Timeframe::H1, 200, anchor - Timeframe::H1.duration_secs()),
                series(Timeframe::H4, 200, anchor - Timeframe::H4.duration_secs()),
                series(Timeframe::D1, 200, anchor - Timeframe::D1.duration_secs()),
            ],
            100,
        );
        assert!(matches!(result, Err(EngineError::InputInvalid(_))));
    }
}
