//! Trading signals and filter decisions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Trade direction for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Enter or add to a long position
    Buy,
    /// Enter or add to a short position
    Sell,
    /// No action
    Hold,
}

impl Direction {
    /// `true` for `Buy`
    pub fn is_buy(&self) -> bool {
        matches!(self, Direction::Buy)
    }

    /// `true` for `Sell`
    pub fn is_sell(&self) -> bool {
        matches!(self, Direction::Sell)
    }

    /// `true` for `Hold`
    pub fn is_hold(&self) -> bool {
        matches!(self, Direction::Hold)
    }

    /// +1 for buy, -1 for sell, 0 for hold
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
            Direction::Hold => 0.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Hold => write!(f, "HOLD"),
        }
    }
}

/// Outcome of one filter criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionResult {
    /// Criterion name, stable across runs
    pub name: String,
    /// Whether the criterion passed
    pub passed: bool,
    /// Human-readable explanation
    pub message: String,
}

impl CriterionResult {
    /// A passing result
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
        }
    }

    /// A failing result
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }

    /// Pass because the required input is unavailable (fail-safe)
    pub fn unavailable(name: impl Into<String>, what: &str) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: format!("{what} unavailable (assuming OK)"),
        }
    }
}

/// Aggregated decision of the ultra filter.
///
/// `criteria` preserves evaluation order; same inputs always produce a
/// bit-identical decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDecision {
    /// Whether the candidate cleared the threshold
    pub accepted: bool,
    /// Per-criterion outcomes in declared order
    pub criteria: Vec<CriterionResult>,
    /// Number of criteria that passed
    pub score: usize,
    /// Number of criteria evaluated
    pub total: usize,
    /// Summary line in the `[N/M criteria passed]` style
    pub overall_message: String,
}

impl FilterDecision {
    /// Look up one criterion's outcome by name
    pub fn criterion(&self, name: &str) -> Option<&CriterionResult> {
        self.criteria.iter().find(|c| c.name == name)
    }
}

/// A structured trading signal.
///
/// `Buy`/`Sell` signals always carry a finite stop-loss and first take-profit;
/// `Hold` signals never carry exit levels. Use [`Signal::entry`] / [`Signal::hold`]
/// to construct; they enforce those invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Instrument symbol
    pub symbol: String,
    /// Trade direction
    pub direction: Direction,
    /// Suggested entry price (None for HOLD)
    pub entry_price: Option<f64>,
    /// Stop-loss level (None for HOLD)
    pub stop_loss: Option<f64>,
    /// First take-profit level (None for HOLD)
    pub take_profit_1: Option<f64>,
    /// Second take-profit level
    pub take_profit_2: Option<f64>,
    /// Optional third take-profit level (elite execution plans)
    pub take_profit_3: Option<f64>,
    /// Confidence, percent 0–100
    pub confidence_pct: f64,
    /// Generation time (Unix seconds)
    pub generated_at: i64,
    /// Full filter diagnostics behind this signal
    pub diagnostics: FilterDecision,
    /// Free-form annotations (regime, multipliers, ml status, …); BTreeMap
    /// keeps serialized output deterministic
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Signal {
    /// Build an entry signal, validating exit levels.
    ///
    /// Requires finite `entry_price`, `stop_loss`, `take_profit_1` on the
    /// correct side of entry for the direction.
    #[allow(clippy::too_many_arguments)]
    pub fn entry(
        symbol: impl Into<String>,
        direction: Direction,
        entry_price: f64,
        stop_loss: f64,
        take_profit_1: f64,
        take_profit_2: f64,
        take_profit_3: Option<f64>,
        confidence_pct: f64,
        generated_at: i64,
        diagnostics: FilterDecision,
    ) -> Result<Self> {
        if direction.is_hold() {
            return Err(EngineError::input("entry signal cannot be HOLD"));
        }
        for (label, v) in [
            ("entry_price", entry_price),
            ("stop_loss", stop_loss),
            ("take_profit_1", take_profit_1),
            ("take_profit_2", take_profit_2),
        ] {
            if !v.is_finite() {
                return Err(EngineError::input(format!("{label} must be finite")));
            }
        }
        let ok_sides = match direction {
            Direction::Buy => stop_loss < entry_price && take_profit_1 > entry_price,
            Direction::Sell => stop_loss > entry_price && take_profit_1 < entry_price,
            Direction::Hold => false,
        };
        if !ok_sides {
            return Err(EngineError::input(format!(
                "exit levels on wrong side of entry for {direction}: \
                 entry={entry_price}, sl={stop_loss}, tp1={take_profit_1}"
            )));
        }

        Ok(Self {
            symbol: symbol.into(),
            direction,
            entry_price: Some(entry_price),
            stop_loss: Some(stop_loss),
            take_profit_1: Some(take_profit_1),
            take_profit_2: Some(take_profit_2),
            take_profit_3,
            confidence_pct,
            generated_at,
            diagnostics,
            tags: BTreeMap::new(),
        })
    }

    /// Build a HOLD signal carrying the rejection diagnostics.
    pub fn hold(symbol: impl Into<String>, generated_at: i64, diagnostics: FilterDecision) -> Self {
        Self {
            symbol: symbol.into(),
            direction: Direction::Hold,
            entry_price: None,
            stop_loss: None,
            take_profit_1: None,
            take_profit_2: None,
            take_profit_3: None,
            confidence_pct: 0.0,
            generated_at,
            diagnostics,
            tags: BTreeMap::new(),
        }
    }

    /// Risk unit `R = |entry − stop_loss|` (None for HOLD)
    pub fn risk_unit(&self) -> Option<f64> {
        match (self.entry_price, self.stop_loss) {
            (Some(e), Some(sl)) => Some((e - sl).abs()),
            _ => None,
        }
    }

    /// Attach a tag (fluent)
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision() -> FilterDecision {
        FilterDecision {
            accepted: true,
            criteria: vec![CriterionResult::pass("mtf_alignment", "aligned")],
            score: 1,
            total: 1,
            overall_message: "[1/1 criteria passed]".to_string(),
        }
    }

    #[test]
    fn test_entry_signal_validates_sides() {
        // Correct BUY: SL below, TP above
        let ok = Signal::entry(
            "BTCUSDT",
            Direction::Buy,
            100.0,
            95.0,
            110.0,
            120.0,
            None,
            85.0,
            1_700_000_000,
            decision(),
        );
        assert!(ok.is_ok());

        // SL on the wrong side
        let bad = Signal::entry(
            "BTCUSDT",
            Direction::Buy,
            100.0,
            105.0,
            110.0,
            120.0,
            None,
            85.0,
            1_700_000_000,
            decision(),
        );
        assert!(bad.is_err());

        // SELL mirror
        let ok_sell = Signal::entry(
            "BTCUSDT",
            Direction::Sell,
            100.0,
            105.0,
            90.0,
            80.0,
            None,
            85.0,
            1_700_000_000,
            decision(),
        );
        assert!(ok_sell.is_ok());
    }

    #[test]
    fn test_entry_signal_rejects_non_finite() {
        let bad = Signal::entry(
            "BTCUSDT",
            Direction::Buy,
            100.0,
            f64::NAN,
            110.0,
            120.0,
            None,
            85.0,
            1_700_000_000,
            decision(),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_hold_signal_carries_no_levels() {
        let hold = Signal::hold("BTCUSDT", 1_700_000_000, decision());
        assert!(hold.direction.is_hold());
        assert!(hold.entry_price.is_none());
        assert!(hold.stop_loss.is_none());
        assert!(hold.take_profit_1.is_none());
        assert!(hold.risk_unit().is_none());
    }

    #[test]
    fn test_risk_unit() {
        let signal = Signal::entry(
            "BTCUSDT",
            Direction::Buy,
            100.0,
            95.0,
            110.0,
            120.0,
            None,
            85.0,
            1_700_000_000,
            decision(),
        )
        .unwrap();
        assert_eq!(signal.risk_unit(), Some(5.0));
    }

    #[test]
    fn test_signal_serde_roundtrip() {
        let signal = Signal::entry(
            "BTCUSDT",
            Direction::Sell,
            100.0,
            104.5,
            91.0,
            87.0,
            Some(84.25),
            92.0,
            1_700_000_000,
            decision(),
        )
        .unwrap()
        .with_tag("regime", "RISK_OFF");

        let json = serde_json::to_string(&signal).unwrap();
        let back: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(signal, back);
    }
}
