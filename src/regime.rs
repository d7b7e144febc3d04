//! Cross-asset correlation analysis and market regime classification.
//!
//! Classifies the correlation structure around a candidate asset into a
//! regime and maps the regime to position/confidence multipliers that get
//! annotated into signal tags. Pure function over supplied price series; the
//! caller decides where the series come from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::Direction;

/// Market regime derived from cross-asset correlations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Positive correlations across risk assets; candidate moves with them
    RiskOn,
    /// Correlations breaking down; candidate decoupling
    RiskOff,
    /// Candidate tracking gold; defensive flows
    SafeHaven,
    /// Nothing distinctive
    Neutral,
    /// Not enough data to classify
    Unknown,
}

impl Regime {
    /// Stable tag value
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::RiskOn => "RISK_ON",
            Regime::RiskOff => "RISK_OFF",
            Regime::SafeHaven => "SAFE_HAVEN",
            Regime::Neutral => "NEUTRAL",
            Regime::Unknown => "UNKNOWN",
        }
    }
}

/// Per-regime adjustment parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeParams {
    /// Scales signal confidence, clipped to [0.8, 1.2]
    pub confidence_multiplier: f64,
    /// Scales position size, clipped to [0.5, 2.0]
    pub size_multiplier: f64,
    /// Scales stop distance, clipped to [0.8, 2.0]
    pub stop_distance_multiplier: f64,
    /// Blend weights (technical, sentiment, ml) for multi-model scoring
    pub signal_weights: [f64; 3],
}

impl RegimeParams {
    fn for_regime(regime: Regime) -> Self {
        let (confidence, size, stop, weights): (f64, f64, f64, [f64; 3]) = match regime {
            Regime::RiskOn => (1.2, 1.2, 1.0, [0.5, 0.2, 0.3]),
            Regime::RiskOff => (0.8, 0.8, 1.5, [0.6, 0.1, 0.3]),
            Regime::SafeHaven => (1.0, 1.0, 1.2, [0.4, 0.3, 0.3]),
            Regime::Neutral | Regime::Unknown => (1.0, 1.0, 1.0, [0.5, 0.25, 0.25]),
        };
        Self {
            confidence_multiplier: confidence.clamp(0.8, 1.2),
            size_multiplier: size.clamp(0.5, 2.0),
            stop_distance_multiplier: stop.clamp(0.8, 2.0),
            signal_weights: weights,
        }
    }
}

/// Result of a regime assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAssessment {
    /// Classified regime
    pub regime: Regime,
    /// Mean correlation of the candidate against the risk basket
    pub risk_correlation: f64,
    /// Correlation of the candidate against gold
    pub gold_correlation: f64,
    /// Mean absolute pairwise correlation across the whole set
    pub correlation_strength: f64,
    /// Adjustment parameters for this regime
    pub params: RegimeParams,
}

impl RegimeAssessment {
    /// Fallback when classification is impossible.
    pub fn unknown() -> Self {
        Self {
            regime: Regime::Unknown,
            risk_correlation: 0.0,
            gold_correlation: 0.0,
            correlation_strength: 0.5,
            params: RegimeParams::for_regime(Regime::Unknown),
        }
    }
}

/// Correlation-based regime classifier.
#[derive(Debug, Clone)]
pub struct RegimeAnalyzer {
    /// Rolling window length, in bars
    pub window: usize,
    /// Symbols forming the risk basket
    pub risk_basket: Vec<String>,
    /// Symbol representing gold
    pub gold_symbol: String,
    /// Risk-on threshold on mean risk correlation
    pub risk_on_threshold: f64,
    /// Risk-off threshold on mean risk correlation
    pub risk_off_threshold: f64,
    /// Safe-haven threshold on gold correlation
    pub safe_haven_threshold: f64,
}

impl Default for RegimeAnalyzer {
    fn default() -> Self {
        Self {
            window: 100,
            risk_basket: vec![
                "EURUSD".to_string(),
                "GBPUSD".to_string(),
                "XAUUSD".to_string(),
                "XAGUSD".to_string(),
            ],
            gold_symbol: "XAUUSD".to_string(),
            risk_on_threshold: 0.6,
            risk_off_threshold: -0.4,
            safe_haven_threshold: 0.7,
        }
    }
}

impl RegimeAnalyzer {
    /// Classify the regime around `candidate` from close-price series.
    ///
    /// `prices` maps symbol to closes, oldest first; only the last `window`
    /// bars of each series are considered. Returns
    /// [`RegimeAssessment::unknown`] when the candidate or every basket
    /// member is missing or too short.
    pub fn classify(&self, candidate: &str, prices: &HashMap<String, Vec<f64>>) -> RegimeAssessment {
        let candidate_prices = match prices.get(candidate) {
            Some(p) if p.len() >= 30 => self.window_of(p),
            _ => return RegimeAssessment::unknown(),
        };

        let mut risk_correlations = Vec::new();
        for symbol in &self.risk_basket {
            if symbol == candidate {
                continue;
            }
            if let Some(other) = prices.get(symbol).filter(|p| p.len() >= 30) {
                if let Some(corr) = pearson(&candidate_prices, &self.window_of(other)) {
                    risk_correlations.push(corr);
                }
            }
        }

        if risk_correlations.is_empty() {
            return RegimeAssessment::unknown();
        }

        let risk_correlation =
            risk_correlations.iter().sum::<f64>() / risk_correlations.len() as f64;

        let gold_correlation = prices
            .get(&self.gold_symbol)
            .filter(|p| p.len() >= 30)
            .and_then(|g| pearson(&candidate_prices, &self.window_of(g)))
            .unwrap_or(0.0);

        let regime = if risk_correlation > self.risk_on_threshold {
            Regime::RiskOn
        } else if risk_correlation < self.risk_off_threshold {
            Regime::RiskOff
        } else if gold_correlation > self.safe_haven_threshold {
            Regime::SafeHaven
        } else {
            Regime::Neutral
        };

        let correlation_strength = {
            let mut all = risk_correlations.clone();
            all.push(gold_correlation);
            all.iter().map(|c| c.abs()).sum::<f64>() / all.len() as f64
        };

        RegimeAssessment {
            regime,
            risk_correlation,
            gold_correlation,
            correlation_strength,
            params: RegimeParams::for_regime(regime),
        }
    }

    /// Apply an assessment to a signal: scale confidence and annotate tags.
    pub fn apply(&self, signal: &mut crate::models::Signal, assessment: &RegimeAssessment) {
        if !signal.direction.is_hold() {
            signal.confidence_pct =
                (signal.confidence_pct * assessment.params.confidence_multiplier).min(100.0);
        }
        signal
            .tags
            .insert("regime".to_string(), assessment.regime.as_str().to_string());
        signal.tags.insert(
            "size_multiplier".to_string(),
            format!("{:.2}", assessment.params.size_multiplier),
        );
        signal.tags.insert(
            "confidence_multiplier".to_string(),
            format!("{:.2}", assessment.params.confidence_multiplier),
        );
        signal.tags.insert(
            "stop_multiplier".to_string(),
            format!("{:.2}", assessment.params.stop_distance_multiplier),
        );
    }

    fn window_of(&self, prices: &[f64]) -> Vec<f64> {
        let start = prices.len().saturating_sub(self.window);
        prices[start..].to_vec()
    }
}

/// Pearson correlation over the overlapping tail of two series.
///
/// Returns `None` when either side is constant (zero variance) or the
/// overlap is shorter than 3 points.
fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 3 {
        return None;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Size multiplier helper mirroring the assessment params, with the same
/// clipping, for callers that only need sizing.
pub fn adjusted_position_size(regime: Regime, base_size: f64) -> f64 {
    (base_size * RegimeParams::for_regime(regime).size_multiplier).clamp(base_size * 0.5, base_size * 2.0)
}

/// Direction-aware confidence blend used when mixing sub-model scores.
pub fn blend_scores(weights: [f64; 3], technical: f64, sentiment: f64, ml: f64) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return technical;
    }
    (weights[0] * technical + weights[1] * sentiment + weights[2] * ml) / total
}

/// Convenience: `true` when the regime historically favours the direction.
pub fn regime_favours(regime: Regime, direction: Direction) -> bool {
    match regime {
        Regime::RiskOn => direction.is_buy(),
        Regime::RiskOff => direction.is_sell(),
        _ => true,
    }
}
