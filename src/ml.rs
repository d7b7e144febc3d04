//! ML validation layer.
//!
//! The predictor is an oracle: `features → (probability, rationale)`. The
//! engine derives features deterministically, asks the oracle, and approves
//! the signal when the probability clears the threshold. A predictor failure
//! never blocks a signal; the signal is approved and tagged
//! `ml_unavailable`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SymbolProfile;
use crate::error::{EngineError, Result};
use crate::models::{AuxiliaryContext, Direction, MtfView, Signal, Timeframe};

/// Deterministic feature vector derived from a signal and its market context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalFeatures {
    /// Criteria score as a fraction of total (0–1)
    pub criteria_score: f64,
    /// H1 RSI, 0–100
    pub rsi: f64,
    /// Trend strength: fraction of timeframes aligned with the direction
    pub trend_strength: f64,
    /// M15 volume ratio
    pub volume_profile: f64,
    /// London session flag (08–16 UTC)
    pub london_session: bool,
    /// New York session flag (13–21 UTC)
    pub ny_session: bool,
    /// Tokyo session flag (23–08 UTC)
    pub tokyo_session: bool,
    /// H1 ATR as a fraction of price
    pub volatility: f64,
    /// Estimated half-spread as a fraction of price
    pub spread: f64,
    /// MTF alignment score (aligned timeframes / 4)
    pub mtf_alignment: f64,
    /// Whether any high-impact headline is present
    pub high_impact_news: bool,
    /// Historical win rate for the pair
    pub pair_win_rate: f64,
}

impl SignalFeatures {
    /// Extract features from the signal and its inputs. Pure: the wall-clock
    /// hour is injected.
    pub fn extract(
        signal: &Signal,
        view: &MtfView,
        aux: &AuxiliaryContext,
        profile: &SymbolProfile,
        utc_hour: u32,
    ) -> Result<Self> {
        let inputs = crate::filter::FilterInputs::prepare(view)?;

        let decision = &signal.diagnostics;
        let criteria_score = if decision.total > 0 {
            decision.score as f64 / decision.total as f64
        } else {
            0.0
        };

        let aligned = Timeframe::ALL
            .iter()
            .filter(|&&tf| {
                let snap = match tf {
                    Timeframe::M15 => &inputs.m15,
                    Timeframe::H1 => &inputs.h1,
                    Timeframe::H4 => &inputs.h4,
                    Timeframe::D1 => &inputs.d1,
                };
                match (snap.ema_21, snap.ema_50) {
                    (Some(fast), Some(slow)) => match signal.direction {
                        Direction::Buy => fast > slow,
                        Direction::Sell => fast < slow,
                        Direction::Hold => false,
                    },
                    _ => false,
                }
            })
            .count();
        let mtf_alignment = aligned as f64 / 4.0;

        let price = view.current_price();
        let volatility = inputs
            .h1
            .atr_14
            .map(|atr| if price > 0.0 { atr / price } else { 0.0 })
            .unwrap_or(0.0);

        Ok(Self {
            criteria_score,
            rsi: inputs.h1.rsi_14.unwrap_or(50.0),
            trend_strength: mtf_alignment,
            volume_profile: inputs.m15.volume_ratio_20.unwrap_or(1.0),
            london_session: (8..16).contains(&utc_hour),
            ny_session: (13..21).contains(&utc_hour),
            tokyo_session: utc_hour >= 23 || utc_hour < 8,
            volatility,
            // Half the typical crypto taker spread; refined when the order
            // book is available
            spread: 0.0001,
            mtf_alignment,
            high_impact_news: aux.has_high_impact_news(),
            pair_win_rate: profile.pair_win_rate,
        })
    }
}

/// Prediction returned by an oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Success probability, 0–1
    pub probability: f64,
    /// Free-text rationale
    pub rationale: String,
}

/// A `features → probability` oracle.
pub trait Predictor: Send + Sync {
    /// Predict the success probability for a candidate signal.
    fn predict(&self, features: &SignalFeatures) -> Result<Prediction>;
}

/// Outcome of validating one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct MlVerdict {
    /// Whether the signal should proceed
    pub approved: bool,
    /// Oracle probability (0.5 when the oracle was unavailable)
    pub probability: f64,
    /// Whether the oracle failed and the approval is a default
    pub oracle_unavailable: bool,
    /// Rationale string for diagnostics
    pub rationale: String,
}

/// Validate a signal against a predictor with approve-on-failure semantics.
pub fn validate<P: Predictor>(
    predictor: &P,
    features: &SignalFeatures,
    threshold: f64,
) -> MlVerdict {
    match predictor.predict(features) {
        Ok(prediction) => {
            let approved = prediction.probability >= threshold;
            MlVerdict {
                approved,
                probability: prediction.probability,
                oracle_unavailable: false,
                rationale: prediction.rationale,
            }
        }
        Err(e) => {
            debug!(error = %e, "predictor unavailable, approving by default");
            MlVerdict {
                approved: true,
                probability: 0.5,
                oracle_unavailable: true,
                rationale: "predictor unavailable, proceeding on filter criteria".to_string(),
            }
        }
    }
}

/// Annotate a signal with the verdict tags.
pub fn tag_signal(signal: &mut Signal, verdict: &MlVerdict) {
    signal.tags.insert(
        "ml_probability".to_string(),
        format!("{:.2}", verdict.probability),
    );
    if verdict.oracle_unavailable {
        signal
            .tags
            .insert("ml_unavailable".to_string(), "true".to_string());
    }
}

/// Deterministic logistic blend over the feature vector.
///
/// Stands in for the neural predictor when none is wired up: the weights
/// mirror the rule-based quality scoring the filter criteria already encode,
/// so a strong setup in an active session scores above the approval bar and a
/// weak one does not.
#[derive(Debug, Clone, Default)]
pub struct HeuristicPredictor;

impl Predictor for HeuristicPredictor {
    fn predict(&self, features: &SignalFeatures) -> Result<Prediction> {
        let mut score = 0.0_f64;

        score += (features.criteria_score - 0.5) * 4.0;
        score += (features.trend_strength - 0.5) * 1.5;
        score += (features.pair_win_rate - 0.5) * 3.0;
        score += ((features.rsi - 50.0).abs() / 50.0 - 0.5) * -0.5;
        score += (features.volume_profile - 1.0).clamp(-0.5, 0.5);
        if features.london_session || features.ny_session {
            score += 0.3;
        }
        if features.high_impact_news {
            score -= 0.8;
        }
        // Extreme volatility cuts both ways; penalize beyond 5% ATR/price
        if features.volatility > 0.05 {
            score -= 0.5;
        }

        let probability = 1.0 / (1.0 + (-score).exp());
        Ok(Prediction {
            probability,
            rationale: format!(
                "criteria {:.0}%, {}/4 timeframes aligned, volume ratio {:.2}",
                features.criteria_score * 100.0,
                (features.trend_strength * 4.0).round() as u32,
                features.volume_profile,
            ),
        })
    }
}

/// Predictor that always fails; exercises the approve-by-default path.
#[derive(Debug, Clone, Default)]
pub struct UnavailablePredictor;

impl Predictor for UnavailablePredictor {
    fn predict(&self, _features: &SignalFeatures) -> Result<Prediction> {
        Err(EngineError::PredictorUnavailable(
            "no model loaded".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong_features() -> SignalFeatures {
        SignalFeatures {
            criteria_score: 0.95,
            rsi: 58.0,
            trend_strength: 1.0,
            volume_profile: 1.3,
            london_session: false,
            ny_session: true,
            tokyo_session: false,
            volatility: 0.015,
            spread: 0.0001,
            mtf_alignment: 1.0,
            high_impact_news: false,
            pair_win_rate: 0.58,
        }
    }

    fn weak_features() -> SignalFeatures {
        SignalFeatures {
            criteria_score: 0.4,
            rsi: 85.0,
            trend_strength: 0.25,
            volume_profile: 0.5,
            london_session: false,
            ny_session: false,
            tokyo_session: true,
            volatility: 0.08,
            spread: 0.0004,
            mtf_alignment: 0.25,
            high_impact_news: true,
            pair_win_rate: 0.45,
        }
    }

    #[test]
    fn test_heuristic_separates_strong_from_weak() {
        let predictor = HeuristicPredictor;
        let strong = predictor.predict(&strong_features()).unwrap();
        let weak = predictor.predict(&weak_features()).unwrap();

        assert!(strong.probability >= 0.60, "strong setup scored {}", strong.probability);
        assert!(weak.probability < 0.60, "weak setup scored {}", weak.probability);
        assert!(strong.probability > weak.probability);
    }

    #[test]
    fn test_validate_threshold() {
        let verdict = validate(&HeuristicPredictor, &strong_features(), 0.60);
        assert!(verdict.approved);
        assert!(!verdict.oracle_unavailable);

        let verdict = validate(&HeuristicPredictor, &weak_features(), 0.60);
        assert!(!verdict.approved);
    }

    #[test]
    fn test_unavailable_predictor_approves_by_default() {
        let verdict = validate(&UnavailablePredictor, &weak_features(), 0.60);
        assert!(verdict.approved);
        assert!(verdict.oracle_unavailable);
        assert_eq!(verdict.probability, 0.5);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let predictor = HeuristicPredictor;
        let a = predictor.predict(&strong_features()).unwrap();
        let b = predictor.predict(&strong_features()).unwrap();
        assert_eq!(a, b);
    }
}
