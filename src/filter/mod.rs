//! The multi-criteria signal filter.
//!
//! A [`Filter`] is a criterion set plus an acceptance threshold: composition
//! instead of the inheritance ladder the strictness tiers suggest. Criteria
//! are evaluated in declared order and the decision preserves per-criterion
//! outcomes, so the same inputs always produce a bit-identical
//! [`FilterDecision`].

mod criteria;

pub use criteria::{Criterion, FilterInputs};

use serde::{Deserialize, Serialize};

use crate::config::SymbolProfile;
use crate::models::{AuxiliaryContext, Direction, FilterDecision};

/// Acceptance strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterTier {
    /// Every criterion must pass
    Ultra,
    /// All but three criteria must pass
    Elite,
    /// Explicit score threshold
    Custom(usize),
}

impl FilterTier {
    /// Threshold score for a criterion set of size `total`
    pub fn threshold(&self, total: usize) -> usize {
        match self {
            FilterTier::Ultra => total,
            FilterTier::Elite => total.saturating_sub(3),
            FilterTier::Custom(n) => (*n).min(total),
        }
    }
}

/// Tunable criterion parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Acceptance tier
    pub tier: FilterTier,
    /// Crypto symbols: append the three crypto criteria (`true`) or swap them
    /// in for the last three general criteria (`false`)
    pub extend_with_asset_criteria: bool,
    /// Stop distance in ATRs for the risk/reward criterion
    pub sl_atr_multiple: f64,
    /// Target distance in ATRs for the risk/reward criterion
    pub tp_atr_multiple: f64,
    /// Minimum reward/risk ratio
    pub min_risk_reward: f64,
    /// Minimum average ADX across H1/H4
    pub min_adx: f64,
    /// Minimum M15 volume ratio
    pub min_volume_ratio: f64,
    /// Funding rate beyond which the market counts as overleveraged
    pub extreme_funding_rate: f64,
    /// Fear/greed extreme: below this is contrarian-long territory, above
    /// `100 − value` contrarian-short
    pub extreme_sentiment: u8,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            tier: FilterTier::Elite,
            extend_with_asset_criteria: true,
            sl_atr_multiple: 1.5,
            tp_atr_multiple: 2.5,
            min_risk_reward: 2.0,
            min_adx: 20.0,
            min_volume_ratio: 0.8,
            extreme_funding_rate: 0.0003,
            extreme_sentiment: 25,
        }
    }
}

/// An ordered criterion list.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionSet {
    criteria: Vec<Criterion>,
}

impl CriterionSet {
    /// The twenty general criteria, in declared order.
    pub fn general() -> Self {
        Self {
            criteria: vec![
                Criterion::MtfAlignment,
                Criterion::PriceEma,
                Criterion::RsiMomentum,
                Criterion::MacdConfirmation,
                Criterion::Stochastic,
                Criterion::AdxStrength,
                Criterion::Volume,
                Criterion::BbPosition,
                Criterion::AtrVolatility,
                Criterion::EmaSpacing,
                Criterion::HtfConfirmation,
                Criterion::PriceAction,
                Criterion::MomentumAcceleration,
                Criterion::SrRespect,
                Criterion::NoDivergence,
                Criterion::SessionTiming,
                Criterion::BreakoutPotential,
                Criterion::RiskReward,
                Criterion::TrendConsistency,
                Criterion::MarketStructure,
            ],
        }
    }

    /// General set plus the three crypto criteria (23 total).
    pub fn crypto_extended() -> Self {
        let mut set = Self::general();
        set.criteria.extend([
            Criterion::FundingRate,
            Criterion::BtcDominance,
            Criterion::Sentiment,
        ]);
        set
    }

    /// General set with the last three general criteria replaced by the
    /// crypto criteria (20 total).
    pub fn crypto_substituted() -> Self {
        let mut set = Self::general();
        set.criteria.truncate(set.criteria.len() - 3);
        set.criteria.extend([
            Criterion::FundingRate,
            Criterion::BtcDominance,
            Criterion::Sentiment,
        ]);
        set
    }

    /// Pick the set for a symbol profile under the given config.
    pub fn for_profile(profile: &SymbolProfile, config: &FilterConfig) -> Self {
        if profile.is_crypto {
            if config.extend_with_asset_criteria {
                Self::crypto_extended()
            } else {
                Self::crypto_substituted()
            }
        } else {
            Self::general()
        }
    }

    /// Number of criteria in the set
    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// The criteria in evaluation order
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }
}

/// The configured filter: criterion set + threshold + symbol profile.
pub struct Filter {
    config: FilterConfig,
    profile: SymbolProfile,
    set: CriterionSet,
}

impl Filter {
    /// Build a filter for a symbol profile.
    pub fn new(config: FilterConfig, profile: SymbolProfile) -> Self {
        let set = CriterionSet::for_profile(&profile, &config);
        Self {
            config,
            profile,
            set,
        }
    }

    /// Override the criterion set (tests fix the criterion count this way).
    pub fn with_set(mut self, set: CriterionSet) -> Self {
        self.set = set;
        self
    }

    /// The active criterion set.
    pub fn set(&self) -> &CriterionSet {
        &self.set
    }

    /// Evaluate every criterion in order and aggregate the decision.
    ///
    /// `utc_hour` is the wall-clock hour under test (injected, never read
    /// from a global clock).
    pub fn evaluate(
        &self,
        inputs: &FilterInputs,
        aux: &AuxiliaryContext,
        direction: Direction,
        utc_hour: u32,
    ) -> FilterDecision {
        let results: Vec<_> = self
            .set
            .criteria
            .iter()
            .map(|c| c.evaluate(inputs, aux, direction, &self.config, &self.profile, utc_hour))
            .collect();

        let score = results.iter().filter(|r| r.passed).count();
        let total = results.len();
        let threshold = self.config.tier.threshold(total);
        let accepted = score >= threshold;

        let overall_message = if accepted && score == total {
            format!("[A+] all {total} criteria met")
        } else if accepted {
            format!("[A+] {score}/{total} criteria passed (threshold {threshold})")
        } else {
            format!("[NO TRADE] {score}/{total} criteria passed (need {threshold})")
        };

        FilterDecision {
            accepted,
            criteria: results,
            score,
            total,
            overall_message,
        }
    }
}
