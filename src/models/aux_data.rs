//! Auxiliary (non-price) market context.

use serde::{Deserialize, Serialize};

/// A news headline relevant to the traded asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Headline text
    pub title: String,
    /// Publishing source
    pub source: String,
    /// Publication time (Unix seconds), when the feed provides one
    pub published_at: Option<i64>,
    /// Whether the headline is flagged as high market impact
    pub high_impact: bool,
}

/// Optional cross-market context consumed by the criterion evaluator.
///
/// Every field may be absent; an absent field makes the corresponding
/// criterion pass with an "unavailable" note rather than fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryContext {
    /// Perpetual funding rate as a fraction (e.g. `0.0003` = 0.03%)
    pub funding_rate: Option<f64>,
    /// Open interest in USD
    pub open_interest_usd: Option<f64>,
    /// Bitcoin market-cap dominance, percent
    pub btc_dominance_pct: Option<f64>,
    /// ETH/BTC price ratio
    pub eth_btc_ratio: Option<f64>,
    /// Fear & Greed index, 0 (extreme fear) – 100 (extreme greed)
    pub fear_greed_score: Option<u8>,
    /// Recent headlines, newest first
    #[serde(default)]
    pub news: Vec<NewsItem>,
}

impl AuxiliaryContext {
    /// Whether any high-impact headline is present
    pub fn has_high_impact_news(&self) -> bool {
        self.news.iter().any(|n| n.high_impact)
    }
}
