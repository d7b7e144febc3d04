//! Data providers: market candles, auxiliary cross-market context, and the
//! multi-timeframe loader.
//!
//! Providers are the only place the crate performs network I/O. Each external
//! fetch carries its own timeout; auxiliary sub-fetches fail soft (the field
//! becomes absent), while market-data failures surface as errors because
//! price data is required.

mod aux_feed;
mod cache;
mod market;
mod mtf_loader;

pub use aux_feed::{AuxData, AuxDataClient};
pub use cache::{CacheStats, CandleCache};
pub use market::{KlineClient, MarketData};
pub use mtf_loader::MtfLoader;
