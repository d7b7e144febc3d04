//! Core data records shared across the signal pipeline and backtester.

mod aux_data;
mod candle;
mod mtf;
mod signal;
mod snapshot;

pub use aux_data::{AuxiliaryContext, NewsItem};
pub use candle::{Candle, Series};
pub use mtf::{MtfView, Timeframe};
pub use signal::{CriterionResult, Direction, FilterDecision, Signal};
pub use snapshot::IndicatorSnapshot;
