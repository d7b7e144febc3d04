//! Technical analysis indicators for OHLCV series.
//!
//! All indicators are pure functions over price/volume slices. Results are
//! aligned with the input: index `i` of the output corresponds to bar `i`,
//! and bars without enough history hold `None`. Nothing here touches global
//! state, so independent series can be processed in any order (or on any
//! thread) with identical results.
//!
//! # Example
//!
//! ```
//! use signal_forge::indicators::{ema, rsi, last_value};
//!
//! let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
//! let ema_21 = ema(&closes, 21);
//! let rsi_14 = rsi(&closes, 14).unwrap();
//!
//! assert!(last_value(&ema_21).is_some());
//! assert!(last_value(&rsi_14).unwrap() > 90.0); // monotonic up-trend
//! ```

mod adx;
mod atr;
mod bollinger;
mod ema;
mod macd;
mod rsi;
mod sma;
mod stochastic;
mod volume;

pub use adx::adx;
pub use atr::atr;
pub use bollinger::{BollingerBands, bollinger_bands};
pub use ema::ema;
pub use macd::{MacdResult, macd};
pub use rsi::rsi;
pub use sma::sma;
pub use stochastic::{StochasticResult, stochastic};
pub use volume::volume_ratio;

/// Error type for indicator calculations
#[derive(Debug, thiserror::Error)]
pub enum IndicatorError {
    /// Not enough data points to calculate the indicator
    #[error("Insufficient data: need at least {need} data points, got {got}")]
    InsufficientData {
        /// Minimum number of data points required
        need: usize,
        /// Actual number of data points provided
        got: usize,
    },

    /// Invalid period parameter provided
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Input slices have mismatched lengths
    #[error("Mismatched input lengths: {0}")]
    MismatchedLengths(String),
}

/// Result type for indicator calculations
pub type Result<T> = std::result::Result<T, IndicatorError>;

pub(crate) fn check_lengths(highs: &[f64], lows: &[f64], closes: &[f64]) -> Result<()> {
    if highs.len() != lows.len() || lows.len() != closes.len() {
        return Err(IndicatorError::MismatchedLengths(format!(
            "highs={}, lows={}, closes={}",
            highs.len(),
            lows.len(),
            closes.len()
        )));
    }
    Ok(())
}

/// Extract the last non-`None` value from an indicator series.
///
/// # Example
///
/// ```
/// use signal_forge::indicators::last_value;
///
/// let values = vec![None, None, Some(10.0), Some(20.0)];
/// assert_eq!(last_value(&values), Some(20.0));
/// ```
pub fn last_value(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().find_map(|&v| v)
}

/// Value at a given index, flattened.
pub fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).and_then(|&v| v)
}
