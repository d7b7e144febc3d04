//! Error types for backtesting operations.

use thiserror::Error;

/// Backtest-specific errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BacktestError {
    /// Invalid configuration parameter
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter {
        /// Parameter name
        param: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Insufficient data for backtest
    #[error("Insufficient data: need at least {need} candles, got {got}")]
    InsufficientData {
        /// Minimum required candles
        need: usize,
        /// Actual candles provided
        got: usize,
    },

    /// Input candles failed validation (ordering, duplicates)
    #[error("Invalid input series: {0}")]
    InvalidSeries(String),

    /// Position lifecycle violation
    #[error("Position error: {0}")]
    Position(String),

    /// Indicator calculation failed
    #[error("Indicator calculation failed: {0}")]
    Indicator(#[from] crate::indicators::IndicatorError),

    /// Failure while writing tearsheet artifacts
    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure in tearsheet output
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for backtest operations
pub type Result<T> = std::result::Result<T, BacktestError>;

impl BacktestError {
    /// Create an invalid parameter error
    pub fn invalid_param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Create an insufficient data error
    pub fn insufficient_data(need: usize, got: usize) -> Self {
        Self::InsufficientData { need, got }
    }

    /// Create a position lifecycle error
    pub fn position(msg: impl Into<String>) -> Self {
        Self::Position(msg.into())
    }
}
