//! Relative Strength Index (RSI) indicator.

use super::{IndicatorError, Result};

/// Calculate Relative Strength Index (RSI) with Wilder's smoothing.
///
/// RSI measures the magnitude of recent price changes to evaluate overbought
/// or oversold conditions. Values range from 0 to 100.
///
/// # Formula
///
/// 1. Split per-bar changes into gains and losses
/// 2. Seed average gain/loss with the simple mean of the first `period` changes
/// 3. Wilder smoothing: `avg = (prev_avg × (period − 1) + current) / period`
/// 4. RS = avg gain / avg loss; RSI = 100 − 100 / (1 + RS)
///
/// A zero average loss yields RSI = 100.
///
/// # Example
///
/// ```
/// use signal_forge::indicators::rsi;
///
/// let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
/// let result = rsi(&prices, 14).unwrap();
///
/// assert!(result[13].is_none());
/// assert_eq!(result[14], Some(100.0)); // all gains
/// ```
pub fn rsi(data: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod(
            "Period must be greater than 0".to_string(),
        ));
    }
    if data.len() <= period {
        return Err(IndicatorError::InsufficientData {
            need: period + 1,
            got: data.len(),
        });
    }

    let mut result = vec![None; data.len()];

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for pair in data.windows(2) {
        let change = pair[1] - pair[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;
    result[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period as f64 - 1.0) + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + losses[i]) / period as f64;
        result[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    Ok(result)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
