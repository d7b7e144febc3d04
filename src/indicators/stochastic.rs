//! Stochastic Oscillator indicator.

use super::{IndicatorError, Result, check_lengths, sma::sma};

/// Stochastic oscillator output series.
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticResult {
    /// %K: 100 × (C − Lowₙ) / (Highₙ − Lowₙ)
    pub k: Vec<Option<f64>>,
    /// %D: SMA(d_period) of %K
    pub d: Vec<Option<f64>>,
}

/// Calculate the Stochastic Oscillator.
///
/// A bar whose `k_period` range is zero (Highₙ == Lowₙ) yields `None` for %K;
/// downstream criteria treat that as indeterminate and fail safe.
///
/// # Example
///
/// ```
/// use signal_forge::indicators::stochastic;
///
/// let highs: Vec<f64> = (0..30).map(|i| 101.0 + i as f64).collect();
/// let lows: Vec<f64> = (0..30).map(|i| 99.0 + i as f64).collect();
/// let closes: Vec<f64> = (0..30).map(|i| 100.5 + i as f64).collect();
/// let stoch = stochastic(&highs, &lows, &closes, 14, 3).unwrap();
/// assert!(stoch.k.last().unwrap().unwrap() > 50.0);
/// ```
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> Result<StochasticResult> {
    if k_period == 0 || d_period == 0 {
        return Err(IndicatorError::InvalidPeriod(
            "Periods must be greater than 0".to_string(),
        ));
    }
    check_lengths(highs, lows, closes)?;
    let len = closes.len();
    if len < k_period + d_period {
        return Err(IndicatorError::InsufficientData {
            need: k_period + d_period,
            got: len,
        });
    }

    let mut k = vec![None; len];
    for i in (k_period - 1)..len {
        let window = i + 1 - k_period..=i;
        let highest = highs[window.clone()].iter().cloned().fold(f64::MIN, f64::max);
        let lowest = lows[window].iter().cloned().fold(f64::MAX, f64::min);
        let range = highest - lowest;
        if range > 0.0 {
            k[i] = Some(100.0 * (closes[i] - lowest) / range);
        }
    }

    // %D smooths the defined portion of %K
    let first_defined = k.iter().position(Option::is_some).unwrap_or(len);
    let defined: Vec<f64> = k[first_defined..].iter().map(|v| v.unwrap_or(50.0)).collect();
    let d_tail = sma(&defined, d_period);

    let mut d = vec![None; len];
    for (i, v) in d_tail.into_iter().enumerate() {
        d[first_defined + i] = v;
    }

    Ok(StochasticResult { k, d })
}
