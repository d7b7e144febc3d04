//! Average True Range (ATR) indicator.

use super::{IndicatorError, Result, check_lengths};

/// Calculate Average True Range (ATR) with Wilder's smoothing.
///
/// True range is `max(H−L, |H−C₋₁|, |L−C₋₁|)`; the first ATR value is the
/// simple mean of the first `period` true ranges, then
/// `ATR = (prev × (period − 1) + TR) / period`.
///
/// # Example
///
/// ```
/// use signal_forge::indicators::atr;
///
/// let highs = vec![102.0; 20];
/// let lows = vec![98.0; 20];
/// let closes = vec![100.0; 20];
/// let result = atr(&highs, &lows, &closes, 14).unwrap();
/// assert_eq!(result.last().copied().flatten(), Some(4.0));
/// ```
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod(
            "Period must be greater than 0".to_string(),
        ));
    }
    check_lengths(highs, lows, closes)?;
    let len = highs.len();
    if len <= period {
        return Err(IndicatorError::InsufficientData {
            need: period + 1,
            got: len,
        });
    }

    let mut tr = Vec::with_capacity(len);
    tr.push(highs[0] - lows[0]);
    for i in 1..len {
        let hl = highs[i] - lows[i];
        let hc = (highs[i] - closes[i - 1]).abs();
        let lc = (lows[i] - closes[i - 1]).abs();
        tr.push(hl.max(hc).max(lc));
    }

    let mut result = vec![None; len];
    let mut current = tr[1..=period].iter().sum::<f64>() / period as f64;
    result[period] = Some(current);

    for i in (period + 1)..len {
        current = (current * (period as f64 - 1.0) + tr[i]) / period as f64;
        result[i] = Some(current);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atr_constant_range() {
        let highs = vec![110.0; 30];
        let lows = vec![90.0; 30];
        let closes = vec![100.0; 30];
        let result = atr(&highs, &lows, &closes, 14).unwrap();

        assert!(result[13].is_none());
        assert_eq!(result[14], Some(20.0));
        assert_eq!(result.last().copied().flatten(), Some(20.0));
    }

    #[test]
    fn test_atr_includes_gaps() {
        // A gap between close and next bar's range widens true range
        let highs = vec![101.0, 111.0, 112.0, 111.5, 112.0, 113.0];
        let lows = vec![99.0, 109.0, 110.0, 109.5, 110.0, 111.0];
        let closes = vec![100.0, 110.0, 111.0, 110.0, 111.0, 112.0];
        let result = atr(&highs, &lows, &closes, 3).unwrap();

        // TR[1] = max(2, |111-100|, |109-100|) = 11 (the gap dominates)
        let first = result[3].unwrap();
        assert!(first > 2.0, "gap should widen ATR, got {first}");
    }

    #[test]
    fn test_atr_mismatched_lengths() {
        assert!(atr(&[1.0; 20], &[1.0; 19], &[1.0; 20], 14).is_err());
    }

    #[test]
    fn test_atr_insufficient_data() {
        assert!(atr(&[1.0; 10], &[1.0; 10], &[1.0; 10], 14).is_err());
    }
}
