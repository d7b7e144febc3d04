//! Average Directional Index (ADX) indicator.

use super::{IndicatorError, Result, check_lengths};

/// Calculate Average Directional Index (ADX).
///
/// Measures trend strength (not direction); values range 0–100. Directional
/// movement and true range are Wilder-smoothed, DX is derived from +DI/−DI,
/// and ADX is a Wilder smooth of DX. The first value lands at index
/// `2 × period − 1`.
///
/// # Example
///
/// ```
/// use signal_forge::indicators::adx;
///
/// let highs: Vec<f64> = (0..40).map(|i| 102.0 + i as f64).collect();
/// let lows: Vec<f64> = (0..40).map(|i| 98.0 + i as f64).collect();
/// let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
/// let result = adx(&highs, &lows, &closes, 14).unwrap();
/// assert!(result.last().unwrap().unwrap() > 25.0); // strong trend
/// ```
pub fn adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod(
            "Period must be greater than 0".to_string(),
        ));
    }
    check_lengths(highs, lows, closes)?;
    let len = highs.len();
    if len < 2 * period {
        return Err(IndicatorError::InsufficientData {
            need: 2 * period,
            got: len,
        });
    }

    let mut tr = vec![0.0; len];
    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];

    for i in 1..len {
        let hl = highs[i] - lows[i];
        let hc = (highs[i] - closes[i - 1]).abs();
        let lc = (lows[i] - closes[i - 1]).abs();
        tr[i] = hl.max(hc).max(lc);

        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let mut dx = vec![0.0; len];
    let mut smoothed_tr = tr[1..=period].iter().sum::<f64>() / period as f64;
    let mut smoothed_plus = plus_dm[1..=period].iter().sum::<f64>() / period as f64;
    let mut smoothed_minus = minus_dm[1..=period].iter().sum::<f64>() / period as f64;
    dx[period] = dx_value(smoothed_tr, smoothed_plus, smoothed_minus);

    for i in (period + 1)..len {
        smoothed_tr = (smoothed_tr * (period as f64 - 1.0) + tr[i]) / period as f64;
        smoothed_plus = (smoothed_plus * (period as f64 - 1.0) + plus_dm[i]) / period as f64;
        smoothed_minus = (smoothed_minus * (period as f64 - 1.0) + minus_dm[i]) / period as f64;
        dx[i] = dx_value(smoothed_tr, smoothed_plus, smoothed_minus);
    }

    let mut result = vec![None; len];
    let first_adx_idx = 2 * period - 1;
    let mut current = dx[period..period + period].iter().sum::<f64>() / period as f64;
    result[first_adx_idx] = Some(current);

    for i in (first_adx_idx + 1)..len {
        current = (current * (period as f64 - 1.0) + dx[i]) / period as f64;
        result[i] = Some(current);
    }

    Ok(result)
}

fn dx_value(smoothed_tr: f64, smoothed_plus: f64, smoothed_minus: f64) -> f64 {
    if smoothed_tr == 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * smoothed_plus / smoothed_tr;
    let minus_di = 100.0 * smoothed_minus / smoothed_tr;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return 0.0;
    }
    100.0 * (plus_di - minus_di).abs() / di_sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adx_warmup_index() {
        let highs = vec![10.0; 30];
        let lows = vec![8.0; 30];
        let closes = vec![9.0; 30];
        let result = adx(&highs, &lows, &closes, 14).unwrap();

        assert_eq!(result.len(), 30);
        assert!(result[26].is_none());
        assert!(result[27].is_some());
    }

    #[test]
    fn test_adx_strong_trend_reads_high() {
        let highs: Vec<f64> = (0..60).map(|i| 102.0 + i as f64 * 2.0).collect();
        let lows: Vec<f64> = (0..60).map(|i| 98.0 + i as f64 * 2.0).collect();
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 2.0).collect();
        let result = adx(&highs, &lows, &closes, 14).unwrap();
        let last = result.last().copied().flatten().unwrap();
        assert!(last > 50.0, "one-way trend should read high ADX, got {last}");
    }

    #[test]
    fn test_adx_range_bound() {
        let highs: Vec<f64> = (0..60).map(|i| 101.0 + (i % 2) as f64).collect();
        let lows: Vec<f64> = (0..60).map(|i| 99.0 - (i % 2) as f64).collect();
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i % 2) as f64 * 0.5).collect();
        let result = adx(&highs, &lows, &closes, 14).unwrap();
        for val in result.iter().flatten() {
            assert!((0.0..=100.0).contains(val));
        }
    }

    #[test]
    fn test_adx_insufficient_data() {
        assert!(adx(&[1.0; 20], &[1.0; 20], &[1.0; 20], 14).is_err());
    }
}
