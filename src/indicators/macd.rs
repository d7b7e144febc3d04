//! Moving Average Convergence Divergence (MACD) indicator.

use super::{IndicatorError, Result, ema::ema};

/// MACD output: line, signal, and histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdResult {
    /// MACD line: EMA(fast) − EMA(slow)
    pub line: Vec<Option<f64>>,
    /// Signal line: EMA(signal) of the MACD line
    pub signal: Vec<Option<f64>>,
    /// Histogram: line − signal
    pub histogram: Vec<Option<f64>>,
}

/// Calculate MACD.
///
/// # Arguments
///
/// * `data` - Price data (typically close prices)
/// * `fast` - Fast EMA period (typically 12)
/// * `slow` - Slow EMA period (typically 26)
/// * `signal` - Signal line EMA period (typically 9)
///
/// # Example
///
/// ```
/// use signal_forge::indicators::macd;
///
/// let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
/// let result = macd(&prices, 12, 26, 9).unwrap();
/// assert_eq!(result.line.len(), prices.len());
/// ```
pub fn macd(data: &[f64], fast: usize, slow: usize, signal: usize) -> Result<MacdResult> {
    if fast == 0 || slow == 0 || signal == 0 {
        return Err(IndicatorError::InvalidPeriod(
            "All periods must be greater than 0".to_string(),
        ));
    }
    if fast >= slow {
        return Err(IndicatorError::InvalidPeriod(format!(
            "Fast period ({fast}) must be less than slow period ({slow})"
        )));
    }
    let need = slow + signal;
    if data.len() < need {
        return Err(IndicatorError::InsufficientData {
            need,
            got: data.len(),
        });
    }

    let fast_ema = ema(data, fast);
    let slow_ema = ema(data, slow);

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // Signal line is an EMA over the defined portion of the MACD line
    let first_defined = line.iter().position(Option::is_some).unwrap_or(line.len());
    let defined: Vec<f64> = line[first_defined..].iter().map(|v| v.unwrap_or(0.0)).collect();
    let signal_tail = ema(&defined, signal);

    let mut signal_line = vec![None; line.len()];
    for (i, v) in signal_tail.into_iter().enumerate() {
        signal_line[first_defined + i] = v;
    }

    let histogram: Vec<Option<f64>> = line
        .iter()
        .zip(signal_line.iter())
        .map(|(l, s)| match (l, s) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        })
        .collect();

    Ok(MacdResult {
        line,
        signal: signal_line,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_alignment() {
        let data: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let result = macd(&data, 12, 26, 9).unwrap();

        assert_eq!(result.line.len(), 60);
        assert_eq!(result.signal.len(), 60);
        assert_eq!(result.histogram.len(), 60);

        // Line defined from slow-1; signal needs `signal` more bars
        assert!(result.line[24].is_none());
        assert!(result.line[25].is_some());
        assert!(result.signal[32].is_none());
        assert!(result.signal[33].is_some());
        assert!(result.histogram[33].is_some());
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let data: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 2.0).collect();
        let result = macd(&data, 12, 26, 9).unwrap();
        let line = result.line.last().copied().flatten().unwrap();
        assert!(line > 0.0, "MACD line should be positive in up-trend");
    }

    #[test]
    fn test_macd_invalid_periods() {
        let data = vec![1.0; 60];
        assert!(macd(&data, 26, 12, 9).is_err());
        assert!(macd(&data, 0, 26, 9).is_err());
    }

    #[test]
    fn test_macd_insufficient_data() {
        let data = vec![1.0; 20];
        assert!(macd(&data, 12, 26, 9).is_err());
    }
}
