//! Bollinger Bands indicator.

use super::{IndicatorError, Result, sma::sma};

/// Bollinger Bands output series.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    /// Upper band: middle + multiplier × stdev
    pub upper: Vec<Option<f64>>,
    /// Middle band: SMA(period)
    pub middle: Vec<Option<f64>>,
    /// Lower band: middle − multiplier × stdev
    pub lower: Vec<Option<f64>>,
}

/// Calculate Bollinger Bands.
///
/// Middle band is an SMA; upper/lower bands sit `std_dev` population standard
/// deviations away.
///
/// # Example
///
/// ```
/// use signal_forge::indicators::bollinger_bands;
///
/// let prices: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
/// let bb = bollinger_bands(&prices, 20, 2.0).unwrap();
/// let i = prices.len() - 1;
/// assert!(bb.upper[i].unwrap() > bb.middle[i].unwrap());
/// assert!(bb.lower[i].unwrap() < bb.middle[i].unwrap());
/// ```
pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> Result<BollingerBands> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod(
            "Period must be greater than 0".to_string(),
        ));
    }
    if data.len() < period {
        return Err(IndicatorError::InsufficientData {
            need: period,
            got: data.len(),
        });
    }

    let middle = sma(data, period);
    let mut upper = vec![None; data.len()];
    let mut lower = vec![None; data.len()];

    for i in (period - 1)..data.len() {
        if let Some(mean) = middle[i] {
            let window = &data[i + 1 - period..=i];
            let variance =
                window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
            let sd = variance.sqrt();
            upper[i] = Some(mean + std_dev * sd);
            lower[i] = Some(mean - std_dev * sd);
        }
    }

    Ok(BollingerBands {
        upper,
        middle,
        lower,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_flat_series_collapses() {
        let data = vec![100.0; 25];
        let bb = bollinger_bands(&data, 20, 2.0).unwrap();
        let i = 24;
        assert_eq!(bb.middle[i], Some(100.0));
        assert_eq!(bb.upper[i], Some(100.0));
        assert_eq!(bb.lower[i], Some(100.0));
    }

    #[test]
    fn test_bollinger_symmetry() {
        let data: Vec<f64> = (0..40).map(|i| 100.0 + ((i * 7) % 11) as f64).collect();
        let bb = bollinger_bands(&data, 20, 2.0).unwrap();
        for i in 19..data.len() {
            let (u, m, l) = (
                bb.upper[i].unwrap(),
                bb.middle[i].unwrap(),
                bb.lower[i].unwrap(),
            );
            assert!((u - m - (m - l)).abs() < 1e-9, "bands not symmetric at {i}");
        }
    }

    #[test]
    fn test_bollinger_warmup() {
        let data: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let bb = bollinger_bands(&data, 20, 2.0).unwrap();
        assert!(bb.upper[18].is_none());
        assert!(bb.upper[19].is_some());
    }

    #[test]
    fn test_bollinger_insufficient_data() {
        let data = vec![1.0; 10];
        assert!(bollinger_bands(&data, 20, 2.0).is_err());
    }
}
