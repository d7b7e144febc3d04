//! Volume ratio indicator.

use super::sma::sma;

/// Calculate the volume ratio: current volume / SMA(period) of volume.
///
/// A reading above 1.0 means the current bar trades heavier than its recent
/// average. Bars whose volume SMA is zero yield `None` (indeterminate).
///
/// # Example
///
/// ```
/// use signal_forge::indicators::volume_ratio;
///
/// let volumes = vec![100.0; 25];
/// let result = volume_ratio(&volumes, 20);
/// assert_eq!(result.last().copied().flatten(), Some(1.0));
/// ```
pub fn volume_ratio(volumes: &[f64], period: usize) -> Vec<Option<f64>> {
    let averages = sma(volumes, period);
    volumes
        .iter()
        .zip(averages.iter())
        .map(|(&v, avg)| match avg {
            Some(a) if *a > 0.0 => Some(v / a),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_ratio_spike() {
        let mut volumes = vec![100.0; 24];
        volumes.push(300.0);
        let result = volume_ratio(&volumes, 20);
        // Average of last 20 = (19*100 + 300)/20 = 110; ratio = 300/110
        let last = result.last().copied().flatten().unwrap();
        assert!((last - 300.0 / 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_volume_ratio_zero_average_is_indeterminate() {
        let volumes = vec![0.0; 25];
        let result = volume_ratio(&volumes, 20);
        assert_eq!(result.last().copied().flatten(), None);
    }

    #[test]
    fn test_volume_ratio_warmup() {
        let volumes = vec![100.0; 25];
        let result = volume_ratio(&volumes, 20);
        assert!(result[18].is_none());
        assert!(result[19].is_some());
    }
}
