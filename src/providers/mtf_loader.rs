//! Multi-timeframe loader: assembles the four-timeframe view.

use futures::try_join;

use crate::error::Result;
use crate::models::{MtfView, Timeframe};
use crate::providers::MarketData;

/// Assembles M15/H1/H4/D1 series into an aligned [`MtfView`].
///
/// The four fetches fan out concurrently; alignment and minimum-bar checks
/// happen in `MtfView::new`, so a stale or short timeframe fails the load
/// with `InputInvalid`.
pub struct MtfLoader<M> {
    provider: M,
    min_bars: usize,
}

impl<M: MarketData> MtfLoader<M> {
    /// Create a loader requiring at least `min_bars` bars per timeframe.
    pub fn new(provider: M, min_bars: usize) -> Self {
        Self { provider, min_bars }
    }

    /// Access the underlying provider.
    pub fn provider(&self) -> &M {
        &self.provider
    }

    /// Fetch and validate the four canonical timeframes for `symbol`.
    pub async fn load_mtf(&self, symbol: &str) -> Result<MtfView> {
        let (m15, h1, h4, d1) = try_join!(
            self.provider.get_candles(symbol, Timeframe::M15, self.min_bars),
            self.provider.get_candles(symbol, Timeframe::H1, self.min_bars),
            self.provider.get_candles(symbol, Timeframe::H4, self.min_bars),
            self.provider.get_candles(symbol, Timeframe::D1, self.min_bars),
        )?;

        MtfView::new(vec![m15, h1, h4, d1], self.min_bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::{Candle, Series};

    /// Provider returning synthetic aligned series.
    struct SyntheticProvider {
        anchor: i64,
    }

    impl MarketData for SyntheticProvider {
        async fn get_candles(
            &self,
            symbol: &str,
            timeframe: Timeframe,
            count: usize,
        ) -> Result<Series> {
            let step = timeframe.duration_secs();
            let end = self.anchor - step;
            let start = end - (count as i64 - 1) * step;
            let candles = (0..count)
                .map(|i| {
                    let price = 100.0 + i as f64 * 0.1;
                    Candle {
                        timestamp: start + i as i64 * step,
                        open: price,
                        high: price + 1.0,
                        low: price - 1.0,
                        close: price,
                        volume: 500.0,
                    }
                })
                .collect();
            Series::new(symbol, timeframe, candles)
        }
    }

    /// Provider that always truncates below the requested count.
    struct TruncatingProvider;

    impl MarketData for TruncatingProvider {
        async fn get_candles(
            &self,
            symbol: &str,
            timeframe: Timeframe,
            _count: usize,
        ) -> Result<Series> {
            SyntheticProvider {
                anchor: 1_700_000_000,
            }
            .get_candles(symbol, timeframe, 10)
            .await
        }
    }

    #[tokio::test]
    async fn test_load_mtf_assembles_all_four() {
        let loader = MtfLoader::new(
            SyntheticProvider {
                anchor: 1_700_000_000,
            },
            200,
        );
        let view = loader.load_mtf("BTCUSDT").await.unwrap();

        assert_eq!(view.symbol, "BTCUSDT");
        for tf in Timeframe::ALL {
            assert_eq!(view.series(tf).len(), 200);
        }
    }

    #[tokio::test]
    async fn test_load_mtf_rejects_short_series() {
        let loader = MtfLoader::new(TruncatingProvider, 200);
        let result = loader.load_mtf("BTCUSDT").await;
        assert!(matches!(result, Err(EngineError::InputInvalid(_))));
    }
}
