//! Market-data provider: OHLCV candle fetching.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{EngineError, Result};
use crate::models::{Candle, Series, Timeframe};

/// Source of OHLCV candle series.
///
/// Implementations must return exactly `count` bars, ordered, ending on the
/// most recent closed bar; an upstream truncation is an error, not a shorter
/// series.
pub trait MarketData: Send + Sync {
    /// Fetch `count` bars of `timeframe` for `symbol`.
    fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> impl std::future::Future<Output = Result<Series>> + Send;
}

/// Binance-compatible klines client with caching, throttling, and one retry.
///
/// Public endpoints need no credentials. Retriable failures (timeouts, 429,
/// 5xx) are retried once after the upstream-suggested backoff.
pub struct KlineClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
    ctx: Context,
}

impl KlineClient {
    /// Build a client against `base_url` using the shared context's cache and
    /// rate limiter.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration, ctx: Context) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout.max(Duration::from_secs(1)))
            .user_agent(concat!("signal-forge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(EngineError::Network)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            request_timeout,
            ctx,
        })
    }

    async fn fetch_once(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Series> {
        self.ctx.limiter.acquire().await;

        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol,
            timeframe.api_token(),
            count
        );

        debug!(symbol, %timeframe, count, "klines request");
        let resp = self
            .http
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                return Err(EngineError::RateLimited { retry_after });
            }
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                return Err(EngineError::SymbolUnknown {
                    symbol: symbol.to_string(),
                });
            }
            s if s.is_server_error() => {
                return Err(EngineError::ServerError {
                    status: s.as_u16(),
                    source_name: "klines".to_string(),
                });
            }
            s => {
                return Err(EngineError::malformed(
                    "klines",
                    format!("unexpected status {s}"),
                ));
            }
        }

        let rows: Vec<Value> = resp.json().await.map_err(|e| self.map_transport_error(e))?;
        let candles = parse_klines(&rows)?;

        if candles.len() < count {
            return Err(EngineError::malformed(
                "klines",
                format!("requested {count} bars, upstream returned {}", candles.len()),
            ));
        }

        Series::new(symbol, timeframe, candles)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout {
                timeout_ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            EngineError::Network(e)
        }
    }
}

impl MarketData for KlineClient {
    async fn get_candles(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Series> {
        if let Some(cached) = self.ctx.cache.get(symbol, timeframe).await {
            if cached.len() >= count {
                return Ok(cached);
            }
        }

        let series = match self.fetch_once(symbol, timeframe, count).await {
            Ok(series) => series,
            Err(e) if e.is_retriable() => {
                // Single inline retry; cap the backoff so a caller's pipeline
                // budget is not consumed waiting out a long retry-after hint.
                let backoff = Duration::from_secs(e.retry_after_secs().unwrap_or(1).min(2));
                warn!(symbol, %timeframe, error = %e, "retrying after {:?}", backoff);
                tokio::time::sleep(backoff).await;
                self.fetch_once(symbol, timeframe, count).await?
            }
            Err(e) => return Err(e),
        };

        self.ctx.cache.insert(series.clone()).await;
        Ok(series)
    }
}

/// Parse Binance-format kline rows:
/// `[open_time_ms, "open", "high", "low", "close", "volume", close_time_ms, ...]`
fn parse_klines(rows: &[Value]) -> Result<Vec<Candle>> {
    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = row
            .as_array()
            .ok_or_else(|| EngineError::malformed("klines", "row is not an array"))?;
        if fields.len() < 6 {
            return Err(EngineError::malformed(
                "klines",
                format!("row has {} fields, need 6", fields.len()),
            ));
        }

        let open_time_ms = fields[0]
            .as_i64()
            .ok_or_else(|| EngineError::malformed("klines", "open time is not an integer"))?;

        let mut prices = [0.0_f64; 5];
        for (slot, field) in prices.iter_mut().zip(&fields[1..6]) {
            *slot = field
                .as_str()
                .and_then(|s| s.parse().ok())
                .or_else(|| field.as_f64())
                .ok_or_else(|| EngineError::malformed("klines", "non-numeric price field"))?;
        }

        candles.push(Candle {
            timestamp: open_time_ms / 1000,
            open: prices[0],
            high: prices[1],
            low: prices[2],
            close: prices[3],
            volume: prices[4],
        });
    }
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn test_context() -> Context {
        Context::new(&EngineConfig::default())
    }

    fn kline_row(ts_ms: i64, price: f64) -> Value {
        serde_json::json!([
            ts_ms,
            price.to_string(),
            (price + 1.0).to_string(),
            (price - 1.0).to_string(),
            price.to_string(),
            "123.45",
            ts_ms + 59_999,
            "0",
            0,
            "0",
            "0",
            "0"
        ])
    }

    fn klines_body(count: usize) -> String {
        let rows: Vec<Value> = (0..count)
            .map(|i| kline_row(1_700_000_000_000 + i as i64 * 3_600_000, 100.0 + i as f64))
            .collect();
        serde_json::to_string(&rows).unwrap()
    }

    #[test]
    fn test_parse_klines() {
        let rows = vec![kline_row(1_700_000_000_000, 50.0)];
        let candles = parse_klines(&rows).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 1_700_000_000);
        assert_eq!(candles[0].open, 50.0);
        assert_eq!(candles[0].volume, 123.45);
    }

    #[test]
    fn test_parse_klines_rejects_garbage() {
        let rows = vec![serde_json::json!({"not": "an array"})];
        assert!(parse_klines(&rows).is_err());

        let short = vec![serde_json::json!([1, "2"])];
        assert!(parse_klines(&short).is_err());
    }

    #[tokio::test]
    async fn test_get_candles_happy_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(klines_body(5))
            .create_async()
            .await;

        let client =
            KlineClient::new(server.url(), Duration::from_secs(5), test_context()).unwrap();
        let series = client.get_candles("BTCUSDT", Timeframe::H1, 5).await.unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(series.symbol, "BTCUSDT");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_candles_served_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(klines_body(5))
            .expect(1)
            .create_async()
            .await;

        let client =
            KlineClient::new(server.url(), Duration::from_secs(5), test_context()).unwrap();
        client.get_candles("BTCUSDT", Timeframe::H1, 5).await.unwrap();
        client.get_candles("BTCUSDT", Timeframe::H1, 5).await.unwrap();

        mock.assert_async().await; // only one upstream hit
    }

    #[tokio::test]
    async fn test_truncated_response_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/klines")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(klines_body(3))
            .create_async()
            .await;

        let client =
            KlineClient::new(server.url(), Duration::from_secs(5), test_context()).unwrap();
        let result = client.get_candles("BTCUSDT", Timeframe::H1, 10).await;
        assert!(matches!(result, Err(EngineError::UpstreamMalformed { .. })));
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/klines")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let client =
            KlineClient::new(server.url(), Duration::from_secs(5), test_context()).unwrap();
        let result = client.get_candles("NOPE", Timeframe::H1, 5).await;
        assert!(matches!(result, Err(EngineError::SymbolUnknown { .. })));
    }

    #[tokio::test]
    async fn test_server_error_is_retried_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client =
            KlineClient::new(server.url(), Duration::from_secs(5), test_context()).unwrap();
        let result = client.get_candles("BTCUSDT", Timeframe::H1, 5).await;

        assert!(matches!(result, Err(EngineError::ServerError { .. })));
        mock.assert_async().await; // both the original attempt and the retry
    }
}
