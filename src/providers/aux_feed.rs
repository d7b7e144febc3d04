//! Auxiliary-data provider: funding, open interest, dominance, sentiment, news.
//!
//! Every field is fetched independently with its own timeout; a failed
//! sub-fetch leaves that field absent instead of failing the whole call.
//! Criteria treat absent fields as "assume safe".

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{AuxiliaryContext, NewsItem};

/// Headline keywords that mark a story as high market impact.
const HIGH_IMPACT_KEYWORDS: [&str; 10] = [
    "sec", "etf", "hack", "exploit", "ban", "lawsuit", "bankrupt", "liquidation", "halt", "fed",
];

/// Source of auxiliary cross-market context.
pub trait AuxData: Send + Sync {
    /// Assemble whatever context is currently fetchable. Infallible by
    /// design: missing pieces are simply absent.
    fn get_aux(
        &self,
        symbol: &str,
    ) -> impl std::future::Future<Output = AuxiliaryContext> + Send;
}

/// Default provider hitting public futures/global/sentiment/news endpoints.
pub struct AuxDataClient {
    http: Client,
    futures_base_url: String,
    global_base_url: String,
    market_base_url: String,
    fear_greed_url: String,
    news_feed_urls: Vec<String>,
    sub_fetch_timeout: Duration,
}

impl AuxDataClient {
    /// Build from engine configuration.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout.max(Duration::from_secs(1)))
            .user_agent(concat!("signal-forge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(EngineError::Network)?;

        Ok(Self {
            http,
            futures_base_url: config.futures_base_url.clone(),
            global_base_url: config.global_base_url.clone(),
            market_base_url: config.market_base_url.clone(),
            fear_greed_url: config.fear_greed_url.clone(),
            news_feed_urls: config.news_feed_urls.clone(),
            sub_fetch_timeout: config.request_timeout.min(Duration::from_secs(5)),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .timeout(self.sub_fetch_timeout)
            .send()
            .await
            .map_err(EngineError::Network)?;
        if !resp.status().is_success() {
            return Err(EngineError::ServerError {
                status: resp.status().as_u16(),
                source_name: url.to_string(),
            });
        }
        resp.json().await.map_err(EngineError::Network)
    }

    /// Funding rate and USD open interest from the futures stats endpoints.
    async fn fetch_funding(&self, symbol: &str) -> Result<(f64, Option<f64>)> {
        let premium = self
            .get_json(&format!(
                "{}/fapi/v1/premiumIndex?symbol={symbol}",
                self.futures_base_url
            ))
            .await?;

        let funding = premium["lastFundingRate"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| EngineError::malformed("premiumIndex", "missing lastFundingRate"))?;
        let mark_price = premium["markPrice"].as_str().and_then(|s| s.parse::<f64>().ok());

        let open_interest_usd = match self
            .get_json(&format!(
                "{}/fapi/v1/openInterest?symbol={symbol}",
                self.futures_base_url
            ))
            .await
        {
            Ok(oi) => oi["openInterest"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .zip(mark_price)
                .map(|(contracts, price)| contracts * price),
            Err(e) => {
                debug!(symbol, error = %e, "open interest unavailable");
                None
            }
        };

        Ok((funding, open_interest_usd))
    }

    /// BTC market-cap dominance from the global market endpoint.
    async fn fetch_dominance(&self) -> Result<f64> {
        let global = self
            .get_json(&format!("{}/global", self.global_base_url))
            .await?;
        global["data"]["market_cap_percentage"]["btc"]
            .as_f64()
            .ok_or_else(|| EngineError::malformed("global", "missing btc dominance"))
    }

    /// ETH/BTC ratio from the spot ticker.
    async fn fetch_eth_btc(&self) -> Result<f64> {
        let ticker = self
            .get_json(&format!(
                "{}/api/v3/ticker/price?symbol=ETHBTC",
                self.market_base_url
            ))
            .await?;
        ticker["price"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| EngineError::malformed("ticker", "missing ETHBTC price"))
    }

    /// Fear & Greed index (alternative.me response format).
    async fn fetch_fear_greed(&self) -> Result<u8> {
        let body = self.get_json(&self.fear_greed_url).await?;
        body["data"][0]["value"]
            .as_str()
            .and_then(|s| s.parse::<u8>().ok())
            .ok_or_else(|| EngineError::malformed("fear-greed", "missing value"))
    }

    /// Recent headlines from the configured RSS/Atom feeds.
    async fn fetch_news(&self) -> Result<Vec<NewsItem>> {
        let mut items = Vec::new();
        for url in &self.news_feed_urls {
            let bytes = match self
                .http
                .get(url)
                .timeout(self.sub_fetch_timeout)
                .send()
                .await
                .and_then(|r| r.error_for_status())
            {
                Ok(resp) => match resp.bytes().await {
                    Ok(b) => b,
                    Err(e) => {
                        debug!(url, error = %e, "feed body unavailable");
                        continue;
                    }
                },
                Err(e) => {
                    debug!(url, error = %e, "feed unavailable");
                    continue;
                }
            };

            let feed = match feed_rs::parser::parse(bytes.as_ref()) {
                Ok(f) => f,
                Err(e) => {
                    debug!(url, error = %e, "feed unparsable");
                    continue;
                }
            };

            let source = feed
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_else(|| url.clone());

            for entry in feed.entries.into_iter().take(10) {
                let title = match entry.title {
                    Some(t) => t.content,
                    None => continue,
                };
                let lowered = title.to_lowercase();
                let high_impact = HIGH_IMPACT_KEYWORDS.iter().any(|k| lowered.contains(k));
                items.push(NewsItem {
                    title,
                    source: source.clone(),
                    published_at: entry.published.map(|d| d.timestamp()),
                    high_impact,
                });
            }
        }

        items.sort_by_key(|n| std::cmp::Reverse(n.published_at));
        Ok(items)
    }
}

impl AuxData for AuxDataClient {
    async fn get_aux(&self, symbol: &str) -> AuxiliaryContext {
        let (funding, dominance, eth_btc, fear_greed, news) = futures::join!(
            self.fetch_funding(symbol),
            self.fetch_dominance(),
            self.fetch_eth_btc(),
            self.fetch_fear_greed(),
            self.fetch_news(),
        );

        let mut aux = AuxiliaryContext::default();

        match funding {
            Ok((rate, oi)) => {
                aux.funding_rate = Some(rate);
                aux.open_interest_usd = oi;
            }
            Err(e) => debug!(symbol, error = %e, "funding rate unavailable"),
        }
        match dominance {
            Ok(v) => aux.btc_dominance_pct = Some(v),
            Err(e) => debug!(error = %e, "dominance unavailable"),
        }
        match eth_btc {
            Ok(v) => aux.eth_btc_ratio = Some(v),
            Err(e) => debug!(error = %e, "eth/btc ratio unavailable"),
        }
        match fear_greed {
            Ok(v) => aux.fear_greed_score = Some(v),
            Err(e) => debug!(error = %e, "fear & greed unavailable"),
        }
        match news {
            Ok(items) => aux.news = items,
            Err(e) => debug!(error = %e, "news unavailable"),
        }

        aux
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_base(url: &str) -> EngineConfig {
        EngineConfig {
            futures_base_url: url.to_string(),
            global_base_url: url.to_string(),
            market_base_url: url.to_string(),
            fear_greed_url: format!("{url}/fng/"),
            news_feed_urls: vec![],
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_aux_all_sources_up() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/premiumIndex")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"lastFundingRate":"0.00031","markPrice":"50000.0"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/fapi/v1/openInterest")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"openInterest":"1000.0"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/global")
            .with_body(r#"{"data":{"market_cap_percentage":{"btc":52.3,"eth":17.1}}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v3/ticker/price")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"price":"0.055"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/fng/")
            .with_body(r#"{"data":[{"value":"21","value_classification":"Extreme Fear"}]}"#)
            .create_async()
            .await;

        let client = AuxDataClient::new(&config_with_base(&server.url())).unwrap();
        let aux = client.get_aux("BTCUSDT").await;

        assert_eq!(aux.funding_rate, Some(0.00031));
        assert_eq!(aux.open_interest_usd, Some(50_000_000.0));
        assert_eq!(aux.btc_dominance_pct, Some(52.3));
        assert_eq!(aux.eth_btc_ratio, Some(0.055));
        assert_eq!(aux.fear_greed_score, Some(21));
    }

    #[tokio::test]
    async fn test_aux_partial_failure_leaves_fields_absent() {
        let mut server = mockito::Server::new_async().await;
        // Only fear & greed responds; everything else 500s
        server
            .mock("GET", "/fng/")
            .with_body(r#"{"data":[{"value":"77"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", mockito::Matcher::Regex("^/(fapi|global|api).*".to_string()))
            .with_status(500)
            .create_async()
            .await;

        let client = AuxDataClient::new(&config_with_base(&server.url())).unwrap();
        let aux = client.get_aux("BTCUSDT").await;

        assert_eq!(aux.fear_greed_score, Some(77));
        assert!(aux.funding_rate.is_none());
        assert!(aux.btc_dominance_pct.is_none());
        assert!(aux.eth_btc_ratio.is_none());
    }

    #[test]
    fn test_high_impact_keywords() {
        let lowered = "SEC delays spot ETF decision".to_lowercase();
        assert!(HIGH_IMPACT_KEYWORDS.iter().any(|k| lowered.contains(k)));
        let benign = "Weekly market recap".to_lowercase();
        assert!(!HIGH_IMPACT_KEYWORDS.iter().any(|k| benign.contains(k)));
    }
}
