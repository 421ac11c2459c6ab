use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use lru::LruCache;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::types::{BookLevel, MarketDataError, MarketDataSource, OrderBook};

const PRICE_CACHE_CAPACITY: usize = 512;

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: HashMap<String, TokenPrice>,
}

#[derive(Debug, Deserialize)]
struct TokenPrice {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<(Decimal, Decimal)>,
    asks: Vec<(Decimal, Decimal)>,
}

/// HTTP-backed price and order-book feed with a short-TTL price cache, so a
/// batch of transactions against the same token costs one upstream request.
pub struct HttpPriceFeed {
    base_url: String,
    http_client: reqwest::Client,
    price_cache: Mutex<LruCache<String, (Decimal, Instant)>>,
    cache_ttl: Duration,
}

impl HttpPriceFeed {
    pub fn new(base_url: String, cache_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(PRICE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            base_url,
            http_client: reqwest::Client::new(),
            price_cache: Mutex::new(LruCache::new(capacity)),
            cache_ttl,
        }
    }

    async fn cached_price(&self, asset: &str) -> Option<Decimal> {
        let mut cache = self.price_cache.lock().await;
        match cache.get(asset) {
            Some((price, fetched_at)) if fetched_at.elapsed() < self.cache_ttl => Some(*price),
            _ => None,
        }
    }

    async fn fetch_price(&self, asset: &str) -> Result<Decimal, MarketDataError> {
        let url = format!("{}/price", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("ids", asset)])
            .send()
            .await
            .map_err(|e| MarketDataError::RequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketDataError::NoData(asset.to_string()));
        }

        let body: PriceResponse = response
            .error_for_status()
            .map_err(|e| MarketDataError::RequestFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| MarketDataError::RequestFailed(e.to_string()))?;

        body.data
            .get(asset)
            .map(|t| t.price)
            .ok_or_else(|| MarketDataError::NoData(asset.to_string()))
    }
}

#[async_trait]
impl MarketDataSource for HttpPriceFeed {
    async fn price(&self, asset: &str) -> Result<Decimal, MarketDataError> {
        if let Some(price) = self.cached_price(asset).await {
            return Ok(price);
        }

        let price = self.fetch_price(asset).await?;
        debug!("fetched price for {asset}: {price}");
        self.price_cache
            .lock()
            .await
            .put(asset.to_string(), (price, Instant::now()));
        Ok(price)
    }

    async fn order_book(&self, pair: &str) -> Result<OrderBook, MarketDataError> {
        let url = format!("{}/depth", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("pair", pair)])
            .send()
            .await
            .map_err(|e| MarketDataError::RequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketDataError::NoData(pair.to_string()));
        }

        let body: DepthResponse = response
            .error_for_status()
            .map_err(|e| MarketDataError::RequestFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| MarketDataError::RequestFailed(e.to_string()))?;

        if body.bids.is_empty() && body.asks.is_empty() {
            return Err(MarketDataError::NoData(pair.to_string()));
        }

        Ok(OrderBook {
            bids: body
                .bids
                .into_iter()
                .map(|(price, quantity)| BookLevel { price, quantity })
                .collect(),
            asks: body
                .asks
                .into_iter()
                .map(|(price, quantity)| BookLevel { price, quantity })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_response_parses_decimal_prices() {
        let raw = r#"{"data":{"SOL":{"price":"151.25"}}}"#;
        let parsed: PriceResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data["SOL"].price, Decimal::new(15125, 2));
    }

    #[test]
    fn depth_response_parses_levels() {
        let raw = r#"{"bids":[["100.0","2.5"]],"asks":[["103.0","1.0"]]}"#;
        let parsed: DepthResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.bids[0].0, Decimal::new(100, 0));
        assert_eq!(parsed.asks[0].1, Decimal::new(1, 0));
    }

    #[tokio::test]
    async fn cache_returns_recent_entries_only() {
        let feed = HttpPriceFeed::new("http://unused".to_string(), Duration::from_secs(30));
        feed.price_cache
            .lock()
            .await
            .put("SOL".to_string(), (Decimal::new(150, 0), Instant::now()));
        assert_eq!(feed.cached_price("SOL").await, Some(Decimal::new(150, 0)));
        assert_eq!(feed.cached_price("ETH").await, None);
    }
}
