use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum MarketDataError {
    /// The venue has no price or book for the requested asset. Callers skip
    /// the affected item; this is never substituted with a default value.
    #[error("no market data for {0}")]
    NoData(String),

    #[error("market data request failed: {0}")]
    RequestFailed(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }
}

/// Read-only market data feed: current USD price for an asset and order-book
/// snapshots for a pair. Pure query, no mutation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn price(&self, asset: &str) -> Result<Decimal, MarketDataError>;

    async fn order_book(&self, pair: &str) -> Result<OrderBook, MarketDataError>;
}
