mod feed;
mod types;

pub use feed::HttpPriceFeed;
pub use types::{BookLevel, MarketDataError, MarketDataSource, OrderBook};

#[cfg(test)]
pub use types::MockMarketDataSource;
