pub mod bot;
pub mod chain;
pub mod config;
pub mod engine;
pub mod market;
pub mod model;
pub mod state;

// Re-export key types
pub use bot::{Command, CommandGateway, RateLimiter, RateLimiterConfig};
pub use chain::{ChainClient, JsonRpcChainClient, WhaleAlert, WhaleWatcher};
pub use config::{AppConfig, ConfigError};
pub use engine::{
    StrategyEngine,
    SwapApiClient,
    TradeExecutor,
    TradeIntent,
    TransactionSubmitter,
};
pub use market::{HttpPriceFeed, MarketDataSource};
pub use state::TradingState;
