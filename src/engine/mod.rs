mod arbitrage;
mod clients;
mod error;
mod executor;
mod market_maker;
mod rebalancer;
mod retry;
mod submit;
mod supervisor;

pub use arbitrage::{ArbitrageConfig, ArbitrageStrategy};
pub use clients::SwapApiClient;
pub use error::{ExecutionError, StrategyError};
pub use executor::TradeExecutor;
pub use market_maker::{MarketMakerConfig, MarketMakerStrategy};
pub use rebalancer::{RebalanceConfig, RebalanceStrategy};
pub use retry::{RetryConfig, RetryHandler};
pub use submit::{SubmitError, SubmitErrorKind, TradeIntent, TransactionSubmitter};
pub use supervisor::StrategyEngine;

#[cfg(test)]
pub use submit::MockTransactionSubmitter;
