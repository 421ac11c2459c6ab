use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::arbitrage::ArbitrageStrategy;
use super::market_maker::MarketMakerStrategy;
use super::rebalancer::RebalanceStrategy;

/// Owns the fixed set of strategy loops. Each runs as its own task; all
/// observe the same shutdown signal and exit within one tick of it flipping.
pub struct StrategyEngine {
    arbitrage: ArbitrageStrategy,
    market_maker: MarketMakerStrategy,
    rebalancer: RebalanceStrategy,
}

impl StrategyEngine {
    pub fn new(
        arbitrage: ArbitrageStrategy,
        market_maker: MarketMakerStrategy,
        rebalancer: RebalanceStrategy,
    ) -> Self {
        Self {
            arbitrage,
            market_maker,
            rebalancer,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!("spawning strategy loops");
        vec![
            tokio::spawn(self.arbitrage.run(shutdown.clone())),
            tokio::spawn(self.market_maker.run(shutdown.clone())),
            tokio::spawn(self.rebalancer.run(shutdown)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::*;
    use crate::engine::arbitrage::ArbitrageConfig;
    use crate::engine::executor::TradeExecutor;
    use crate::engine::market_maker::MarketMakerConfig;
    use crate::engine::rebalancer::RebalanceConfig;
    use crate::engine::retry::RetryConfig;
    use crate::engine::submit::MockTransactionSubmitter;
    use crate::market::{MarketDataError, MarketDataSource, MockMarketDataSource};
    use crate::state::TradingState;

    fn quiet_market() -> Arc<dyn MarketDataSource> {
        let mut market = MockMarketDataSource::new();
        market
            .expect_price()
            .returning(|asset| Err(MarketDataError::NoData(asset.to_string())));
        market
            .expect_order_book()
            .returning(|pair| Err(MarketDataError::NoData(pair.to_string())));
        Arc::new(market)
    }

    #[tokio::test(start_paused = true)]
    async fn all_loops_observe_shutdown_within_a_tick() {
        let market = quiet_market();
        let state = Arc::new(TradingState::new());
        let executor = Arc::new(TradeExecutor::new(
            Arc::clone(&state),
            Arc::new(MockTransactionSubmitter::new()),
            RetryConfig::default(),
        ));

        let engine = StrategyEngine::new(
            ArbitrageStrategy::new(
                ArbitrageConfig {
                    asset: "ETH".to_string(),
                    threshold: Decimal::new(2, 2),
                    trade_size: Decimal::ONE,
                    interval: Duration::from_secs(1),
                },
                market.clone(),
                market.clone(),
                Arc::clone(&executor),
            ),
            MarketMakerStrategy::new(
                MarketMakerConfig {
                    pair: "ETH/USD".to_string(),
                    asset: "ETH".to_string(),
                    spread_target: Decimal::new(2, 2),
                    order_size: Decimal::ONE,
                    interval: Duration::from_secs(1),
                },
                market.clone(),
                Arc::clone(&state),
                Arc::clone(&executor),
            ),
            RebalanceStrategy::new(
                RebalanceConfig {
                    targets: HashMap::from([("ETH".to_string(), Decimal::ONE)]),
                    band: Decimal::new(5, 2),
                    interval: Duration::from_secs(1),
                },
                market,
                state,
                executor,
            ),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = engine.spawn(shutdown_rx);
        tokio::time::sleep(Duration::from_secs(2)).await;

        shutdown_tx.send(true).expect("loops alive");
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .expect("loop did not observe shutdown")
                .expect("loop panicked");
        }
    }
}
