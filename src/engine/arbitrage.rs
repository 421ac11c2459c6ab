use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::watch;

use super::error::StrategyError;
use super::executor::TradeExecutor;
use super::submit::TradeIntent;
use crate::market::{MarketDataError, MarketDataSource};
use crate::state::OrderSide;

#[derive(Clone, Debug)]
pub struct ArbitrageConfig {
    pub asset: String,
    /// Relative spread that must be strictly exceeded before trading.
    pub threshold: Decimal,
    pub trade_size: Decimal,
    pub interval: Duration,
}

/// Compares one asset's price across two venues each tick and, when the
/// relative spread strictly exceeds the threshold, buys at the cheaper quote
/// and sells the same size at the pricier one.
pub struct ArbitrageStrategy {
    config: ArbitrageConfig,
    primary: Arc<dyn MarketDataSource>,
    secondary: Arc<dyn MarketDataSource>,
    executor: Arc<TradeExecutor>,
}

impl ArbitrageStrategy {
    pub fn new(
        config: ArbitrageConfig,
        primary: Arc<dyn MarketDataSource>,
        secondary: Arc<dyn MarketDataSource>,
        executor: Arc<TradeExecutor>,
    ) -> Self {
        Self {
            config,
            primary,
            secondary,
            executor,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        info!("arbitrage strategy started on {}", self.config.asset);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("arbitrage strategy shutting down");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("arbitrage iteration failed: {e}");
                    }
                }
            }
        }
    }

    pub(crate) async fn tick(&self) -> Result<(), StrategyError> {
        let asset = &self.config.asset;
        let p1 = match self.primary.price(asset).await {
            Ok(price) => price,
            Err(MarketDataError::NoData(_)) => {
                debug!("primary venue has no quote for {asset}, tick skipped");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let p2 = match self.secondary.price(asset).await {
            Ok(price) => price,
            Err(MarketDataError::NoData(_)) => {
                debug!("secondary venue has no quote for {asset}, tick skipped");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if p1 <= Decimal::ZERO || p2 <= Decimal::ZERO {
            return Ok(());
        }

        let (low, high) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        let spread = (high - low) / low;
        // Equality with the threshold is deliberately not a trade.
        if spread <= self.config.threshold {
            return Ok(());
        }

        info!(
            "arbitrage opportunity on {asset}: spread {:.4} ({} vs {})",
            spread.to_f64().unwrap_or_default(),
            low,
            high
        );

        self.executor
            .execute_trade(TradeIntent {
                asset: asset.clone(),
                amount: self.config.trade_size,
                side: OrderSide::Buy,
                price: low,
            })
            .await?;
        self.executor
            .execute_trade(TradeIntent {
                asset: asset.clone(),
                amount: self.config.trade_size,
                side: OrderSide::Sell,
                price: high,
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::retry::RetryConfig;
    use crate::engine::submit::MockTransactionSubmitter;
    use crate::market::MockMarketDataSource;
    use crate::state::TradingState;

    fn config(threshold: Decimal) -> ArbitrageConfig {
        ArbitrageConfig {
            asset: "ETH".to_string(),
            threshold,
            trade_size: Decimal::ONE,
            interval: Duration::from_secs(15),
        }
    }

    fn venue(price: Decimal) -> Arc<dyn MarketDataSource> {
        let mut market = MockMarketDataSource::new();
        market.expect_price().returning(move |_| Ok(price));
        Arc::new(market)
    }

    fn strategy(
        threshold: Decimal,
        p1: Decimal,
        p2: Decimal,
        submitter: MockTransactionSubmitter,
    ) -> ArbitrageStrategy {
        let state = Arc::new(TradingState::new());
        let executor = Arc::new(TradeExecutor::new(
            state,
            Arc::new(submitter),
            RetryConfig::default(),
        ));
        ArbitrageStrategy::new(config(threshold), venue(p1), venue(p2), executor)
    }

    #[tokio::test]
    async fn spread_equal_to_threshold_does_not_trade() {
        let mut submitter = MockTransactionSubmitter::new();
        submitter.expect_submit().times(0);
        // 102 vs 100 is exactly a 2% spread.
        let strategy = strategy(
            Decimal::new(2, 2),
            Decimal::new(100, 0),
            Decimal::new(102, 0),
            submitter,
        );
        strategy.tick().await.unwrap();
    }

    #[tokio::test]
    async fn spread_above_threshold_buys_low_and_sells_high() {
        let mut submitter = MockTransactionSubmitter::new();
        let mut calls = 0u32;
        submitter.expect_submit().times(2).returning(move |intent| {
            calls += 1;
            match calls {
                1 => {
                    assert_eq!(intent.side, OrderSide::Buy);
                    assert_eq!(intent.price, Decimal::new(100, 0));
                }
                _ => {
                    assert_eq!(intent.side, OrderSide::Sell);
                    assert_eq!(intent.price, Decimal::new(103, 0));
                }
            }
            Ok(format!("tx-{calls}"))
        });
        let strategy = strategy(
            Decimal::new(2, 2),
            Decimal::new(103, 0),
            Decimal::new(100, 0),
            submitter,
        );
        strategy.tick().await.unwrap();
    }

    #[tokio::test]
    async fn missing_quote_skips_the_tick() {
        let mut submitter = MockTransactionSubmitter::new();
        submitter.expect_submit().times(0);

        let mut primary = MockMarketDataSource::new();
        primary
            .expect_price()
            .returning(|asset| Err(MarketDataError::NoData(asset.to_string())));
        let state = Arc::new(TradingState::new());
        let executor = Arc::new(TradeExecutor::new(
            state,
            Arc::new(submitter),
            RetryConfig::default(),
        ));
        let strategy = ArbitrageStrategy::new(
            config(Decimal::new(2, 2)),
            Arc::new(primary),
            venue(Decimal::new(100, 0)),
            executor,
        );
        strategy.tick().await.unwrap();
    }
}
