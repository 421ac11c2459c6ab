use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::watch;

use super::error::StrategyError;
use super::executor::TradeExecutor;
use super::submit::TradeIntent;
use crate::market::{MarketDataError, MarketDataSource};
use crate::state::OrderSide;
use crate::state::TradingState;

#[derive(Clone, Debug)]
pub struct RebalanceConfig {
    /// Target allocation fractions per asset; validated at startup to sum
    /// to 1.0 within epsilon.
    pub targets: HashMap<String, Decimal>,
    /// Hysteresis band: a deviation must strictly exceed this before a
    /// corrective trade is issued, so small drift does not oscillate.
    pub band: Decimal,
    pub interval: Duration,
}

/// Periodically restores the portfolio to its target allocation. Works from
/// one coherent TradingState snapshot per cycle so allocation math is not
/// polluted by trades landing mid-computation.
pub struct RebalanceStrategy {
    config: RebalanceConfig,
    market: Arc<dyn MarketDataSource>,
    state: Arc<TradingState>,
    executor: Arc<TradeExecutor>,
}

impl RebalanceStrategy {
    pub fn new(
        config: RebalanceConfig,
        market: Arc<dyn MarketDataSource>,
        state: Arc<TradingState>,
        executor: Arc<TradeExecutor>,
    ) -> Self {
        Self {
            config,
            market,
            state,
            executor,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        info!(
            "rebalancer started over {} assets",
            self.config.targets.len()
        );
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("rebalancer shutting down");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("rebalance iteration failed: {e}");
                    }
                }
            }
        }
    }

    pub(crate) async fn tick(&self) -> Result<(), StrategyError> {
        let snapshot = self.state.snapshot().await;

        // Allocation fractions against an incomplete valuation would
        // manufacture deviations, so any missing price skips the cycle.
        let mut prices = HashMap::new();
        for asset in self.config.targets.keys() {
            match self.market.price(asset).await {
                Ok(price) if price > Decimal::ZERO => {
                    prices.insert(asset.clone(), price);
                }
                Ok(_) => {
                    warn!("non-positive price for {asset}, rebalance cycle skipped");
                    return Ok(());
                }
                Err(MarketDataError::NoData(_)) => {
                    warn!("no price for {asset}, rebalance cycle skipped");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let total: Decimal = self
            .config
            .targets
            .keys()
            .map(|asset| snapshot.balance(asset) * prices[asset])
            .sum();
        if total <= Decimal::ZERO {
            return Ok(());
        }

        for (asset, target) in &self.config.targets {
            let price = prices[asset];
            let fraction = snapshot.balance(asset) * price / total;
            let deviation = fraction - *target;
            if deviation.abs() <= self.config.band {
                continue;
            }

            let quantity = (deviation.abs() * total / price).round_dp(9);
            if quantity.is_zero() {
                continue;
            }
            let side = if deviation > Decimal::ZERO {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            };
            info!(
                "rebalancing {asset}: allocation {:.4} vs target {:.4}, {side} {quantity}",
                fraction.to_f64().unwrap_or_default(),
                target.to_f64().unwrap_or_default()
            );
            // One strategy's failed trade must not stop the other legs.
            if let Err(e) = self
                .executor
                .execute_trade(TradeIntent {
                    asset: asset.clone(),
                    amount: quantity,
                    side,
                    price,
                })
                .await
            {
                error!("corrective trade for {asset} failed: {e}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::retry::RetryConfig;
    use crate::engine::submit::MockTransactionSubmitter;
    use crate::market::MockMarketDataSource;

    fn targets() -> HashMap<String, Decimal> {
        HashMap::from([
            ("ETH".to_string(), Decimal::new(5, 1)),
            ("USDC".to_string(), Decimal::new(5, 1)),
        ])
    }

    fn config(band: Decimal) -> RebalanceConfig {
        RebalanceConfig {
            targets: targets(),
            band,
            interval: Duration::from_secs(300),
        }
    }

    fn unit_priced_market() -> Arc<dyn MarketDataSource> {
        let mut market = MockMarketDataSource::new();
        market.expect_price().returning(|_| Ok(Decimal::ONE));
        Arc::new(market)
    }

    async fn strategy(
        band: Decimal,
        eth: i64,
        usdc: i64,
        submitter: MockTransactionSubmitter,
    ) -> (Arc<TradingState>, RebalanceStrategy) {
        let state = Arc::new(TradingState::new());
        state
            .adjust_portfolio("ETH", Decimal::new(eth, 0))
            .await
            .unwrap();
        state
            .adjust_portfolio("USDC", Decimal::new(usdc, 0))
            .await
            .unwrap();
        let executor = Arc::new(TradeExecutor::new(
            Arc::clone(&state),
            Arc::new(submitter),
            RetryConfig::default(),
        ));
        let strategy = RebalanceStrategy::new(
            config(band),
            unit_priced_market(),
            Arc::clone(&state),
            executor,
        );
        (state, strategy)
    }

    #[tokio::test]
    async fn allocation_within_band_issues_no_trades() {
        let mut submitter = MockTransactionSubmitter::new();
        submitter.expect_submit().times(0);
        // 52/48 against a 50/50 target is inside a 5% band.
        let (_state, strategy) = strategy(Decimal::new(5, 2), 52, 48, submitter).await;
        strategy.tick().await.unwrap();
    }

    #[tokio::test]
    async fn deviation_equal_to_band_issues_no_trades() {
        let mut submitter = MockTransactionSubmitter::new();
        submitter.expect_submit().times(0);
        // 55/45 is exactly a 0.05 deviation; the band is exclusive.
        let (_state, strategy) = strategy(Decimal::new(5, 2), 55, 45, submitter).await;
        strategy.tick().await.unwrap();
    }

    #[tokio::test]
    async fn drift_beyond_band_is_corrected_per_asset() {
        let mut submitter = MockTransactionSubmitter::new();
        submitter
            .expect_submit()
            .times(2)
            .returning({
                let mut calls = 0u32;
                move |intent| {
                    calls += 1;
                    match intent.asset.as_str() {
                        "ETH" => assert_eq!(intent.side, OrderSide::Sell),
                        _ => assert_eq!(intent.side, OrderSide::Buy),
                    }
                    assert_eq!(intent.amount, Decimal::new(30, 0));
                    Ok(format!("tx-{calls}"))
                }
            });
        // 80/20 against 50/50: each asset is 30 units of value off target.
        let (_state, strategy) = strategy(Decimal::new(5, 2), 80, 20, submitter).await;
        strategy.tick().await.unwrap();
    }

    #[tokio::test]
    async fn missing_price_skips_the_whole_cycle() {
        let mut submitter = MockTransactionSubmitter::new();
        submitter.expect_submit().times(0);

        let state = Arc::new(TradingState::new());
        state
            .adjust_portfolio("ETH", Decimal::new(100, 0))
            .await
            .unwrap();
        let mut market = MockMarketDataSource::new();
        market
            .expect_price()
            .returning(|asset| Err(MarketDataError::NoData(asset.to_string())));
        let executor = Arc::new(TradeExecutor::new(
            Arc::clone(&state),
            Arc::new(submitter),
            RetryConfig::default(),
        ));
        let strategy = RebalanceStrategy::new(
            config(Decimal::new(5, 2)),
            Arc::new(market),
            state,
            executor,
        );
        strategy.tick().await.unwrap();
    }
}
