use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use rust_decimal::Decimal;
use tokio::sync::watch;

use super::error::StrategyError;
use super::executor::TradeExecutor;
use crate::market::{MarketDataError, MarketDataSource};
use crate::state::{OrderSide, TradingState};

#[derive(Clone, Debug)]
pub struct MarketMakerConfig {
    pub pair: String,
    pub asset: String,
    /// Relative bid/ask spread that must be exceeded before quoting.
    pub spread_target: Decimal,
    pub order_size: Decimal,
    pub interval: Duration,
}

/// Quotes both sides around the mid price whenever the book spread is wider
/// than the target. An order from a previous tick that is still Pending is
/// left alone; the strategy never stacks duplicates on one side.
pub struct MarketMakerStrategy {
    config: MarketMakerConfig,
    market: Arc<dyn MarketDataSource>,
    state: Arc<TradingState>,
    executor: Arc<TradeExecutor>,
}

impl MarketMakerStrategy {
    pub fn new(
        config: MarketMakerConfig,
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
        info!("market maker started on {}", self.config.pair);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("market maker shutting down");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("market making iteration failed: {e}");
                    }
                }
            }
        }
    }

    pub(crate) async fn tick(&self) -> Result<(), StrategyError> {
        let pair = &self.config.pair;
        let book = match self.market.order_book(pair).await {
            Ok(book) => book,
            Err(MarketDataError::NoData(_)) => {
                debug!("no book for {pair}, tick skipped");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) else {
            debug!("one-sided book on {pair}, tick skipped");
            return Ok(());
        };

        let two = Decimal::new(2, 0);
        let mid = (bid + ask) / two;
        if mid <= Decimal::ZERO {
            return Ok(());
        }
        let spread = (ask - bid) / mid;
        if spread <= self.config.spread_target {
            return Ok(());
        }

        let half_target = self.config.spread_target / two;
        let buy_price = mid * (Decimal::ONE - half_target);
        let sell_price = mid * (Decimal::ONE + half_target);

        let snapshot = self.state.snapshot().await;
        let has_pending_buy = snapshot
            .pending_orders(pair)
            .any(|o| o.side == OrderSide::Buy);
        let has_pending_sell = snapshot
            .pending_orders(pair)
            .any(|o| o.side == OrderSide::Sell);

        if !has_pending_buy {
            self.executor
                .place_limit_order(
                    pair,
                    &self.config.asset,
                    OrderSide::Buy,
                    buy_price,
                    self.config.order_size,
                )
                .await?;
        }
        if !has_pending_sell {
            self.executor
                .place_limit_order(
                    pair,
                    &self.config.asset,
                    OrderSide::Sell,
                    sell_price,
                    self.config.order_size,
                )
                .await?;
        }
        Ok(())
    }
}
