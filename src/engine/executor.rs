use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use rust_decimal::Decimal;

use super::error::ExecutionError;
use super::retry::{RetryConfig, RetryHandler};
use super::submit::{TradeIntent, TransactionSubmitter};
use crate::state::{OpenOrder, OrderSide, OrderState, TradeRecord, TradingState};

/// The single fund-moving primitive. Every strategy routes its trades through
/// here; none touches `TradingState` directly.
///
/// A trade is: enabled-gate, funds check, retried submission, then one atomic
/// commit of portfolio delta + history. The portfolio is only mutated after
/// the submission is accepted, and per-asset history order is commit order.
pub struct TradeExecutor {
    state: Arc<TradingState>,
    submitter: Arc<dyn TransactionSubmitter>,
    retry_handler: RetryHandler,
    trading_enabled: AtomicBool,
}

impl TradeExecutor {
    pub fn new(
        state: Arc<TradingState>,
        submitter: Arc<dyn TransactionSubmitter>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            state,
            submitter,
            retry_handler: RetryHandler::new(retry_config),
            trading_enabled: AtomicBool::new(true),
        }
    }

    pub fn trading_enabled(&self) -> bool {
        self.trading_enabled.load(Ordering::Relaxed)
    }

    /// Cooperative kill switch: takes effect on the next `execute_trade`
    /// call; in-flight submissions are not rolled back.
    pub fn set_trading_enabled(&self, enabled: bool) {
        self.trading_enabled.store(enabled, Ordering::Relaxed);
    }

    pub async fn execute_trade(&self, intent: TradeIntent) -> Result<String, ExecutionError> {
        if !self.trading_enabled() {
            return Err(ExecutionError::Cancelled);
        }

        if intent.side == OrderSide::Sell {
            let available = self.state.balance(&intent.asset).await;
            if available < intent.amount {
                return Err(ExecutionError::InsufficientFunds {
                    asset: intent.asset,
                    requested: intent.amount,
                    available,
                });
            }
        }

        let tx_id = self.submit_with_retry(&intent).await?;

        let delta = match intent.side {
            OrderSide::Buy => intent.amount,
            OrderSide::Sell => -intent.amount,
        };
        let record = TradeRecord {
            timestamp: Utc::now(),
            pair: format!("{}/USD", intent.asset),
            side: intent.side,
            quantity: intent.amount,
            price: intent.price,
            tx_id: tx_id.clone(),
        };
        match self.state.commit_trade(&intent.asset, delta, record).await {
            Ok(()) => {
                info!(
                    "trade committed: {} {} {} @ {} ({tx_id})",
                    intent.side, intent.amount, intent.asset, intent.price
                );
                Ok(tx_id)
            }
            Err(e) => {
                // Submission went out but the commit lost a race; the store
                // was left untouched, which must be visible in the logs.
                error!("trade {tx_id} accepted by network but not committed: {e}");
                Err(e.into())
            }
        }
    }

    /// Submit and record a limit order as Pending. Used by market making;
    /// the created order is transitioned only by its owning strategy.
    pub async fn place_limit_order(
        &self,
        pair: &str,
        asset: &str,
        side: OrderSide,
        limit_price: Decimal,
        quantity: Decimal,
    ) -> Result<String, ExecutionError> {
        if !self.trading_enabled() {
            return Err(ExecutionError::Cancelled);
        }

        let intent = TradeIntent {
            asset: asset.to_string(),
            amount: quantity,
            side,
            price: limit_price,
        };
        let tx_id = self.submit_with_retry(&intent).await?;

        let order = OpenOrder {
            id: tx_id.clone(),
            pair: pair.to_string(),
            side,
            limit_price,
            quantity,
            state: OrderState::Pending,
            created_at: Utc::now(),
        };
        match self.state.record_order(order).await {
            Ok(()) => {
                info!("limit {side} placed on {pair}: {quantity} @ {limit_price} ({tx_id})");
                Ok(tx_id)
            }
            Err(e) => {
                error!("limit order {tx_id} submitted but not recorded: {e}");
                Err(e.into())
            }
        }
    }

    async fn submit_with_retry(&self, intent: &TradeIntent) -> Result<String, ExecutionError> {
        let submitter = Arc::clone(&self.submitter);
        let intent = intent.clone();
        self.retry_handler
            .retry(move || {
                let submitter = Arc::clone(&submitter);
                let intent = intent.clone();
                async move { submitter.submit(&intent).await }
            })
            .await
            .map_err(|source| ExecutionError::SubmissionFailed {
                attempts: self.retry_handler.max_attempts(),
                source,
            })
    }
}
