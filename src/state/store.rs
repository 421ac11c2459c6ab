use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::types::{OpenOrder, OrderState, PortfolioSnapshot, StateError, TradeRecord};

#[derive(Debug, Default)]
struct StateInner {
    balances: HashMap<String, Decimal>,
    orders: HashMap<String, OpenOrder>,
    history: Vec<TradeRecord>,
}

/// Shared store of portfolio balances, open orders and executed-trade history.
///
/// All mutation goes through the methods below. Each method takes the single
/// internal lock once, validates the whole operation, then applies it whole;
/// a concurrent reader never observes a half-applied update. The lock is only
/// held for the in-memory step, never across network calls or sleeps.
#[derive(Debug, Default)]
pub struct TradingState {
    inner: Mutex<StateInner>,
}

impl TradingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a signed delta to an asset balance. Fails without mutating if
    /// the result would be negative.
    pub async fn adjust_portfolio(&self, asset: &str, delta: Decimal) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        Self::apply_delta(&mut inner.balances, asset, delta)
    }

    pub async fn record_order(&self, order: OpenOrder) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        if inner.orders.contains_key(&order.id) {
            return Err(StateError::InvalidOrderState {
                id: order.id,
                reason: "order id already recorded".to_string(),
            });
        }
        inner.orders.insert(order.id.clone(), order);
        Ok(())
    }

    /// Move an order to a new state. Missing orders and transitions out of a
    /// terminal state fail with `InvalidOrderState`, leaving it unchanged.
    pub async fn transition_order(
        &self,
        id: &str,
        new_state: OrderState,
    ) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        let order = inner
            .orders
            .get_mut(id)
            .ok_or_else(|| StateError::InvalidOrderState {
                id: id.to_string(),
                reason: "order not found".to_string(),
            })?;
        if order.state.is_terminal() {
            return Err(StateError::InvalidOrderState {
                id: id.to_string(),
                reason: format!("order already terminal ({:?})", order.state),
            });
        }
        order.state = new_state;
        Ok(())
    }

    pub async fn append_history(&self, record: TradeRecord) {
        let mut inner = self.inner.lock().await;
        inner.history.push(record);
    }

    /// Commit an executed trade: portfolio delta and history append as one
    /// indivisible unit. A delta that would drive the balance negative fails
    /// the whole commit; no history entry is written.
    pub async fn commit_trade(
        &self,
        asset: &str,
        delta: Decimal,
        record: TradeRecord,
    ) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        Self::apply_delta(&mut inner.balances, asset, delta)?;
        inner.history.push(record);
        Ok(())
    }

    pub async fn balance(&self, asset: &str) -> Decimal {
        let inner = self.inner.lock().await;
        inner.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Point-in-time copy of balances and open orders under one lock take.
    pub async fn snapshot(&self) -> PortfolioSnapshot {
        let inner = self.inner.lock().await;
        PortfolioSnapshot {
            balances: inner.balances.clone(),
            open_orders: inner.orders.values().cloned().collect(),
        }
    }

    pub async fn history(&self) -> Vec<TradeRecord> {
        let inner = self.inner.lock().await;
        inner.history.clone()
    }

    fn apply_delta(
        balances: &mut HashMap<String, Decimal>,
        asset: &str,
        delta: Decimal,
    ) -> Result<(), StateError> {
        let current = balances.get(asset).copied().unwrap_or(Decimal::ZERO);
        let updated = current + delta;
        if updated < Decimal::ZERO {
            return Err(StateError::InsufficientFunds {
                asset: asset.to_string(),
                requested: -delta,
                available: current,
            });
        }
        balances.insert(asset.to_string(), updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::state::OrderSide;

    fn order(id: &str, state: OrderState) -> OpenOrder {
        OpenOrder {
            id: id.to_string(),
            pair: "SOL/USD".to_string(),
            side: OrderSide::Buy,
            limit_price: Decimal::new(100, 0),
            quantity: Decimal::ONE,
            state,
            created_at: Utc::now(),
        }
    }

    fn record(pair: &str) -> TradeRecord {
        TradeRecord {
            timestamp: Utc::now(),
            pair: pair.to_string(),
            side: OrderSide::Buy,
            quantity: Decimal::ONE,
            price: Decimal::new(100, 0),
            tx_id: "tx-1".to_string(),
        }
    }

    #[tokio::test]
    async fn concurrent_adjustments_lose_no_updates() {
        let state = Arc::new(TradingState::new());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let state = Arc::clone(&state);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    state
                        .adjust_portfolio("SOL", Decimal::ONE)
                        .await
                        .expect("positive delta cannot fail");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }
        assert_eq!(state.balance("SOL").await, Decimal::new(1000, 0));
    }

    #[tokio::test]
    async fn negative_balance_is_rejected_without_mutation() {
        let state = TradingState::new();
        state
            .adjust_portfolio("SOL", Decimal::new(5, 0))
            .await
            .unwrap();

        let err = state
            .adjust_portfolio("SOL", Decimal::new(-6, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::InsufficientFunds { .. }));
        assert_eq!(state.balance("SOL").await, Decimal::new(5, 0));
    }

    #[tokio::test]
    async fn transition_on_missing_order_fails() {
        let state = TradingState::new();
        let err = state
            .transition_order("nope", OrderState::Filled)
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidOrderState { .. }));
    }

    #[tokio::test]
    async fn transition_out_of_terminal_state_fails() {
        let state = TradingState::new();
        state.record_order(order("o1", OrderState::Pending)).await.unwrap();
        state
            .transition_order("o1", OrderState::Filled)
            .await
            .unwrap();

        let err = state
            .transition_order("o1", OrderState::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidOrderState { .. }));

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.open_orders[0].state, OrderState::Filled);
    }

    #[tokio::test]
    async fn duplicate_order_id_is_rejected() {
        let state = TradingState::new();
        state.record_order(order("o1", OrderState::Pending)).await.unwrap();
        let err = state
            .record_order(order("o1", OrderState::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidOrderState { .. }));
    }

    #[tokio::test]
    async fn failed_commit_writes_no_history() {
        let state = TradingState::new();
        let err = state
            .commit_trade("SOL", Decimal::new(-1, 0), record("SOL/USD"))
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::InsufficientFunds { .. }));
        assert!(state.history().await.is_empty());
    }

    #[tokio::test]
    async fn commit_applies_delta_and_history_together() {
        let state = TradingState::new();
        state
            .commit_trade("SOL", Decimal::new(2, 0), record("SOL/USD"))
            .await
            .unwrap();
        assert_eq!(state.balance("SOL").await, Decimal::new(2, 0));
        assert_eq!(state.history().await.len(), 1);
    }
}
