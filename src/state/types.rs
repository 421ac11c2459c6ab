use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderState {
    Pending,
    Filled,
    Cancelled,
    Failed,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Failed
        )
    }
}

#[derive(Clone, Debug)]
pub struct OpenOrder {
    pub id: String,
    pub pair: String,
    pub side: OrderSide,
    pub limit_price: Decimal,
    pub quantity: Decimal,
    pub state: OrderState,
    pub created_at: DateTime<Utc>,
}

/// One executed-trade record. The history is append-only; order within one
/// asset reflects commit order, not submission order.
#[derive(Clone, Debug)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub pair: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub tx_id: String,
}

/// Coherent point-in-time copy of balances and open orders, taken under the
/// state lock in one step.
#[derive(Clone, Debug, Default)]
pub struct PortfolioSnapshot {
    pub balances: HashMap<String, Decimal>,
    pub open_orders: Vec<OpenOrder>,
}

impl PortfolioSnapshot {
    pub fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn pending_orders<'a>(
        &'a self,
        pair: &'a str,
    ) -> impl Iterator<Item = &'a OpenOrder> + 'a {
        self.open_orders
            .iter()
            .filter(move |o| o.pair == pair && o.state == OrderState::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum StateError {
    #[error("insufficient funds for {asset}: requested {requested}, available {available}")]
    InsufficientFunds {
        asset: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("invalid order state for {id}: {reason}")]
    InvalidOrderState { id: String, reason: String },
}
