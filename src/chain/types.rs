use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::ScamVerdict;

/// One transfer observed in a block. `amount` is in exact native units
/// (wei-style integer), converted to a decimal quantity only at valuation.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservedTransaction {
    pub sender: String,
    pub receiver: String,
    pub amount: u128,
    /// Token/contract reference of the destination, used for price lookup.
    pub token: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhaleWallet {
    pub address: String,
    pub first_seen: DateTime<Utc>,
}

/// Notification emitted once per newly detected whale. Model fields are
/// enrichment only and stay `None` when a model is unavailable.
#[derive(Clone, Debug)]
pub struct WhaleAlert {
    pub wallet: WhaleWallet,
    pub token: String,
    pub usd_value: Decimal,
    pub scam_verdict: Option<ScamVerdict>,
    pub predicted_price: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ChainError {
    #[error("chain unavailable: {0}")]
    Unavailable(String),
}

/// Chain access capability: deliver the transfers of the next unseen block.
/// An empty vector means no new block since the previous poll.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn poll_next_block(&self) -> Result<Vec<ObservedTransaction>, ChainError>;
}
