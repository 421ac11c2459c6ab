use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::state::OrderSide;

/// A trade decision handed to the signer/RPC capability. `price` is the
/// decision price: the quote the strategy acted on, recorded into history
/// once the submission is accepted.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeIntent {
    pub asset: String,
    pub amount: Decimal,
    pub side: OrderSide,
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum SubmitError {
    #[error("rejected by network: {0}")]
    RejectedByNetwork(String),

    #[error("transaction submission timed out")]
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitErrorKind {
    RejectedByNetwork,
    Timeout,
}

impl SubmitError {
    pub fn kind(&self) -> SubmitErrorKind {
        match self {
            SubmitError::RejectedByNetwork(_) => SubmitErrorKind::RejectedByNetwork,
            SubmitError::Timeout => SubmitErrorKind::Timeout,
        }
    }
}

/// Signer/RPC capability: build, sign and submit one transaction, returning
/// its id. Treated as unreliable; callers wrap every submission in a
/// `RetryHandler`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, intent: &TradeIntent) -> Result<String, SubmitError>;
}
