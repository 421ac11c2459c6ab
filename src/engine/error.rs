use rust_decimal::Decimal;
use thiserror::Error;

use super::submit::SubmitError;
use crate::market::MarketDataError;
use crate::state::StateError;

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Trading is switched off; nothing was submitted or mutated.
    #[error("trading is disabled")]
    Cancelled,

    #[error("insufficient funds for {asset}: requested {requested}, available {available}")]
    InsufficientFunds {
        asset: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("submission failed after {attempts} attempt(s): {source}")]
    SubmissionFailed {
        attempts: u32,
        #[source]
        source: SubmitError,
    },

    #[error("state commit failed: {0}")]
    CommitFailed(#[from] StateError),
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
