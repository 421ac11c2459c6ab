//! Scoring-model capabilities. The models themselves (how a price gets
//! predicted, how a token gets flagged) are external; this crate consumes
//! them as pure functions and degrades when they are unavailable.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
#[error("model unavailable: {0}")]
pub struct ModelUnavailable(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScamVerdict {
    Legitimate,
    Suspected,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScamClassifier: Send + Sync {
    async fn classify(&self, token: &str) -> Result<ScamVerdict, ModelUnavailable>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceModel: Send + Sync {
    /// Predicted near-term USD price for an asset.
    async fn predict(&self, asset: &str) -> Result<Decimal, ModelUnavailable>;
}
