use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::submit::{SubmitError, TradeIntent, TransactionSubmitter};
use crate::config::SigningKey;

#[derive(Debug, Serialize)]
struct SwapRequest<'a> {
    wallet: &'a str,
    asset: &'a str,
    side: String,
    amount: Decimal,
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    tx_id: String,
}

/// Live submitter: a delegated-signing swap API. The service signs with the
/// wallet it holds for the authenticated key and returns the transaction id.
pub struct SwapApiClient {
    base_url: String,
    wallet_address: String,
    signing_key: SigningKey,
    http_client: reqwest::Client,
    request_timeout: Duration,
}

impl SwapApiClient {
    pub fn new(
        base_url: String,
        wallet_address: String,
        signing_key: SigningKey,
        request_timeout: Duration,
    ) -> Self {
        Self {
            base_url,
            wallet_address,
            signing_key,
            http_client: reqwest::Client::new(),
            request_timeout,
        }
    }
}

#[async_trait]
impl TransactionSubmitter for SwapApiClient {
    async fn submit(&self, intent: &TradeIntent) -> Result<String, SubmitError> {
        let url = format!("{}/swap", self.base_url);
        let body = SwapRequest {
            wallet: &self.wallet_address,
            asset: &intent.asset,
            side: intent.side.to_string(),
            amount: intent.amount,
            price: intent.price,
        };

        let request = self
            .http_client
            .post(&url)
            .header("x-api-key", self.signing_key.expose())
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| SubmitError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    SubmitError::Timeout
                } else {
                    SubmitError::RejectedByNetwork(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(SubmitError::RejectedByNetwork(format!("{status}: {detail}")));
        }

        let body: SwapResponse = response
            .json()
            .await
            .map_err(|e| SubmitError::RejectedByNetwork(e.to_string()))?;
        Ok(body.tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_response_parses() {
        let raw = r#"{"tx_id":"0xabc123"}"#;
        let parsed: SwapResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.tx_id, "0xabc123");
    }
}
