use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::types::{ChainClient, ChainError, ObservedTransaction};

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    number: String,
    transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    from: String,
    to: Option<String>,
    value: String,
}

/// Chain client speaking EVM JSON-RPC over HTTP. Keeps a cursor on the last
/// delivered block so each block's transfers are consumed exactly once.
pub struct JsonRpcChainClient {
    endpoint: String,
    http_client: reqwest::Client,
    last_block: Mutex<Option<u64>>,
}

impl JsonRpcChainClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            http_client: reqwest::Client::new(),
            last_block: Mutex::new(None),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ChainError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let envelope: RpcEnvelope<T> = self
            .http_client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChainError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChainError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| ChainError::Unavailable(e.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(ChainError::Unavailable(format!(
                "rpc error {}: {}",
                error.code, error.message
            )));
        }
        envelope
            .result
            .ok_or_else(|| ChainError::Unavailable("empty rpc result".to_string()))
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn poll_next_block(&self) -> Result<Vec<ObservedTransaction>, ChainError> {
        let block: RpcBlock = self
            .call("eth_getBlockByNumber", json!(["latest", true]))
            .await?;
        let number = parse_hex_u64(&block.number)
            .ok_or_else(|| ChainError::Unavailable(format!("bad block number {}", block.number)))?;

        {
            let mut last = self.last_block.lock().await;
            if *last == Some(number) {
                return Ok(Vec::new());
            }
            *last = Some(number);
        }

        let transfers: Vec<ObservedTransaction> = block
            .transactions
            .into_iter()
            .filter_map(|tx| {
                // Contract creations carry no destination; nothing to value.
                let to = tx.to?;
                let amount = parse_hex_u128(&tx.value)?;
                Some(ObservedTransaction {
                    sender: tx.from,
                    receiver: to.clone(),
                    amount,
                    token: to,
                })
            })
            .collect();
        debug!("block {number}: {} transfers", transfers.len());
        Ok(transfers)
    }
}

fn parse_hex_u64(value: &str) -> Option<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16).ok()
}

fn parse_hex_u128(value: &str) -> Option<u128> {
    u128::from_str_radix(value.trim_start_matches("0x"), 16).ok()
}
