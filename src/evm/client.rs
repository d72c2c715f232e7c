//! EVM Client Module
//!
//! Client for communicating with the destination chain node via its JSON-RPC
//! API. It serves log polling, receipt lookups and contract reads.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use super::{parse_hex_u64, EvmClient, EvmLog, EvmTransaction, TransactionReceipt};
use crate::error::{BridgeError, BridgeResult};

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Client for communicating with EVM-compatible blockchain nodes via JSON-RPC
pub struct JsonRpcEvmClient {
    client: Client,
    /// Base URL of the EVM node (e.g., "http://127.0.0.1:8545")
    base_url: String,
}

impl JsonRpcEvmClient {
    /// Creates a new EVM client for the given node URL
    ///
    /// # Arguments
    ///
    /// * `node_url` - Base URL of the EVM node
    /// * `timeout` - Per-request timeout
    pub fn new(node_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: node_url.to_string(),
        })
    }

    /// Sends one JSON-RPC request. A missing `result` is returned as `None`.
    async fn rpc_call<T: DeserializeOwned>(&self, method: &str, params: Vec<serde_json::Value>) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, self.base_url))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response from {}", method, self.base_url))?;

        if let Some(error) = response.error {
            return Err(anyhow::anyhow!(
                "JSON-RPC error from {}: {} (code: {})",
                self.base_url,
                error.message,
                error.code
            ));
        }

        Ok(response.result)
    }

    async fn rpc_quantity(&self, method: &str) -> BridgeResult<u64> {
        let value: String = self
            .rpc_call(method, vec![])
            .await
            .map_err(BridgeError::chain_rpc)?
            .ok_or_else(|| BridgeError::ChainRpc(format!("No result in {} response", method)))?;
        parse_hex_u64(&value)
    }
}

fn normalize_hash(hash: &str) -> String {
    if hash.starts_with("0x") {
        hash.to_string()
    } else {
        format!("0x{}", hash)
    }
}

#[async_trait]
impl EvmClient for JsonRpcEvmClient {
    async fn get_block_number(&self) -> BridgeResult<u64> {
        self.rpc_quantity("eth_blockNumber").await
    }

    async fn get_chain_id(&self) -> BridgeResult<u64> {
        self.rpc_quantity("eth_chainId").await
    }

    async fn get_transaction_by_hash(&self, hash: &str) -> BridgeResult<Option<EvmTransaction>> {
        self.rpc_call("eth_getTransactionByHash", vec![serde_json::json!(normalize_hash(hash))])
            .await
            .map_err(BridgeError::chain_rpc)
    }

    async fn get_transaction_receipt(&self, hash: &str) -> BridgeResult<Option<TransactionReceipt>> {
        self.rpc_call("eth_getTransactionReceipt", vec![serde_json::json!(normalize_hash(hash))])
            .await
            .map_err(BridgeError::chain_rpc)
    }

    async fn get_logs(&self, address: &str, topic0: &str, from_block: u64, to_block: u64) -> BridgeResult<Vec<EvmLog>> {
        let filter = serde_json::json!({
            "address": address,
            "topics": [topic0],
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
        });
        let logs: Option<Vec<EvmLog>> = self
            .rpc_call("eth_getLogs", vec![filter])
            .await
            .map_err(BridgeError::chain_rpc)?;
        Ok(logs.unwrap_or_default())
    }

    async fn call(&self, to: &str, data: &[u8]) -> BridgeResult<Vec<u8>> {
        let call = serde_json::json!({
            "to": to,
            "data": format!("0x{}", hex::encode(data)),
        });
        let result: String = self
            .rpc_call("eth_call", vec![call, serde_json::json!("latest")])
            .await
            .map_err(BridgeError::chain_rpc)?
            .ok_or_else(|| BridgeError::ChainRpc("No result in eth_call response".to_string()))?;
        hex::decode(result.strip_prefix("0x").unwrap_or(&result))
            .map_err(|e| BridgeError::ChainRpc(format!("invalid eth_call result: {}", e)))
    }
}
