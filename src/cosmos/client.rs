//! Source Chain REST Client
//!
//! Talks to the source chain through its REST gateway (the `/cosmos/...`
//! LCD routes). Event searches are paginated 100 transactions per page.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{normalize_tx_hash, Account, CosmosClient, GasInfo, SendMessage, TxEvent, TxResponse};
use crate::crypto::bech32_decode;
use crate::error::{BridgeError, BridgeResult};

const PAGE_LIMIT: u64 = 100;
const MAX_PAGES: u64 = 500;

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

#[derive(Debug, Deserialize)]
struct LatestBlockResponse {
    block: Block,
}

#[derive(Debug, Deserialize)]
struct Block {
    header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    height: String,
}

#[derive(Debug, Deserialize)]
struct NodeInfoResponse {
    default_node_info: DefaultNodeInfo,
}

#[derive(Debug, Deserialize)]
struct DefaultNodeInfo {
    network: String,
}

#[derive(Debug, Deserialize)]
struct SearchTxsResponse {
    #[serde(default)]
    tx_responses: Vec<LcdTxResponse>,
    #[serde(default)]
    total: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetTxResponse {
    tx_response: LcdTxResponse,
}

#[derive(Debug, Deserialize)]
struct LcdTxResponse {
    height: String,
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    events: Vec<TxEvent>,
    #[serde(default)]
    tx: Option<LcdTx>,
}

#[derive(Debug, Deserialize)]
struct LcdTx {
    body: LcdTxBody,
}

#[derive(Debug, Deserialize)]
struct LcdTxBody {
    #[serde(default)]
    memo: String,
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: LcdAccount,
}

#[derive(Debug, Deserialize)]
struct LcdAccount {
    account_number: String,
    sequence: String,
}

#[derive(Debug, Serialize)]
struct SimulateRequest {
    tx_bytes: String,
}

#[derive(Debug, Deserialize)]
struct SimulateResponse {
    gas_info: LcdGasInfo,
}

#[derive(Debug, Deserialize)]
struct LcdGasInfo {
    gas_wanted: String,
    gas_used: String,
}

#[derive(Debug, Serialize)]
struct BroadcastRequest {
    tx_bytes: String,
    mode: String,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    tx_response: BroadcastTxResponse,
}

#[derive(Debug, Deserialize)]
struct BroadcastTxResponse {
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
}

impl LcdTxResponse {
    fn into_tx_response(self) -> Result<TxResponse> {
        let height = self
            .height
            .parse::<u64>()
            .with_context(|| format!("Invalid tx height {}", self.height))?;
        let (memo, raw_messages) = match self.tx {
            Some(tx) => (tx.body.memo, tx.body.messages),
            None => (String::new(), Vec::new()),
        };
        let messages = raw_messages
            .into_iter()
            .filter(|m| m.get("@type").and_then(|t| t.as_str()) == Some(super::proto::MSG_SEND_TYPE_URL))
            .filter_map(|m| serde_json::from_value::<SendMessage>(m).ok())
            .collect();

        Ok(TxResponse {
            hash: normalize_tx_hash(&self.txhash),
            height,
            code: self.code,
            memo,
            events: self.events,
            messages,
        })
    }
}

// ============================================================================
// CLIENT IMPLEMENTATION
// ============================================================================

/// REST gateway client for the source chain.
pub struct LcdCosmosClient {
    client: Client,
    /// Base URL of the REST gateway (e.g., "http://127.0.0.1:1317")
    base_url: String,
    bech32_prefix: String,
}

impl LcdCosmosClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - REST gateway URL
    /// * `bech32_prefix` - Address prefix used to reject foreign addresses before dispatch
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, bech32_prefix: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bech32_prefix: bech32_prefix.to_string(),
        })
    }

    fn check_address(&self, address: &str) -> BridgeResult<()> {
        bech32_decode(&self.bech32_prefix, address)
            .map(|_| ())
            .map_err(|e| BridgeError::Validation(format!("{:#}", e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Request to {} failed with {}: {}", url, status, body));
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Request to {} failed with {}: {}", url, status, body));
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// Pages through a tx event search until `total` is reached or the page cap hits.
    async fn search_txs(&self, query: String) -> Result<Vec<TxResponse>> {
        let mut txs = Vec::new();
        let mut page = 1u64;

        loop {
            let params = [
                ("query", query.clone()),
                ("page", page.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("order_by", "ORDER_BY_ASC".to_string()),
            ];
            let response: SearchTxsResponse = self.get_json("/cosmos/tx/v1beta1/txs", &params).await?;
            let received = response.tx_responses.len();
            for tx in response.tx_responses {
                txs.push(tx.into_tx_response()?);
            }

            let total = response
                .total
                .as_deref()
                .and_then(|t| t.parse::<u64>().ok())
                .unwrap_or(0);
            if received == 0 || txs.len() as u64 >= total || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }

        debug!("[COSMOS CLIENT] query {} returned {} txs", query, txs.len());
        Ok(txs)
    }
}

#[async_trait]
impl CosmosClient for LcdCosmosClient {
    async fn get_latest_block_height(&self) -> BridgeResult<u64> {
        let response: LatestBlockResponse = self
            .get_json("/cosmos/base/tendermint/v1beta1/blocks/latest", &[])
            .await
            .map_err(BridgeError::chain_rpc)?;
        response
            .block
            .header
            .height
            .parse()
            .map_err(|e| BridgeError::ChainRpc(format!("invalid block height: {}", e)))
    }

    async fn get_chain_id(&self) -> BridgeResult<String> {
        let response: NodeInfoResponse = self
            .get_json("/cosmos/base/tendermint/v1beta1/node_info", &[])
            .await
            .map_err(BridgeError::chain_rpc)?;
        Ok(response.default_node_info.network)
    }

    async fn get_txs_sent_to_address_after_height(&self, address: &str, height: u64) -> BridgeResult<Vec<TxResponse>> {
        self.check_address(address)?;
        let query = format!("transfer.recipient='{}' AND tx.height>={}", address, height);
        self.search_txs(query).await.map_err(BridgeError::chain_rpc)
    }

    async fn get_txs_sent_from_address_after_height(
        &self,
        address: &str,
        height: u64,
    ) -> BridgeResult<Vec<TxResponse>> {
        self.check_address(address)?;
        let query = format!("message.sender='{}' AND tx.height>={}", address, height);
        self.search_txs(query).await.map_err(BridgeError::chain_rpc)
    }

    async fn get_tx(&self, hash: &str) -> BridgeResult<Option<TxResponse>> {
        let hash = hash.trim_start_matches("0x").to_uppercase();
        let url = format!("{}/cosmos/tx/v1beta1/txs/{}", self.base_url, hash);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))
            .map_err(BridgeError::chain_rpc)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response from {}", url))
            .map_err(BridgeError::chain_rpc)?;
        if status == StatusCode::NOT_FOUND || (!status.is_success() && body.contains("not found")) {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BridgeError::ChainRpc(format!(
                "Request to {} failed with {}: {}",
                url, status, body
            )));
        }

        let parsed: GetTxResponse = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse response from {}", url))
            .map_err(BridgeError::chain_rpc)?;
        parsed
            .tx_response
            .into_tx_response()
            .map(Some)
            .map_err(BridgeError::chain_rpc)
    }

    async fn get_account(&self, address: &str) -> BridgeResult<Account> {
        self.check_address(address)?;
        let path = format!("/cosmos/auth/v1beta1/accounts/{}", address);
        let response: AccountResponse = self.get_json(&path, &[]).await.map_err(BridgeError::chain_rpc)?;
        let account_number = response
            .account
            .account_number
            .parse()
            .map_err(|e| BridgeError::ChainRpc(format!("invalid account number: {}", e)))?;
        let sequence = response
            .account
            .sequence
            .parse()
            .map_err(|e| BridgeError::ChainRpc(format!("invalid account sequence: {}", e)))?;
        Ok(Account {
            account_number,
            sequence,
        })
    }

    async fn simulate(&self, tx_bytes: &[u8]) -> BridgeResult<GasInfo> {
        let request = SimulateRequest {
            tx_bytes: BASE64.encode(tx_bytes),
        };
        let response: SimulateResponse = self
            .post_json("/cosmos/tx/v1beta1/simulate", &request)
            .await
            .map_err(BridgeError::chain_rpc)?;
        let parse = |value: &str| {
            value
                .parse::<u64>()
                .map_err(|e| BridgeError::ChainRpc(format!("invalid gas value {}: {}", value, e)))
        };
        Ok(GasInfo {
            gas_wanted: parse(&response.gas_info.gas_wanted)?,
            gas_used: parse(&response.gas_info.gas_used)?,
        })
    }

    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> BridgeResult<String> {
        let request = BroadcastRequest {
            tx_bytes: BASE64.encode(tx_bytes),
            mode: "BROADCAST_MODE_SYNC".to_string(),
        };
        let response: BroadcastResponse = self
            .post_json("/cosmos/tx/v1beta1/txs", &request)
            .await
            .map_err(BridgeError::chain_rpc)?;
        if response.tx_response.code != 0 {
            return Err(BridgeError::ChainRpc(format!(
                "broadcast rejected with code {}: {}",
                response.tx_response.code, response.tx_response.raw_log
            )));
        }
        Ok(normalize_tx_hash(&response.tx_response.txhash))
    }
}

