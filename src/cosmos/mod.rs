//! Source Chain Module
//!
//! Read and broadcast access to the Cosmos-style source chain, the vault
//! multisig key, the return transaction format and deposit classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

pub mod client;
pub mod memo;
pub mod multisig;
pub mod proto;
pub mod tx;
pub mod validate;

pub use client::LcdCosmosClient;
pub use multisig::MultisigKey;
pub use tx::{CoinAmount, MultisigTxBody, PartialSignature};

// ============================================================================
// CHAIN DATA
// ============================================================================

/// One attribute of an ABCI event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// ABCI event emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

impl TxEvent {
    /// Value of the first attribute with `key` (case-insensitive).
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key.eq_ignore_ascii_case(key))
            .map(|a| a.value.as_str())
    }
}

/// Bank send carried in a transaction body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub from_address: String,
    pub to_address: String,
    /// Coins as `<amount><denom>` pairs
    pub amount: Vec<CoinAmount>,
}

/// Included transaction as reported by the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    /// `0x`-prefixed lowercase hash
    pub hash: String,
    pub height: u64,
    /// ABCI result code, 0 on success
    pub code: u32,
    pub memo: String,
    pub events: Vec<TxEvent>,
    pub messages: Vec<SendMessage>,
}

/// Auth account state of the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_number: u64,
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasInfo {
    pub gas_wanted: u64,
    pub gas_used: u64,
}

// ============================================================================
// CAPABILITY
// ============================================================================

/// Source chain RPC capability.
#[async_trait]
pub trait CosmosClient: Send + Sync {
    async fn get_latest_block_height(&self) -> BridgeResult<u64>;

    async fn get_chain_id(&self) -> BridgeResult<String>;

    /// Transactions with a transfer to `address` at height ≥ `height`, ascending.
    async fn get_txs_sent_to_address_after_height(&self, address: &str, height: u64) -> BridgeResult<Vec<TxResponse>>;

    /// Transactions signed by `address` at height ≥ `height`, ascending.
    async fn get_txs_sent_from_address_after_height(&self, address: &str, height: u64)
        -> BridgeResult<Vec<TxResponse>>;

    /// `None` when the chain does not know the transaction.
    async fn get_tx(&self, hash: &str) -> BridgeResult<Option<TxResponse>>;

    async fn get_account(&self, address: &str) -> BridgeResult<Account>;

    async fn simulate(&self, tx_bytes: &[u8]) -> BridgeResult<GasInfo>;

    /// Broadcasts synchronously and returns the transaction hash.
    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> BridgeResult<String>;

    /// Fails unless the node serves `expected_chain_id`.
    async fn validate_network(&self, expected_chain_id: &str) -> BridgeResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id != expected_chain_id {
            return Err(BridgeError::Config(format!(
                "source chain id mismatch: node reports {}, expected {}",
                chain_id, expected_chain_id
            )));
        }
        Ok(())
    }
}

/// Normalizes a source transaction hash to `0x` + lowercase hex.
pub fn normalize_tx_hash(hash: &str) -> String {
    let body = hash.trim().trim_start_matches("0x").trim_start_matches("0X");
    format!("0x{}", body.to_lowercase())
}
