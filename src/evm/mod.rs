//! Destination Chain Module
//!
//! JSON-RPC access to the EVM destination chain plus typed views of the two
//! contracts the validator reads: the wrapped token and the mint controller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

pub mod abi;
pub mod client;
pub mod contracts;

pub use client::JsonRpcEvmClient;
pub use contracts::{
    BurnAndBridgeEvent, MintControllerContract, MintedEvent, RpcMintController, RpcWrappedToken, WrappedTokenContract,
};

/// Maximum block span of a single `eth_getLogs` query.
pub const MAX_QUERY_BLOCKS: u64 = 499;

// ============================================================================
// CHAIN DATA
// ============================================================================

/// EVM event log entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(default)]
    pub removed: bool,
}

impl EvmLog {
    pub fn block_number_u64(&self) -> BridgeResult<u64> {
        parse_hex_u64(&self.block_number)
    }

    pub fn log_index_u64(&self) -> BridgeResult<u64> {
        parse_hex_u64(&self.log_index)
    }
}

/// EVM transaction details from JSON-RPC
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EvmTransaction {
    pub hash: String,
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
    pub from: String,
    pub to: Option<String>,
    pub input: String,
    pub value: String,
}

/// Receipt of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransactionReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    /// "0x1" = success, "0x0" = failure
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

impl TransactionReceipt {
    /// The log with the given index, if the receipt carries it.
    pub fn log_at(&self, log_index: u64) -> Option<&EvmLog> {
        self.logs
            .iter()
            .find(|log| log.log_index_u64().map(|i| i == log_index).unwrap_or(false))
    }
}

// ============================================================================
// CAPABILITY
// ============================================================================

/// Destination chain RPC capability.
#[async_trait]
pub trait EvmClient: Send + Sync {
    async fn get_block_number(&self) -> BridgeResult<u64>;

    async fn get_chain_id(&self) -> BridgeResult<u64>;

    async fn get_transaction_by_hash(&self, hash: &str) -> BridgeResult<Option<EvmTransaction>>;

    async fn get_transaction_receipt(&self, hash: &str) -> BridgeResult<Option<TransactionReceipt>>;

    /// Logs of `address` with `topic0` in the inclusive range `[from_block, to_block]`.
    async fn get_logs(&self, address: &str, topic0: &str, from_block: u64, to_block: u64) -> BridgeResult<Vec<EvmLog>>;

    /// `eth_call` against the latest block; returns the raw return data.
    async fn call(&self, to: &str, data: &[u8]) -> BridgeResult<Vec<u8>>;

    /// Fails unless the node serves `expected_chain_id`.
    async fn validate_network(&self, expected_chain_id: u64) -> BridgeResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id != expected_chain_id {
            return Err(BridgeError::Config(format!(
                "destination chain id mismatch: node reports {}, expected {}",
                chain_id, expected_chain_id
            )));
        }
        Ok(())
    }
}

/// Parses a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(value: &str) -> BridgeResult<u64> {
    u64::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16)
        .map_err(|e| BridgeError::ChainRpc(format!("invalid hex quantity {}: {}", value, e)))
}

/// Inclusive block ranges covering `[from, to)` in chunks of at most
/// [`MAX_QUERY_BLOCKS`] blocks.
pub fn block_ranges(from: u64, to: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    let mut start = from;
    while start < to {
        let end = (start + MAX_QUERY_BLOCKS).min(to);
        ranges.push((start, end - 1));
        start = end;
    }
    ranges
}
