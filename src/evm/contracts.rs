//! Wrapped token and mint controller views over the EVM client.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::sync::Arc;

use super::abi::{self, decode_address, decode_string, decode_u256};
use super::{EvmClient, EvmLog};
use crate::crypto::eip712::Eip712Domain;
use crate::error::{BridgeError, BridgeResult};

pub const MINTED_EVENT: &str = "Minted(address,uint256,uint256)";
pub const BURN_AND_BRIDGE_EVENT: &str = "BurnAndBridge(uint256,address,address)";

// ============================================================================
// EVENTS
// ============================================================================

/// `Minted(address indexed recipient, uint256 indexed amount, uint256 indexed nonce)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedEvent {
    pub recipient: String,
    pub amount: U256,
    pub nonce: U256,
    pub transaction_hash: String,
    pub block_number: u64,
    pub log_index: u64,
}

/// `BurnAndBridge(uint256 indexed amount, address indexed from, address indexed poktAddress)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnAndBridgeEvent {
    pub amount: U256,
    pub from: String,
    /// Raw 20-byte source recipient
    pub pokt_address: [u8; 20],
    pub transaction_hash: String,
    pub block_number: u64,
    pub log_index: u64,
}

fn expect_topics(log: &EvmLog, event: &str) -> BridgeResult<()> {
    if log.topics.len() != 4 || !log.topics[0].eq_ignore_ascii_case(&abi::event_topic(event)) {
        return Err(BridgeError::Validation(format!(
            "log {}#{} is not a {} event",
            log.transaction_hash, log.log_index, event
        )));
    }
    Ok(())
}

pub fn parse_minted_log(log: &EvmLog) -> BridgeResult<MintedEvent> {
    expect_topics(log, MINTED_EVENT)?;
    Ok(MintedEvent {
        recipient: abi::topic_to_address(&log.topics[1])?,
        amount: abi::topic_to_u256(&log.topics[2])?,
        nonce: abi::topic_to_u256(&log.topics[3])?,
        transaction_hash: log.transaction_hash.to_lowercase(),
        block_number: log.block_number_u64()?,
        log_index: log.log_index_u64()?,
    })
}

pub fn parse_burn_and_bridge_log(log: &EvmLog) -> BridgeResult<BurnAndBridgeEvent> {
    expect_topics(log, BURN_AND_BRIDGE_EVENT)?;
    Ok(BurnAndBridgeEvent {
        amount: abi::topic_to_u256(&log.topics[1])?,
        from: abi::topic_to_address(&log.topics[2])?,
        pokt_address: abi::topic_to_address_bytes(&log.topics[3])?,
        transaction_hash: log.transaction_hash.to_lowercase(),
        block_number: log.block_number_u64()?,
        log_index: log.log_index_u64()?,
    })
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Wrapped-token capability.
#[async_trait]
pub trait WrappedTokenContract: Send + Sync {
    fn address(&self) -> &str;

    /// Last nonce consumed by mints to `address`.
    async fn get_user_nonce(&self, address: &str) -> BridgeResult<U256>;

    fn parse_burn_and_bridge_log(&self, log: &EvmLog) -> BridgeResult<BurnAndBridgeEvent> {
        parse_burn_and_bridge_log(log)
    }

    /// `Minted` events in the inclusive range `[from_block, to_block]`.
    async fn filter_minted_logs(&self, from_block: u64, to_block: u64) -> BridgeResult<Vec<MintedEvent>>;

    /// `BurnAndBridge` events in the inclusive range `[from_block, to_block]`.
    async fn filter_burn_and_bridge_logs(&self, from_block: u64, to_block: u64)
        -> BridgeResult<Vec<BurnAndBridgeEvent>>;
}

/// Mint-controller capability.
#[async_trait]
pub trait MintControllerContract: Send + Sync {
    async fn validator_count(&self) -> BridgeResult<U256>;

    async fn max_mint_limit(&self) -> BridgeResult<U256>;

    /// EIP-5267 signing domain.
    async fn eip712_domain(&self) -> BridgeResult<Eip712Domain>;
}

// ============================================================================
// JSON-RPC BACKED IMPLEMENTATIONS
// ============================================================================

pub struct RpcWrappedToken {
    client: Arc<dyn EvmClient>,
    address: String,
}

impl RpcWrappedToken {
    pub fn new(client: Arc<dyn EvmClient>, address: &str) -> Self {
        Self {
            client,
            address: address.to_lowercase(),
        }
    }
}

#[async_trait]
impl WrappedTokenContract for RpcWrappedToken {
    fn address(&self) -> &str {
        &self.address
    }

    async fn get_user_nonce(&self, address: &str) -> BridgeResult<U256> {
        let data = abi::encode_call_with_address("getUserNonce(address)", address)?;
        let result = self.client.call(&self.address, &data).await?;
        decode_u256(&result, 0)
    }

    async fn filter_minted_logs(&self, from_block: u64, to_block: u64) -> BridgeResult<Vec<MintedEvent>> {
        let logs = self
            .client
            .get_logs(&self.address, &abi::event_topic(MINTED_EVENT), from_block, to_block)
            .await?;
        logs.iter().filter(|log| !log.removed).map(parse_minted_log).collect()
    }

    async fn filter_burn_and_bridge_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> BridgeResult<Vec<BurnAndBridgeEvent>> {
        let logs = self
            .client
            .get_logs(&self.address, &abi::event_topic(BURN_AND_BRIDGE_EVENT), from_block, to_block)
            .await?;
        logs.iter()
            .filter(|log| !log.removed)
            .map(parse_burn_and_bridge_log)
            .collect()
    }
}

pub struct RpcMintController {
    client: Arc<dyn EvmClient>,
    address: String,
}

impl RpcMintController {
    pub fn new(client: Arc<dyn EvmClient>, address: &str) -> Self {
        Self {
            client,
            address: address.to_lowercase(),
        }
    }

    async fn call_no_args(&self, signature: &str) -> BridgeResult<Vec<u8>> {
        self.client.call(&self.address, &abi::selector(signature)).await
    }
}

#[async_trait]
impl MintControllerContract for RpcMintController {
    async fn validator_count(&self) -> BridgeResult<U256> {
        decode_u256(&self.call_no_args("validatorCount()").await?, 0)
    }

    async fn max_mint_limit(&self) -> BridgeResult<U256> {
        decode_u256(&self.call_no_args("maxMintLimit()").await?, 0)
    }

    async fn eip712_domain(&self) -> BridgeResult<Eip712Domain> {
        // (bytes1 fields, string name, string version, uint256 chainId,
        //  address verifyingContract, bytes32 salt, uint256[] extensions)
        let data = self.call_no_args("eip712Domain()").await?;
        Ok(Eip712Domain {
            name: decode_string(&data, 1)?,
            version: decode_string(&data, 2)?,
            chain_id: decode_u256(&data, 3)?,
            verifying_contract: decode_address(&data, 4)?,
        })
    }
}
