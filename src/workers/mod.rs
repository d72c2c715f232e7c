//! Validator Workers
//!
//! Six long-running workers move transfer documents through their lifecycle.
//! Each worker exposes a finite, idempotent `run()` tick; the runner calls it
//! on an interval. Workers on different nodes coordinate only through the
//! shared store and its advisory locks.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: A document is only mutated while holding its exclusive lock,
//! and every mutation re-reads the document under that lock first.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::cosmos::validate::DepositRules;
use crate::cosmos::{CosmosClient, MultisigKey};
use crate::error::{BridgeError, BridgeResult};
use crate::evm::{EvmClient, MintControllerContract, WrappedTokenContract};
use crate::models::{Burn, InvalidMint, Signature, Status};
use crate::signer::Signer;
use crate::store::{document_resource, Database, LockHandle};

pub mod burn_executor;
pub mod burn_monitor;
pub mod burn_signer;
pub mod mint_executor;
pub mod mint_monitor;
pub mod mint_signer;
pub mod sequence;

pub use burn_executor::BurnExecutor;
pub use burn_monitor::BurnMonitor;
pub use burn_signer::BurnSigner;
pub use mint_executor::MintExecutor;
pub use mint_monitor::MintMonitor;
pub use mint_signer::MintSigner;

// ============================================================================
// WORKER CONTRACT
// ============================================================================

/// Chain positions a worker reports to the health record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub pokt_height: Option<u64>,
    pub eth_block_number: Option<u64>,
}

/// A periodic unit of work.
#[async_trait]
pub trait Worker: Send {
    /// Health record name, e.g. `mint_monitor`.
    fn name(&self) -> &'static str;

    /// One tick. Errors are logged by the runner and retried next tick.
    async fn run(&mut self) -> BridgeResult<()>;

    fn progress(&self) -> Progress {
        Progress::default()
    }
}

// ============================================================================
// SHARED CONTEXT
// ============================================================================

/// Static parameters every worker derives its filters and rules from.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Lowercase bech32 vault (multisig) address
    pub vault_address: String,
    /// Lowercase wrapped token address
    pub wpokt_address: String,
    pub source_chain_id: String,
    pub destination_chain_id: String,
    pub bech32_prefix: String,
    pub coin_denom: String,
    pub tx_fee: u64,
    pub gas_limit: u64,
    pub source_confirmations: u64,
    pub destination_confirmations: u64,
    pub mint_disabled: bool,
}

impl BridgeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            vault_address: config.source.multisig_address.to_lowercase(),
            wpokt_address: config.destination.wrapped_token_address.to_lowercase(),
            source_chain_id: config.source.chain_id.clone(),
            destination_chain_id: config.destination_chain_id(),
            bech32_prefix: config.source.bech32_prefix.clone(),
            coin_denom: config.source.coin_denom.clone(),
            tx_fee: config.source.tx_fee,
            gas_limit: config.source.gas_limit,
            source_confirmations: config.source.confirmations,
            destination_confirmations: config.destination.confirmations,
            mint_disabled: config.source.mint_disabled,
        }
    }

    /// Deposit rules under the given max mint limit.
    pub fn deposit_rules(&self, max_mint_limit: U256) -> DepositRules {
        DepositRules {
            vault_address: self.vault_address.clone(),
            coin_denom: self.coin_denom.clone(),
            min_amount: U256::from(self.tx_fee),
            max_mint_limit,
            destination_chain_id: self.destination_chain_id.clone(),
            mint_disabled: self.mint_disabled,
        }
    }
}

/// Capabilities and settings shared by all workers of one node.
pub struct WorkerContext {
    pub db: Arc<dyn Database>,
    pub cosmos: Arc<dyn CosmosClient>,
    pub evm: Arc<dyn EvmClient>,
    pub wrapped_token: Arc<dyn WrappedTokenContract>,
    pub mint_controller: Arc<dyn MintControllerContract>,
    pub signer: Arc<dyn Signer>,
    pub multisig: MultisigKey,
    pub settings: BridgeSettings,
}

impl WorkerContext {
    /// Exclusive lock on `collection/id`.
    pub async fn lock_document(&self, collection: &str, id: &str) -> BridgeResult<LockHandle> {
        self.db.xlock(&document_resource(collection, id)).await
    }

    /// Releases a lock; a failed release is logged, the TTL reclaims it.
    pub async fn release(&self, lock: LockHandle) {
        let resource = lock.resource.clone();
        if let Err(e) = self.db.unlock(lock).await {
            warn!("[LOCK] Failed to release {}: {}", resource, e);
        }
    }
}

// ============================================================================
// LIFECYCLE RULES
// ============================================================================

/// Confirmation progress of a document.
///
/// The count is refreshed on every pass; the status only moves forward, so a
/// confirmed document never drops back to pending. A requirement of zero
/// confirms immediately.
pub fn update_confirmations(status: Status, origin_height: u64, current_height: u64, required: u64) -> (Status, String) {
    let counted = current_height.saturating_sub(origin_height);
    if status != Status::Pending {
        return (status, counted.to_string());
    }
    if required == 0 || counted >= required {
        (Status::Confirmed, counted.to_string())
    } else {
        (Status::Pending, counted.to_string())
    }
}

/// Inserts a signature, keeping signers ascending by numeric address and the
/// signatures aligned with them.
pub fn insert_sorted_signature(
    signers: &[String],
    signatures: &[String],
    signer: &str,
    signature: &str,
) -> (Vec<String>, Vec<String>) {
    let mut pairs: Vec<(String, String)> = signers
        .iter()
        .cloned()
        .zip(signatures.iter().cloned())
        .filter(|(s, _)| !s.eq_ignore_ascii_case(signer))
        .collect();
    pairs.push((signer.to_lowercase(), signature.to_string()));
    let ordered = crate::crypto::sort_addresses(&pairs.iter().map(|(s, _)| s.clone()).collect::<Vec<_>>());
    let mut sorted_signatures = Vec::with_capacity(ordered.len());
    for address in &ordered {
        if let Some((_, sig)) = pairs.iter().find(|(s, _)| s.eq_ignore_ascii_case(address)) {
            sorted_signatures.push(sig.clone());
        }
    }
    (ordered, sorted_signatures)
}

pub fn parse_amount(value: &str) -> BridgeResult<U256> {
    U256::from_str(value).map_err(|e| BridgeError::Validation(format!("invalid amount {}: {}", value, e)))
}

pub fn parse_height(value: &str) -> BridgeResult<u64> {
    value
        .parse()
        .map_err(|e| BridgeError::Validation(format!("invalid height {}: {}", value, e)))
}

/// Lock and state view shared by burns and invalid mints.
#[derive(Debug, Clone)]
pub struct ReturnTxState {
    pub collection: &'static str,
    pub id: String,
    pub transaction_hash: String,
    pub status: Status,
    pub confirmations: String,
    pub signatures: Vec<Signature>,
    pub sequence: Option<u64>,
    pub return_transaction_body: String,
    pub return_transaction_hash: String,
}

impl ReturnTxState {
    pub fn from_burn(burn: &Burn) -> BridgeResult<Self> {
        Ok(Self {
            collection: crate::models::COLLECTION_BURNS,
            id: require_id(&burn.id)?,
            transaction_hash: burn.transaction_hash.clone(),
            status: burn.status,
            confirmations: burn.confirmations.clone(),
            signatures: burn.signatures.clone(),
            sequence: burn.sequence,
            return_transaction_body: burn.return_transaction_body.clone(),
            return_transaction_hash: burn.return_transaction_hash.clone(),
        })
    }

    pub fn from_invalid_mint(invalid: &InvalidMint) -> BridgeResult<Self> {
        Ok(Self {
            collection: crate::models::COLLECTION_INVALID_MINTS,
            id: require_id(&invalid.id)?,
            transaction_hash: invalid.transaction_hash.clone(),
            status: invalid.status,
            confirmations: invalid.confirmations.clone(),
            signatures: invalid.signatures.clone(),
            sequence: invalid.sequence,
            return_transaction_body: invalid.return_transaction_body.clone(),
            return_transaction_hash: invalid.return_transaction_hash.clone(),
        })
    }
}

pub fn require_id(id: &Option<String>) -> BridgeResult<String> {
    id.clone()
        .ok_or_else(|| BridgeError::Store("document without _id".to_string()))
}
