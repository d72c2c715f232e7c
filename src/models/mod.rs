//! Persisted Document Models
//!
//! Every cross-chain transfer is represented by exactly one document that moves
//! through the lifecycle `pending -> confirmed -> signed -> submitted ->
//! success | failed`. The document itself is the synchronization token between
//! validator nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// COLLECTIONS AND INDEXES
// ============================================================================

pub const COLLECTION_MINTS: &str = "mints";
pub const COLLECTION_INVALID_MINTS: &str = "invalid_mints";
pub const COLLECTION_BURNS: &str = "burns";
pub const COLLECTION_HEALTH_CHECKS: &str = "health_checks";
pub const COLLECTION_LOCKS: &str = "locks";

/// Unique indexes per collection. Inserts that collide report DuplicateKey.
pub const UNIQUE_INDEXES: &[(&str, &[&str])] = &[
    (COLLECTION_MINTS, &["transaction_hash"]),
    (COLLECTION_INVALID_MINTS, &["transaction_hash"]),
    (COLLECTION_BURNS, &["transaction_hash", "log_index"]),
    (COLLECTION_HEALTH_CHECKS, &["hostname"]),
];

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Lifecycle status shared by mints, invalid mints and burns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Observed on the origin chain, confirmations not yet met
    Pending,
    /// Confirmations met, eligible for signing
    Confirmed,
    /// Signature threshold reached
    Signed,
    /// Return transaction broadcast to the source chain
    Submitted,
    /// Settled on the counterpart chain
    Success,
    /// No longer valid; terminal
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Confirmed => "confirmed",
            Status::Signed => "signed",
            Status::Submitted => "submitted",
            Status::Success => "success",
            Status::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Success | Status::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Status> for serde_json::Value {
    fn from(status: Status) -> Self {
        serde_json::Value::String(status.as_str().to_string())
    }
}

// ============================================================================
// MINTS
// ============================================================================

/// Memo embedded by the depositor in the source transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintMemo {
    pub address: String,
    pub chain_id: String,
}

/// The authorization payload that validators sign for the mint controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintData {
    pub recipient: String,
    pub amount: String,
    pub nonce: String,
}

/// A source deposit eligible for minting on the destination chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mint {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub transaction_hash: String,
    pub height: String,
    pub confirmations: String,
    pub sender_address: String,
    pub sender_chain_id: String,
    pub recipient_address: String,
    pub recipient_chain_id: String,
    pub wpokt_address: String,
    pub vault_address: String,
    pub amount: String,
    pub memo: Option<MintMemo>,
    pub data: Option<MintData>,
    /// Hex signatures aligned with `signers`
    #[serde(default)]
    pub signatures: Vec<String>,
    /// Destination addresses, ascending by numeric value
    #[serde(default)]
    pub signers: Vec<String>,
    #[serde(default)]
    pub mint_transaction_hash: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// REFUND-LIKE DOCUMENTS (INVALID MINTS AND BURNS)
// ============================================================================

/// One partial signature on a source multisig transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Hex of the signer's 20-byte source address
    pub signer: String,
    /// Hex of the 64-byte secp256k1 signature
    pub signature: String,
}

/// A source deposit that must be refunded to its sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidMint {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub transaction_hash: String,
    pub height: String,
    pub confirmations: String,
    pub sender_address: String,
    pub sender_chain_id: String,
    pub memo: String,
    pub amount: String,
    pub vault_address: String,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub return_transaction_body: String,
    #[serde(default)]
    pub return_transaction_hash: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A destination burn that must be released from the source vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Burn {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub transaction_hash: String,
    pub log_index: String,
    pub block_number: String,
    pub confirmations: String,
    pub wpokt_address: String,
    pub sender_address: String,
    pub sender_chain_id: String,
    pub recipient_address: String,
    pub recipient_chain_id: String,
    pub amount: String,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub return_transaction_body: String,
    #[serde(default)]
    pub return_transaction_hash: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// HEALTH
// ============================================================================

/// Last observed activity of one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub healthy: bool,
    #[serde(default)]
    pub eth_block_number: String,
    #[serde(default)]
    pub pokt_height: String,
    pub last_sync_time: DateTime<Utc>,
    pub next_sync_time: DateTime<Utc>,
}

/// Per-host health record, upserted by the health reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub hostname: String,
    pub validator_id: String,
    pub eth_address: String,
    pub pokt_address: String,
    pub pokt_vault_address: String,
    pub healthy: bool,
    #[serde(default)]
    pub service_healths: Vec<ServiceHealth>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl HealthRecord {
    /// Health entry of the named worker, if recorded.
    pub fn service(&self, name: &str) -> Option<&ServiceHealth> {
        self.service_healths.iter().find(|s| s.name == name)
    }
}

/// Current time as stored in documents.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Serialized form of a timestamp, matching how documents store it.
pub fn timestamp_value(time: DateTime<Utc>) -> serde_json::Value {
    serde_json::to_value(time).unwrap_or(serde_json::Value::Null)
}
