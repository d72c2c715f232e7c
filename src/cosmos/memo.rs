//! Deposit memo parsing.
//!
//! A valid memo is `{"address":"0x<40 hex>","chain_id":"<decimal>"}` naming a
//! non-zero destination recipient on the configured destination chain.

use serde::{Deserialize, Serialize};

use crate::crypto::{is_valid_eth_address, ZERO_ADDRESS};
use crate::error::{BridgeError, BridgeResult};
use crate::models::MintMemo;

#[derive(Serialize, Deserialize)]
struct MemoWire {
    address: String,
    chain_id: String,
}

/// Parses and validates a deposit memo against the destination chain id.
pub fn parse_memo(memo: &str, destination_chain_id: &str) -> BridgeResult<MintMemo> {
    let wire: MemoWire = serde_json::from_str(memo)
        .map_err(|e| BridgeError::Validation(format!("failed to unmarshal memo: {}", e)))?;

    let address = wire.address.to_lowercase().trim().to_string();
    let chain_id = wire.chain_id.to_lowercase().trim().to_string();

    if !is_valid_eth_address(&address) {
        return Err(BridgeError::Validation(format!("invalid address: {}", address)));
    }
    if address == ZERO_ADDRESS {
        return Err(BridgeError::Validation(format!("zero address: {}", address)));
    }
    if chain_id.parse::<u64>().is_err() {
        return Err(BridgeError::Validation(format!("invalid chain id: {}", chain_id)));
    }
    if chain_id != destination_chain_id {
        return Err(BridgeError::Validation(format!("unsupported chain id: {}", chain_id)));
    }

    Ok(MintMemo { address, chain_id })
}

/// Canonical memo text, keys in `address`, `chain_id` order.
pub fn encode_memo(memo: &MintMemo) -> BridgeResult<String> {
    let wire = MemoWire {
        address: memo.address.clone(),
        chain_id: memo.chain_id.clone(),
    };
    serde_json::to_string(&wire).map_err(|e| BridgeError::Validation(format!("cannot encode memo: {}", e)))
}

/// Memo of a vault release for a destination burn.
pub fn burn_return_memo(transaction_hash: &str) -> String {
    format!("Burn: {}", transaction_hash)
}

/// Memo of a refund for an invalid deposit.
pub fn invalid_mint_return_memo(transaction_hash: &str) -> String {
    format!("InvalidMint: {}", transaction_hash)
}
