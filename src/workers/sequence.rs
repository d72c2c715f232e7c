//! Vault account sequence reservation.
//!
//! Every return transaction consumes one sequence of the vault account.
//! Reservations are serialized across nodes by the `cosmos_sequence` lock:
//! writers hold it exclusively while reserving and persisting, executors hold
//! it shared while broadcasting.

use serde_json::Value;
use tracing::debug;

use crate::cosmos::{Account, CosmosClient};
use crate::error::BridgeResult;
use crate::models::{Status, COLLECTION_BURNS, COLLECTION_INVALID_MINTS};
use crate::store::{Database, Filter};

/// Statuses whose documents may still hold a sequence the chain has not consumed.
const OPEN_STATUSES: [Status; 4] = [Status::Pending, Status::Confirmed, Status::Signed, Status::Submitted];

/// Highest sequence held by any non-terminal burn or invalid mint of this bridge.
///
/// Settled sequences are already reflected in the on-chain account, and a
/// Failed document releases whatever it had reserved.
/// Invalid mints are matched on the vault address; burns carry no vault
/// address and are matched on the wrapped token they were burned from.
pub async fn find_max_sequence(db: &dyn Database, vault_address: &str, wpokt_address: &str) -> BridgeResult<Option<u64>> {
    let invalid_mints = db
        .aggregate_max(
            COLLECTION_INVALID_MINTS,
            &Filter::new()
                .ne("sequence", Value::Null)
                .is_in("status", OPEN_STATUSES.map(|s| s.as_str()))
                .eq("vault_address", vault_address),
            "sequence",
        )
        .await?;
    let burns = db
        .aggregate_max(
            COLLECTION_BURNS,
            &Filter::new()
                .ne("sequence", Value::Null)
                .is_in("status", OPEN_STATUSES.map(|s| s.as_str()))
                .eq("wpokt_address", wpokt_address),
            "sequence",
        )
        .await?;
    Ok(invalid_mints.max(burns))
}

/// Next sequence to use: `max(persisted_max + 1, on_chain)`.
///
/// Must be called while holding the exclusive sequence lock.
pub async fn reserve_sequence(
    db: &dyn Database,
    cosmos: &dyn CosmosClient,
    vault_address: &str,
    wpokt_address: &str,
) -> BridgeResult<(u64, Account)> {
    let persisted = find_max_sequence(db, vault_address, wpokt_address).await?;
    let account = cosmos.get_account(vault_address).await?;
    let sequence = match persisted {
        Some(max) => (max + 1).max(account.sequence),
        None => account.sequence,
    };
    debug!(
        "[SEQUENCE] persisted max {:?}, on-chain {}, reserved {}",
        persisted, account.sequence, sequence
    );
    Ok((sequence, account))
}
