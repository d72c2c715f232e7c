//! Burn Executor
//!
//! Broadcasts fully signed vault transactions and follows them until they
//! settle on the source chain.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{require_id, Progress, ReturnTxState, Worker, WorkerContext};
use crate::cosmos::{normalize_tx_hash, MultisigTxBody};
use crate::error::{BridgeError, BridgeResult};
use crate::models::{now, timestamp_value, Burn, InvalidMint, Status, COLLECTION_BURNS, COLLECTION_INVALID_MINTS};
use crate::store::{self, Filter, Update, SEQUENCE_LOCK_RESOURCE};

pub const NAME: &str = "burn_executor";

pub struct BurnExecutor {
    ctx: Arc<WorkerContext>,
}

impl BurnExecutor {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    async fn load_state(&self, collection: &'static str, id: &str) -> BridgeResult<Option<ReturnTxState>> {
        let db = self.ctx.db.as_ref();
        let filter = Filter::by_id(id);
        if collection == COLLECTION_BURNS {
            match store::find_one_as::<Burn>(db, collection, &filter).await? {
                Some(burn) => Ok(Some(ReturnTxState::from_burn(&burn)?)),
                None => Ok(None),
            }
        } else {
            match store::find_one_as::<InvalidMint>(db, collection, &filter).await? {
                Some(invalid) => Ok(Some(ReturnTxState::from_invalid_mint(&invalid)?)),
                None => Ok(None),
            }
        }
    }

    /// Candidates of `collection` in `status`, scoped to this bridge.
    async fn find_states(&self, collection: &'static str, status: Status) -> BridgeResult<Vec<ReturnTxState>> {
        let db = self.ctx.db.as_ref();
        let settings = &self.ctx.settings;
        if collection == COLLECTION_BURNS {
            let filter = Filter::new()
                .eq("wpokt_address", settings.wpokt_address.as_str())
                .eq("status", status);
            store::find_many_as::<Burn>(db, collection, &filter)
                .await?
                .iter()
                .map(ReturnTxState::from_burn)
                .collect()
        } else {
            let filter = Filter::new()
                .eq("vault_address", settings.vault_address.as_str())
                .eq("status", status);
            store::find_many_as::<InvalidMint>(db, collection, &filter)
                .await?
                .iter()
                .map(ReturnTxState::from_invalid_mint)
                .collect()
        }
    }

    // ------------------------------------------------------------------------
    // Signed -> Submitted
    // ------------------------------------------------------------------------

    /// Verifies, aggregates and broadcasts. Requires the document lock and the
    /// shared sequence lock.
    async fn broadcast(&self, state: &ReturnTxState) -> BridgeResult<()> {
        let body = MultisigTxBody::from_json(&state.return_transaction_body)?;
        if state.sequence != Some(body.sequence) {
            return Err(BridgeError::ProtocolViolation(format!(
                "body sequence {} does not match document sequence {:?}",
                body.sequence, state.sequence
            )));
        }

        let multisig = &self.ctx.multisig;
        let account = self.ctx.cosmos.get_account(&self.ctx.settings.vault_address).await?;
        body.verify_signatures(multisig, &self.ctx.settings.source_chain_id, account.account_number)?;
        if body.signatures.len() < multisig.threshold() as usize {
            return Err(BridgeError::ProtocolViolation(format!(
                "{} partial signatures, threshold is {}",
                body.signatures.len(),
                multisig.threshold()
            )));
        }

        let tx_bytes = body.encode_tx_raw(multisig)?;
        match self.ctx.cosmos.simulate(&tx_bytes).await {
            Ok(gas) if gas.gas_used > body.gas_limit => warn!(
                "[BURN EXECUTOR] {} {} simulates to {} gas, limit is {}",
                state.collection, state.transaction_hash, gas.gas_used, body.gas_limit
            ),
            Ok(gas) => debug!("[BURN EXECUTOR] Simulated gas used {}", gas.gas_used),
            Err(e) => warn!("[BURN EXECUTOR] Simulation failed: {}", e),
        }

        let hash = normalize_tx_hash(&self.ctx.cosmos.broadcast_tx(&tx_bytes).await?);
        let update = Update::new()
            .set("status", Status::Submitted)
            .set("return_transaction_hash", hash.as_str())
            .set("updated_at", timestamp_value(now()));
        let updated = self
            .ctx
            .db
            .update_one(
                state.collection,
                &Filter::by_id(&state.id).eq("status", Status::Signed),
                &update,
            )
            .await?;
        match updated {
            Some(_) => info!(
                "[BURN EXECUTOR] Submitted {} {} as {} (sequence {})",
                state.collection, state.transaction_hash, hash, body.sequence
            ),
            None => warn!(
                "[BURN EXECUTOR] Broadcast {} for {} {} but the document changed",
                hash, state.collection, state.transaction_hash
            ),
        }
        Ok(())
    }

    async fn submit_locked(&self, collection: &'static str, id: &str) -> BridgeResult<()> {
        let Some(state) = self.load_state(collection, id).await? else {
            return Ok(());
        };
        if state.status != Status::Signed {
            debug!("[BURN EXECUTOR] {} {} no longer signed", collection, state.transaction_hash);
            return Ok(());
        }

        let sequence_lock = self.ctx.db.slock(SEQUENCE_LOCK_RESOURCE).await?;
        let result = self.broadcast(&state).await;
        self.ctx.release(sequence_lock).await;
        result
    }

    async fn submit(&self, state: &ReturnTxState) -> BridgeResult<()> {
        let lock = self.ctx.lock_document(state.collection, &state.id).await?;
        let result = self.submit_locked(state.collection, &state.id).await;
        self.ctx.release(lock).await;
        result
    }

    // ------------------------------------------------------------------------
    // Submitted -> Success | Confirmed
    // ------------------------------------------------------------------------

    async fn check_locked(&self, collection: &'static str, id: &str) -> BridgeResult<()> {
        let Some(state) = self.load_state(collection, id).await? else {
            return Ok(());
        };
        if state.status != Status::Submitted {
            return Ok(());
        }

        let Some(tx) = self.ctx.cosmos.get_tx(&state.return_transaction_hash).await? else {
            debug!(
                "[BURN EXECUTOR] Return tx {} of {} not found yet",
                state.return_transaction_hash, state.transaction_hash
            );
            return Ok(());
        };

        let filter = Filter::by_id(id).eq("status", Status::Submitted);
        if tx.code == 0 {
            let update = Update::new()
                .set("status", Status::Success)
                .set("updated_at", timestamp_value(now()));
            self.ctx.db.update_one(collection, &filter, &update).await?;
            info!(
                "[BURN EXECUTOR] {} {} settled in {}",
                collection, state.transaction_hash, state.return_transaction_hash
            );
        } else {
            let update = Update::new()
                .set("status", Status::Confirmed)
                .set("return_transaction_body", "")
                .set("signatures", Value::Array(Vec::new()))
                .set("sequence", Value::Null)
                .set("return_transaction_hash", "")
                .set("updated_at", timestamp_value(now()));
            self.ctx.db.update_one(collection, &filter, &update).await?;
            warn!(
                "[BURN EXECUTOR] Return tx {} of {} {} failed with code {}, reverted to confirmed",
                state.return_transaction_hash, collection, state.transaction_hash, tx.code
            );
        }
        Ok(())
    }

    async fn check(&self, state: &ReturnTxState) -> BridgeResult<()> {
        let lock = self.ctx.lock_document(state.collection, &state.id).await?;
        let result = self.check_locked(state.collection, &state.id).await;
        self.ctx.release(lock).await;
        result
    }
}

#[async_trait]
impl Worker for BurnExecutor {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&mut self) -> BridgeResult<()> {
        for collection in [COLLECTION_BURNS, COLLECTION_INVALID_MINTS] {
            let signed = self.find_states(collection, Status::Signed).await?;
            debug!("[BURN EXECUTOR] Found {} signed {}", signed.len(), collection);
            for state in &signed {
                match self.submit(state).await {
                    Ok(()) => {}
                    Err(e) if e.is_lock_contention() => {
                        debug!("[BURN EXECUTOR] {} {} is locked, skipping", collection, state.transaction_hash)
                    }
                    Err(e) => error!(
                        "[BURN EXECUTOR] Failed to submit {} {}: {}",
                        collection, state.transaction_hash, e
                    ),
                }
            }

            let submitted = self.find_states(collection, Status::Submitted).await?;
            debug!("[BURN EXECUTOR] Found {} submitted {}", submitted.len(), collection);
            for state in &submitted {
                match self.check(state).await {
                    Ok(()) => {}
                    Err(e) if e.is_lock_contention() => {
                        debug!("[BURN EXECUTOR] {} {} is locked, skipping", collection, state.transaction_hash)
                    }
                    Err(e) => error!(
                        "[BURN EXECUTOR] Failed to check {} {}: {}",
                        collection, state.transaction_hash, e
                    ),
                }
            }
        }
        Ok(())
    }

    fn progress(&self) -> Progress {
        Progress::default()
    }
}
