//! Mint Monitor
//!
//! Scans the source chain for deposits into the vault and records each one as
//! either a `Mint` or an `InvalidMint` document.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{Progress, Worker, WorkerContext};
use crate::cosmos::validate::{validate_tx_to_vault, DepositOutcome, DepositValidation};
use crate::error::BridgeResult;
use crate::models::{
    now, InvalidMint, Mint, MintMemo, Status, COLLECTION_INVALID_MINTS, COLLECTION_MINTS,
};
use crate::store::{self, Filter};

pub const NAME: &str = "mint_monitor";

pub struct MintMonitor {
    ctx: Arc<WorkerContext>,
    /// First source height not yet fully ingested
    start_height: u64,
    current_height: u64,
    max_mint_limit: U256,
}

impl MintMonitor {
    pub fn new(ctx: Arc<WorkerContext>, start_height: u64) -> Self {
        Self {
            ctx,
            start_height,
            current_height: 0,
            max_mint_limit: U256::ZERO,
        }
    }

    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    async fn exists(&self, collection: &str, transaction_hash: &str) -> BridgeResult<bool> {
        let found = self
            .ctx
            .db
            .find_one(collection, &Filter::new().eq("transaction_hash", transaction_hash))
            .await?;
        Ok(found.is_some())
    }

    async fn record_invalid_mint(&self, result: &DepositValidation) -> BridgeResult<()> {
        if self.exists(COLLECTION_MINTS, &result.transaction_hash).await? {
            debug!(
                "[MINT MONITOR] {} already recorded as a mint, not refunding",
                result.transaction_hash
            );
            return Ok(());
        }

        let status = match result.outcome {
            DepositOutcome::Failed => Status::Failed,
            _ => Status::Pending,
        };
        let timestamp = now();
        let doc = InvalidMint {
            id: None,
            transaction_hash: result.transaction_hash.clone(),
            height: result.height.to_string(),
            confirmations: "0".to_string(),
            sender_address: result.sender_address.clone(),
            sender_chain_id: self.ctx.settings.source_chain_id.clone(),
            memo: result.memo.clone(),
            amount: result.amount.to_string(),
            vault_address: self.ctx.settings.vault_address.clone(),
            signatures: Vec::new(),
            sequence: None,
            return_transaction_body: String::new(),
            return_transaction_hash: String::new(),
            status,
            created_at: timestamp,
            updated_at: timestamp,
        };

        match store::insert(self.ctx.db.as_ref(), COLLECTION_INVALID_MINTS, &doc).await {
            Ok(_) => {
                info!(
                    "[MINT MONITOR] Stored invalid mint {} ({})",
                    doc.transaction_hash, status
                );
                Ok(())
            }
            Err(e) if e.is_duplicate_key() => {
                debug!("[MINT MONITOR] Invalid mint {} already stored", doc.transaction_hash);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn record_mint(&self, result: &DepositValidation, memo: &MintMemo) -> BridgeResult<()> {
        if self.exists(COLLECTION_INVALID_MINTS, &result.transaction_hash).await? {
            debug!(
                "[MINT MONITOR] {} already recorded as an invalid mint",
                result.transaction_hash
            );
            return Ok(());
        }

        let timestamp = now();
        let doc = Mint {
            id: None,
            transaction_hash: result.transaction_hash.clone(),
            height: result.height.to_string(),
            confirmations: "0".to_string(),
            sender_address: result.sender_address.clone(),
            sender_chain_id: self.ctx.settings.source_chain_id.clone(),
            recipient_address: memo.address.clone(),
            recipient_chain_id: memo.chain_id.clone(),
            wpokt_address: self.ctx.settings.wpokt_address.clone(),
            vault_address: self.ctx.settings.vault_address.clone(),
            amount: result.amount.to_string(),
            memo: Some(memo.clone()),
            data: None,
            signatures: Vec::new(),
            signers: Vec::new(),
            mint_transaction_hash: String::new(),
            status: Status::Pending,
            created_at: timestamp,
            updated_at: timestamp,
        };

        match store::insert(self.ctx.db.as_ref(), COLLECTION_MINTS, &doc).await {
            Ok(_) => {
                info!(
                    "[MINT MONITOR] Stored mint {} of {} for {}",
                    doc.transaction_hash, doc.amount, doc.recipient_address
                );
                Ok(())
            }
            Err(e) if e.is_duplicate_key() => {
                debug!("[MINT MONITOR] Mint {} already stored", doc.transaction_hash);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Ingests every deposit at or above the cursor. Returns whether all of
    /// them were stored.
    async fn sync_txs(&self) -> BridgeResult<bool> {
        let txs = self
            .ctx
            .cosmos
            .get_txs_sent_to_address_after_height(&self.ctx.settings.vault_address, self.start_height)
            .await?;
        debug!("[MINT MONITOR] Found {} txs to vault since {}", txs.len(), self.start_height);

        let rules = self.ctx.settings.deposit_rules(self.max_mint_limit);
        let mut success = true;
        for tx in &txs {
            let result = validate_tx_to_vault(tx, &rules);
            let stored = match &result.outcome {
                DepositOutcome::Discarded(reason) => {
                    debug!("[MINT MONITOR] Discarding {}: {}", tx.hash, reason);
                    continue;
                }
                DepositOutcome::Mint(memo) => self.record_mint(&result, memo).await,
                DepositOutcome::Failed | DepositOutcome::Refund(_) => self.record_invalid_mint(&result).await,
            };
            if let Err(e) = stored {
                error!("[MINT MONITOR] Failed to store {}: {}", tx.hash, e);
                success = false;
            }
        }
        Ok(success)
    }
}

#[async_trait]
impl Worker for MintMonitor {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&mut self) -> BridgeResult<()> {
        self.current_height = self.ctx.cosmos.get_latest_block_height().await?;
        self.max_mint_limit = self.ctx.mint_controller.max_mint_limit().await?;
        debug!("[MINT MONITOR] Current height {}", self.current_height);

        if self.start_height == 0 {
            self.start_height = self.current_height;
        }
        if self.current_height <= self.start_height {
            debug!("[MINT MONITOR] Already synced up to {}", self.start_height);
            return Ok(());
        }

        if self.sync_txs().await? {
            self.start_height = self.current_height;
            info!("[MINT MONITOR] Synced up to {}", self.start_height);
        } else {
            warn!("[MINT MONITOR] Batch incomplete, rescanning from {}", self.start_height);
        }
        Ok(())
    }

    fn progress(&self) -> Progress {
        Progress {
            pokt_height: Some(self.start_height),
            eth_block_number: None,
        }
    }
}
