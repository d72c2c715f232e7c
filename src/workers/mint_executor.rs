//! Mint Executor
//!
//! Watches the wrapped token for `Minted` events and settles the matching
//! mint documents.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{require_id, Progress, Worker, WorkerContext};
use crate::error::BridgeResult;
use crate::evm::{block_ranges, MintedEvent};
use crate::models::{now, timestamp_value, Mint, Status, COLLECTION_MINTS};
use crate::store::{self, Filter, Update};

pub const NAME: &str = "mint_executor";

pub struct MintExecutor {
    ctx: Arc<WorkerContext>,
    /// First destination block not yet scanned
    last_block: u64,
    current_block: u64,
}

impl MintExecutor {
    pub fn new(ctx: Arc<WorkerContext>, start_block: u64) -> Self {
        Self {
            ctx,
            last_block: start_block,
            current_block: 0,
        }
    }

    pub fn last_block(&self) -> u64 {
        self.last_block
    }

    fn event_filter(&self, event: &MintedEvent) -> Filter {
        Filter::new()
            .eq("recipient_address", event.recipient.to_lowercase())
            .eq("amount", event.amount.to_string())
            .eq("data.nonce", event.nonce.to_string())
            .eq("wpokt_address", self.ctx.settings.wpokt_address.as_str())
            .eq("vault_address", self.ctx.settings.vault_address.as_str())
            .is_in("status", [Status::Confirmed.as_str(), Status::Signed.as_str()])
    }

    async fn handle_event(&self, event: &MintedEvent) -> BridgeResult<()> {
        let filter = self.event_filter(event);
        let Some(mint) = store::find_one_as::<Mint>(self.ctx.db.as_ref(), COLLECTION_MINTS, &filter).await? else {
            debug!(
                "[MINT EXECUTOR] No open mint for event {} (recipient {}, nonce {})",
                event.transaction_hash, event.recipient, event.nonce
            );
            return Ok(());
        };
        let id = require_id(&mint.id)?;

        let lock = self.ctx.lock_document(COLLECTION_MINTS, &id).await?;
        let update = Update::new()
            .set("status", Status::Success)
            .set("mint_transaction_hash", event.transaction_hash.as_str())
            .set("updated_at", timestamp_value(now()));
        let result = self
            .ctx
            .db
            .update_one(COLLECTION_MINTS, &filter.clone().eq("_id", id.as_str()), &update)
            .await;
        self.ctx.release(lock).await;

        match result? {
            Some(_) => info!(
                "[MINT EXECUTOR] Mint {} succeeded in {}",
                mint.transaction_hash, event.transaction_hash
            ),
            None => warn!("[MINT EXECUTOR] Mint {} changed before settling", mint.transaction_hash),
        }
        Ok(())
    }

    /// Settles every event in `[from, to)`. Returns whether all were handled.
    async fn sync_events(&self, from: u64, to: u64) -> BridgeResult<bool> {
        let mut success = true;
        for (start, end) in block_ranges(from, to) {
            let events = self.ctx.wrapped_token.filter_minted_logs(start, end).await?;
            debug!("[MINT EXECUTOR] {} Minted events in {}..={}", events.len(), start, end);
            for event in &events {
                if let Err(e) = self.handle_event(event).await {
                    error!("[MINT EXECUTOR] Failed to settle {}: {}", event.transaction_hash, e);
                    success = false;
                }
            }
        }
        Ok(success)
    }
}

#[async_trait]
impl Worker for MintExecutor {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&mut self) -> BridgeResult<()> {
        self.current_block = self.ctx.evm.get_block_number().await?;
        if self.last_block == 0 {
            self.last_block = self.current_block;
        }
        if self.current_block <= self.last_block {
            debug!("[MINT EXECUTOR] Already synced up to {}", self.last_block);
            return Ok(());
        }

        if self.sync_events(self.last_block, self.current_block).await? {
            self.last_block = self.current_block;
            info!("[MINT EXECUTOR] Synced up to {}", self.last_block);
        } else {
            warn!("[MINT EXECUTOR] Batch incomplete, rescanning from {}", self.last_block);
        }
        Ok(())
    }

    fn progress(&self) -> Progress {
        Progress {
            pokt_height: None,
            eth_block_number: Some(self.last_block),
        }
    }
}
