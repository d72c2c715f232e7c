//! Burn Monitor
//!
//! Records every `BurnAndBridge` event of the wrapped token as a pending
//! `Burn` document.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{Progress, Worker, WorkerContext};
use crate::crypto::bech32_encode;
use crate::error::{BridgeError, BridgeResult};
use crate::evm::{block_ranges, BurnAndBridgeEvent};
use crate::models::{now, Burn, Status, COLLECTION_BURNS};
use crate::store;

pub const NAME: &str = "burn_monitor";

pub struct BurnMonitor {
    ctx: Arc<WorkerContext>,
    /// First destination block not yet scanned
    last_block: u64,
    current_block: u64,
}

impl BurnMonitor {
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

    async fn record_burn(&self, event: &BurnAndBridgeEvent) -> BridgeResult<()> {
        let recipient = bech32_encode(&self.ctx.settings.bech32_prefix, &event.pokt_address)
            .map_err(|e| BridgeError::Validation(format!("{:#}", e)))?;
        let timestamp = now();
        let doc = Burn {
            id: None,
            transaction_hash: event.transaction_hash.to_lowercase(),
            log_index: event.log_index.to_string(),
            block_number: event.block_number.to_string(),
            confirmations: "0".to_string(),
            wpokt_address: self.ctx.settings.wpokt_address.clone(),
            sender_address: event.from.to_lowercase(),
            sender_chain_id: self.ctx.settings.destination_chain_id.clone(),
            recipient_address: recipient,
            recipient_chain_id: self.ctx.settings.source_chain_id.clone(),
            amount: event.amount.to_string(),
            signatures: Vec::new(),
            sequence: None,
            return_transaction_body: String::new(),
            return_transaction_hash: String::new(),
            status: Status::Pending,
            created_at: timestamp,
            updated_at: timestamp,
        };

        match store::insert(self.ctx.db.as_ref(), COLLECTION_BURNS, &doc).await {
            Ok(_) => {
                info!(
                    "[BURN MONITOR] Stored burn {}#{} of {} to {}",
                    doc.transaction_hash, doc.log_index, doc.amount, doc.recipient_address
                );
                Ok(())
            }
            Err(e) if e.is_duplicate_key() => {
                debug!(
                    "[BURN MONITOR] Burn {}#{} already stored",
                    doc.transaction_hash, doc.log_index
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn sync_events(&self, from: u64, to: u64) -> BridgeResult<bool> {
        let mut success = true;
        for (start, end) in block_ranges(from, to) {
            let events = self.ctx.wrapped_token.filter_burn_and_bridge_logs(start, end).await?;
            debug!("[BURN MONITOR] {} BurnAndBridge events in {}..={}", events.len(), start, end);
            for event in &events {
                if let Err(e) = self.record_burn(event).await {
                    error!("[BURN MONITOR] Failed to store burn {}: {}", event.transaction_hash, e);
                    success = false;
                }
            }
        }
        Ok(success)
    }
}

#[async_trait]
impl Worker for BurnMonitor {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&mut self) -> BridgeResult<()> {
        self.current_block = self.ctx.evm.get_block_number().await?;
        if self.last_block == 0 {
            self.last_block = self.current_block;
        }
        if self.current_block <= self.last_block {
            debug!("[BURN MONITOR] Already synced up to {}", self.last_block);
            return Ok(());
        }

        if self.sync_events(self.last_block, self.current_block).await? {
            self.last_block = self.current_block;
            info!("[BURN MONITOR] Synced up to {}", self.last_block);
        } else {
            warn!("[BURN MONITOR] Batch incomplete, rescanning from {}", self.last_block);
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
