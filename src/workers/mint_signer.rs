//! Mint Signer
//!
//! Re-validates pending mints against the source chain, counts confirmations
//! and adds this validator's EIP-712 signature once a mint is confirmed.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: A nonce is assigned once per mint and never changes; all
//! validators must sign the same `MintData` for the controller to accept it.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{insert_sorted_signature, parse_amount, parse_height, require_id, update_confirmations, Progress, Worker, WorkerContext};
use crate::cosmos::validate::{validate_tx_to_vault, DepositOutcome};
use crate::crypto::eip712::{mint_data_digest, Eip712Domain};
use crate::error::{BridgeError, BridgeResult};
use crate::models::{now, timestamp_value, Mint, MintData, Status, COLLECTION_MINTS};
use crate::store::{self, Filter, Update};

pub const NAME: &str = "mint_signer";

pub struct MintSigner {
    ctx: Arc<WorkerContext>,
    current_height: u64,
    validator_count: u64,
    domain: Option<Eip712Domain>,
}

impl MintSigner {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self {
            ctx,
            current_height: 0,
            validator_count: 0,
            domain: None,
        }
    }

    fn eth_address(&self) -> String {
        self.ctx.signer.eth_address().to_lowercase()
    }

    fn open_statuses() -> [&'static str; 2] {
        [Status::Pending.as_str(), Status::Confirmed.as_str()]
    }

    async fn refresh(&mut self) -> BridgeResult<()> {
        self.current_height = self.ctx.cosmos.get_latest_block_height().await?;
        let count = self.ctx.mint_controller.validator_count().await?;
        self.validator_count = u64::try_from(count)
            .map_err(|e| BridgeError::ChainRpc(format!("validator count {} out of range: {}", count, e)))?;
        self.domain = Some(self.ctx.mint_controller.eip712_domain().await?);
        Ok(())
    }

    /// Re-reads the deposit and checks it still mints exactly this document.
    ///
    /// The cap and `mint_disabled` are not re-applied: a recorded mint stays
    /// a mint when either changes after ingestion.
    async fn validate_mint(&self, mint: &Mint) -> BridgeResult<Option<String>> {
        let Some(tx) = self.ctx.cosmos.get_tx(&mint.transaction_hash).await? else {
            return Ok(Some("source tx not found".to_string()));
        };
        let rules = self.ctx.settings.deposit_rules(U256::MAX).for_recorded_mint();
        let result = validate_tx_to_vault(&tx, &rules);
        let memo = match result.outcome {
            DepositOutcome::Mint(memo) => memo,
            other => return Ok(Some(format!("no longer a valid mint: {:?}", other))),
        };
        if !memo.address.eq_ignore_ascii_case(&mint.recipient_address) || memo.chain_id != mint.recipient_chain_id {
            return Ok(Some("memo does not match recipient".to_string()));
        }
        if result.amount != parse_amount(&mint.amount)? {
            return Ok(Some(format!("amount {} does not match {}", result.amount, mint.amount)));
        }
        if !result.sender_address.eq_ignore_ascii_case(&mint.sender_address) {
            return Ok(Some("sender does not match".to_string()));
        }
        Ok(None)
    }

    /// `max(on-chain nonce, highest nonce of other open mints) + 1`.
    async fn next_nonce(&self, mint: &Mint, id: &str) -> BridgeResult<U256> {
        let on_chain = self.ctx.wrapped_token.get_user_nonce(&mint.recipient_address).await?;

        let others: Vec<Mint> = store::find_many_as(
            self.ctx.db.as_ref(),
            COLLECTION_MINTS,
            &Filter::new()
                .eq("recipient_address", mint.recipient_address.as_str())
                .eq("wpokt_address", self.ctx.settings.wpokt_address.as_str())
                .not_in("status", [Status::Success.as_str(), Status::Failed.as_str()])
                .ne("_id", id),
        )
        .await?;

        let mut highest = on_chain;
        for other in others {
            if let Some(data) = other.data {
                highest = highest.max(parse_amount(&data.nonce)?);
            }
        }
        debug!(
            "[MINT SIGNER] Nonce for {}: on-chain {}, highest known {}",
            mint.recipient_address, on_chain, highest
        );
        Ok(highest + U256::from(1u64))
    }

    async fn mark_failed(&self, mint: &Mint, id: &str, reason: &str) -> BridgeResult<()> {
        if mint.confirmations == "0" {
            warn!(
                "[MINT SIGNER] Mint {} does not validate yet ({}), not failing an unconfirmed mint",
                mint.transaction_hash, reason
            );
            return Ok(());
        }
        warn!("[MINT SIGNER] Mint {} failed validation: {}", mint.transaction_hash, reason);
        let update = Update::new()
            .set("status", Status::Failed)
            .set("updated_at", timestamp_value(now()));
        self.ctx
            .db
            .update_one(
                COLLECTION_MINTS,
                &Filter::by_id(id).is_in("status", Self::open_statuses()),
                &update,
            )
            .await?;
        Ok(())
    }

    /// Handles one candidate while holding its lock.
    async fn process(&self, id: &str) -> BridgeResult<()> {
        let me = self.eth_address();
        let Some(mint) = store::find_one_as::<Mint>(self.ctx.db.as_ref(), COLLECTION_MINTS, &Filter::by_id(id)).await?
        else {
            return Ok(());
        };
        if !matches!(mint.status, Status::Pending | Status::Confirmed)
            || mint.signers.iter().any(|s| s.eq_ignore_ascii_case(&me))
        {
            debug!("[MINT SIGNER] Mint {} changed since selection, skipping", mint.transaction_hash);
            return Ok(());
        }

        if let Some(reason) = self.validate_mint(&mint).await? {
            return self.mark_failed(&mint, id, &reason).await;
        }

        let (status, confirmations) = update_confirmations(
            mint.status,
            parse_height(&mint.height)?,
            self.current_height,
            self.ctx.settings.source_confirmations,
        );
        let filter = Filter::by_id(id).is_in("status", Self::open_statuses());

        if status == Status::Pending {
            debug!(
                "[MINT SIGNER] Mint {} has {} confirmations",
                mint.transaction_hash, confirmations
            );
            let update = Update::new()
                .set("status", status)
                .set("confirmations", confirmations)
                .set("updated_at", timestamp_value(now()));
            self.ctx.db.update_one(COLLECTION_MINTS, &filter, &update).await?;
            return Ok(());
        }

        let nonce = match &mint.data {
            Some(data) => parse_amount(&data.nonce)?,
            None => self.next_nonce(&mint, id).await?,
        };
        let data = MintData {
            recipient: mint.recipient_address.to_lowercase(),
            amount: mint.amount.clone(),
            nonce: nonce.to_string(),
        };

        let domain = self
            .domain
            .as_ref()
            .ok_or_else(|| BridgeError::ChainRpc("mint controller domain not loaded".to_string()))?;
        let digest = mint_data_digest(domain, &data).map_err(|e| BridgeError::Validation(format!("{:#}", e)))?;
        let signature = self.ctx.signer.eth_sign(&digest).await?;
        let signature_hex = format!("0x{}", hex::encode(signature));

        let (signers, signatures) = insert_sorted_signature(&mint.signers, &mint.signatures, &me, &signature_hex);
        let status = if signers.len() as u64 >= self.validator_count {
            Status::Signed
        } else {
            Status::Confirmed
        };

        let update = Update::new()
            .set_serialized("data", &data)?
            .set_serialized("signers", &signers)?
            .set_serialized("signatures", &signatures)?
            .set("status", status)
            .set("confirmations", confirmations)
            .set("updated_at", timestamp_value(now()));
        match self.ctx.db.update_one(COLLECTION_MINTS, &filter, &update).await? {
            Some(_) => info!(
                "[MINT SIGNER] Signed mint {} with nonce {} ({}/{} signatures, {})",
                mint.transaction_hash,
                data.nonce,
                signers.len(),
                self.validator_count,
                status
            ),
            None => warn!("[MINT SIGNER] Mint {} was not updated", mint.transaction_hash),
        }
        Ok(())
    }

    async fn sign_mint(&self, mint: &Mint) -> BridgeResult<()> {
        let id = require_id(&mint.id)?;
        let lock = self.ctx.lock_document(COLLECTION_MINTS, &id).await?;
        let result = self.process(&id).await;
        self.ctx.release(lock).await;
        result
    }
}

#[async_trait]
impl Worker for MintSigner {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&mut self) -> BridgeResult<()> {
        self.refresh().await?;

        let filter = Filter::new()
            .eq("vault_address", self.ctx.settings.vault_address.as_str())
            .eq("wpokt_address", self.ctx.settings.wpokt_address.as_str())
            .is_in("status", Self::open_statuses())
            .not_in("signers", [self.eth_address()]);
        let mints: Vec<Mint> = store::find_many_as(self.ctx.db.as_ref(), COLLECTION_MINTS, &filter).await?;
        debug!("[MINT SIGNER] Found {} mints to sign", mints.len());

        for mint in &mints {
            match self.sign_mint(mint).await {
                Ok(()) => {}
                Err(e) if e.is_lock_contention() => {
                    debug!("[MINT SIGNER] Mint {} is locked, skipping", mint.transaction_hash);
                }
                Err(e) => error!("[MINT SIGNER] Failed to sign mint {}: {}", mint.transaction_hash, e),
            }
        }
        Ok(())
    }

    fn progress(&self) -> Progress {
        Progress {
            pokt_height: Some(self.current_height),
            eth_block_number: None,
        }
    }
}
