//! Burn Signer
//!
//! Produces this validator's partial signature on the vault transaction that
//! releases a burn or refunds an invalid mint.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: The first signer reserves the vault sequence while holding
//! the exclusive `cosmos_sequence` lock and persists the body before releasing
//! it. Later signers reuse the persisted body so every partial covers the same
//! bytes.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::sequence::reserve_sequence;
use super::{
    parse_amount, parse_height, require_id, update_confirmations, Progress, ReturnTxState, Worker, WorkerContext,
};
use crate::cosmos::memo::{burn_return_memo, invalid_mint_return_memo};
use crate::cosmos::validate::validate_tx_to_vault;
use crate::cosmos::{CoinAmount, MultisigTxBody};
use crate::crypto::{bech32_encode, verify_cosmos_signature};
use crate::error::{BridgeError, BridgeResult};
use crate::models::{now, timestamp_value, Burn, InvalidMint, Status, COLLECTION_BURNS, COLLECTION_INVALID_MINTS};
use crate::store::{self, Filter, Update, SEQUENCE_LOCK_RESOURCE};

pub const NAME: &str = "burn_signer";

/// The send a return transaction performs.
#[derive(Debug, Clone)]
struct Payout {
    to_address: String,
    amount: U256,
    memo: String,
}

pub struct BurnSigner {
    ctx: Arc<WorkerContext>,
    current_height: u64,
    current_block: u64,
    max_mint_limit: U256,
}

fn open_statuses() -> [&'static str; 2] {
    [Status::Pending.as_str(), Status::Confirmed.as_str()]
}

impl BurnSigner {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self {
            ctx,
            current_height: 0,
            current_block: 0,
            max_mint_limit: U256::ZERO,
        }
    }

    fn cosmos_address_hex(&self) -> String {
        self.ctx.signer.cosmos_address_hex()
    }

    fn already_signed(&self, state: &ReturnTxState) -> bool {
        let me = self.cosmos_address_hex();
        state.signatures.iter().any(|s| s.signer.eq_ignore_ascii_case(&me))
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Re-reads the burn log from its receipt. Returns the rejection reason.
    async fn validate_burn(&self, burn: &Burn) -> BridgeResult<Option<String>> {
        let Some(receipt) = self.ctx.evm.get_transaction_receipt(&burn.transaction_hash).await? else {
            return Ok(Some("receipt not found".to_string()));
        };
        if receipt.status.as_deref() != Some("0x1") {
            return Ok(Some(format!("receipt status {:?}", receipt.status)));
        }
        let log_index = parse_height(&burn.log_index)?;
        let Some(log) = receipt.log_at(log_index) else {
            return Ok(Some(format!("log {} not in receipt", log_index)));
        };
        if !log.address.eq_ignore_ascii_case(&self.ctx.settings.wpokt_address) {
            return Ok(Some(format!("log emitted by {}", log.address)));
        }
        let event = match self.ctx.wrapped_token.parse_burn_and_bridge_log(log) {
            Ok(event) => event,
            Err(e) => return Ok(Some(e.to_string())),
        };

        if event.amount != parse_amount(&burn.amount)? {
            return Ok(Some(format!("amount {} does not match {}", event.amount, burn.amount)));
        }
        if !event.from.eq_ignore_ascii_case(&burn.sender_address) {
            return Ok(Some(format!("sender {} does not match {}", event.from, burn.sender_address)));
        }
        let recipient = bech32_encode(&self.ctx.settings.bech32_prefix, &event.pokt_address)
            .map_err(|e| BridgeError::Validation(format!("{:#}", e)))?;
        if !recipient.eq_ignore_ascii_case(&burn.recipient_address) {
            return Ok(Some(format!("recipient {} does not match {}", recipient, burn.recipient_address)));
        }
        Ok(None)
    }

    /// Re-reads the deposit and checks it still warrants this refund.
    async fn validate_invalid_mint(&self, invalid: &InvalidMint) -> BridgeResult<Option<String>> {
        let Some(tx) = self.ctx.cosmos.get_tx(&invalid.transaction_hash).await? else {
            return Ok(Some("source tx not found".to_string()));
        };
        let result = validate_tx_to_vault(&tx, &self.ctx.settings.deposit_rules(self.max_mint_limit));
        if !result.is_refund() {
            return Ok(Some(format!("does not warrant a refund: {:?}", result.outcome)));
        }
        if result.amount != parse_amount(&invalid.amount)? {
            return Ok(Some(format!("amount {} does not match {}", result.amount, invalid.amount)));
        }
        if !result.sender_address.eq_ignore_ascii_case(&invalid.sender_address) {
            return Ok(Some("sender does not match".to_string()));
        }
        Ok(None)
    }

    async fn mark_failed(&self, state: &ReturnTxState, reason: &str) -> BridgeResult<()> {
        if state.confirmations == "0" {
            warn!(
                "[BURN SIGNER] {} {} does not validate yet ({}), not failing an unconfirmed document",
                state.collection, state.transaction_hash, reason
            );
            return Ok(());
        }
        warn!(
            "[BURN SIGNER] {} {} failed validation: {}",
            state.collection, state.transaction_hash, reason
        );
        let update = Update::new()
            .set("status", Status::Failed)
            .set("updated_at", timestamp_value(now()));
        self.ctx
            .db
            .update_one(
                state.collection,
                &Filter::by_id(&state.id).is_in("status", open_statuses()),
                &update,
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Signing protocol
    // ------------------------------------------------------------------------

    /// Writes confirmations and, once confirmed, this node's partial.
    async fn advance(&self, state: &ReturnTxState, status: Status, confirmations: String, payout: Payout) -> BridgeResult<()> {
        if status == Status::Pending {
            debug!(
                "[BURN SIGNER] {} {} has {} confirmations",
                state.collection, state.transaction_hash, confirmations
            );
            let update = Update::new()
                .set("status", status)
                .set("confirmations", confirmations)
                .set("updated_at", timestamp_value(now()));
            self.ctx
                .db
                .update_one(
                    state.collection,
                    &Filter::by_id(&state.id).is_in("status", open_statuses()),
                    &update,
                )
                .await?;
            return Ok(());
        }

        if !state.return_transaction_body.is_empty() {
            let body = MultisigTxBody::from_json(&state.return_transaction_body)?;
            if state.sequence != Some(body.sequence) {
                return Err(BridgeError::ProtocolViolation(format!(
                    "body sequence {} does not match document sequence {:?}",
                    body.sequence, state.sequence
                )));
            }
            let account = self.ctx.cosmos.get_account(&self.ctx.settings.vault_address).await?;
            return self
                .sign_and_persist(state, confirmations, body, account.account_number)
                .await;
        }

        let sequence_lock = self.ctx.db.xlock(SEQUENCE_LOCK_RESOURCE).await?;
        let result = self.reserve_and_sign(state, confirmations, payout).await;
        self.ctx.release(sequence_lock).await;
        result
    }

    /// Builds a fresh body at a newly reserved sequence. Requires the
    /// exclusive sequence lock.
    async fn reserve_and_sign(&self, state: &ReturnTxState, confirmations: String, payout: Payout) -> BridgeResult<()> {
        let settings = &self.ctx.settings;
        let (sequence, account) = reserve_sequence(
            self.ctx.db.as_ref(),
            self.ctx.cosmos.as_ref(),
            &settings.vault_address,
            &settings.wpokt_address,
        )
        .await?;

        let body = MultisigTxBody::new_send(
            &settings.vault_address,
            &payout.to_address,
            CoinAmount::new(payout.amount.to_string(), settings.coin_denom.as_str()),
            CoinAmount::new(settings.tx_fee.to_string(), settings.coin_denom.as_str()),
            settings.gas_limit,
            &payout.memo,
            sequence,
        );
        info!(
            "[BURN SIGNER] Built return tx for {} {} at sequence {}",
            state.collection, state.transaction_hash, sequence
        );
        self.sign_and_persist(state, confirmations, body, account.account_number)
            .await
    }

    async fn sign_and_persist(
        &self,
        state: &ReturnTxState,
        confirmations: String,
        mut body: MultisigTxBody,
        account_number: u64,
    ) -> BridgeResult<()> {
        let sign_bytes = body.sign_bytes(&self.ctx.settings.source_chain_id, account_number)?;
        let signature = self.ctx.signer.cosmos_sign(&sign_bytes).await?;
        let public_key = self.ctx.signer.cosmos_public_key();
        if !verify_cosmos_signature(&public_key, &sign_bytes, &signature) {
            return Err(BridgeError::ProtocolViolation(
                "own partial signature does not verify against own public key".to_string(),
            ));
        }

        body.add_signature(&self.ctx.multisig, &public_key, &signature)?;
        let signatures = body.signature_records()?;
        let threshold = self.ctx.multisig.threshold() as usize;
        let status = if signatures.len() >= threshold {
            Status::Signed
        } else {
            Status::Confirmed
        };

        let update = Update::new()
            .set("return_transaction_body", body.to_json()?)
            .set_serialized("signatures", &signatures)?
            .set("sequence", body.sequence)
            .set("status", status)
            .set("confirmations", confirmations)
            .set("updated_at", timestamp_value(now()));
        let updated = self
            .ctx
            .db
            .update_one(
                state.collection,
                &Filter::by_id(&state.id).is_in("status", open_statuses()),
                &update,
            )
            .await?;

        match updated {
            Some(_) => info!(
                "[BURN SIGNER] Signed {} {} ({}/{} signatures, {})",
                state.collection,
                state.transaction_hash,
                signatures.len(),
                threshold,
                status
            ),
            None => warn!(
                "[BURN SIGNER] {} {} was not updated",
                state.collection, state.transaction_hash
            ),
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Per-document entry points
    // ------------------------------------------------------------------------

    async fn process_burn(&self, id: &str) -> BridgeResult<()> {
        let Some(burn) = store::find_one_as::<Burn>(self.ctx.db.as_ref(), COLLECTION_BURNS, &Filter::by_id(id)).await?
        else {
            return Ok(());
        };
        let state = ReturnTxState::from_burn(&burn)?;
        if !matches!(state.status, Status::Pending | Status::Confirmed) || self.already_signed(&state) {
            debug!("[BURN SIGNER] Burn {} changed since selection, skipping", burn.transaction_hash);
            return Ok(());
        }

        if let Some(reason) = self.validate_burn(&burn).await? {
            return self.mark_failed(&state, &reason).await;
        }

        let (status, confirmations) = update_confirmations(
            state.status,
            parse_height(&burn.block_number)?,
            self.current_block,
            self.ctx.settings.destination_confirmations,
        );
        let payout = Payout {
            to_address: burn.recipient_address.clone(),
            amount: parse_amount(&burn.amount)?,
            memo: burn_return_memo(&burn.transaction_hash),
        };
        self.advance(&state, status, confirmations, payout).await
    }

    async fn process_invalid_mint(&self, id: &str) -> BridgeResult<()> {
        let Some(invalid) =
            store::find_one_as::<InvalidMint>(self.ctx.db.as_ref(), COLLECTION_INVALID_MINTS, &Filter::by_id(id))
                .await?
        else {
            return Ok(());
        };
        let state = ReturnTxState::from_invalid_mint(&invalid)?;
        if !matches!(state.status, Status::Pending | Status::Confirmed) || self.already_signed(&state) {
            debug!(
                "[BURN SIGNER] Invalid mint {} changed since selection, skipping",
                invalid.transaction_hash
            );
            return Ok(());
        }

        if let Some(reason) = self.validate_invalid_mint(&invalid).await? {
            return self.mark_failed(&state, &reason).await;
        }

        let (status, confirmations) = update_confirmations(
            state.status,
            parse_height(&invalid.height)?,
            self.current_height,
            self.ctx.settings.source_confirmations,
        );
        let amount = parse_amount(&invalid.amount)?;
        let Some(refund) = amount.checked_sub(U256::from(self.ctx.settings.tx_fee)) else {
            return self
                .mark_failed(&state, &format!("amount {} cannot cover the fee", amount))
                .await;
        };
        let payout = Payout {
            to_address: invalid.sender_address.clone(),
            amount: refund,
            memo: invalid_mint_return_memo(&invalid.transaction_hash),
        };
        self.advance(&state, status, confirmations, payout).await
    }

    async fn sign_burn(&self, burn: &Burn) -> BridgeResult<()> {
        let id = require_id(&burn.id)?;
        let lock = self.ctx.lock_document(COLLECTION_BURNS, &id).await?;
        let result = self.process_burn(&id).await;
        self.ctx.release(lock).await;
        result
    }

    async fn sign_invalid_mint(&self, invalid: &InvalidMint) -> BridgeResult<()> {
        let id = require_id(&invalid.id)?;
        let lock = self.ctx.lock_document(COLLECTION_INVALID_MINTS, &id).await?;
        let result = self.process_invalid_mint(&id).await;
        self.ctx.release(lock).await;
        result
    }

    fn candidate_filter(&self) -> Filter {
        Filter::new()
            .is_in("status", open_statuses())
            .not_in("signatures.signer", [self.cosmos_address_hex()])
    }
}

#[async_trait]
impl Worker for BurnSigner {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&mut self) -> BridgeResult<()> {
        self.current_height = self.ctx.cosmos.get_latest_block_height().await?;
        self.current_block = self.ctx.evm.get_block_number().await?;
        self.max_mint_limit = self.ctx.mint_controller.max_mint_limit().await?;

        let burns: Vec<Burn> = store::find_many_as(
            self.ctx.db.as_ref(),
            COLLECTION_BURNS,
            &self
                .candidate_filter()
                .eq("wpokt_address", self.ctx.settings.wpokt_address.as_str()),
        )
        .await?;
        debug!("[BURN SIGNER] Found {} burns to sign", burns.len());
        for burn in &burns {
            match self.sign_burn(burn).await {
                Ok(()) => {}
                Err(e) if e.is_lock_contention() => {
                    debug!("[BURN SIGNER] Burn {} is locked, skipping", burn.transaction_hash)
                }
                Err(e) => error!("[BURN SIGNER] Failed to sign burn {}: {}", burn.transaction_hash, e),
            }
        }

        let invalid_mints: Vec<InvalidMint> = store::find_many_as(
            self.ctx.db.as_ref(),
            COLLECTION_INVALID_MINTS,
            &self
                .candidate_filter()
                .eq("vault_address", self.ctx.settings.vault_address.as_str()),
        )
        .await?;
        debug!("[BURN SIGNER] Found {} invalid mints to sign", invalid_mints.len());
        for invalid in &invalid_mints {
            match self.sign_invalid_mint(invalid).await {
                Ok(()) => {}
                Err(e) if e.is_lock_contention() => {
                    debug!("[BURN SIGNER] Invalid mint {} is locked, skipping", invalid.transaction_hash)
                }
                Err(e) => error!(
                    "[BURN SIGNER] Failed to sign invalid mint {}: {}",
                    invalid.transaction_hash, e
                ),
            }
        }
        Ok(())
    }

    fn progress(&self) -> Progress {
        Progress {
            pokt_height: Some(self.current_height),
            eth_block_number: Some(self.current_block),
        }
    }
}
