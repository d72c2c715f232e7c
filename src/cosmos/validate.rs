//! Classification of source transactions that pay into the vault.

use alloy_primitives::U256;
use std::str::FromStr;
use tracing::debug;

use super::memo::parse_memo;
use super::TxResponse;
use crate::models::MintMemo;

/// What a vault deposit turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositOutcome {
    /// The transaction failed on chain; recorded as a failed invalid mint
    Failed,
    /// Not a single clean transfer to the vault; ignored
    Discarded(String),
    /// Funds must go back to the sender
    Refund(String),
    /// Eligible for minting
    Mint(MintMemo),
}

/// Result of [`validate_tx_to_vault`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositValidation {
    pub outcome: DepositOutcome,
    pub transaction_hash: String,
    pub height: u64,
    pub sender_address: String,
    pub amount: U256,
    /// Raw memo text of the transaction
    pub memo: String,
}

impl DepositValidation {
    pub fn is_mint(&self) -> bool {
        matches!(self.outcome, DepositOutcome::Mint(_))
    }

    /// Failed transactions and refunds both end up as invalid mints.
    pub fn is_invalid_mint(&self) -> bool {
        matches!(self.outcome, DepositOutcome::Failed | DepositOutcome::Refund(_))
    }

    /// Only deposits that reached the vault are paid back.
    pub fn is_refund(&self) -> bool {
        matches!(self.outcome, DepositOutcome::Refund(_))
    }
}

/// Parameters a deposit is judged against.
#[derive(Debug, Clone)]
pub struct DepositRules {
    pub vault_address: String,
    pub coin_denom: String,
    /// Deposits must be strictly larger than the refund fee
    pub min_amount: U256,
    pub max_mint_limit: U256,
    pub destination_chain_id: String,
    pub mint_disabled: bool,
}

impl DepositRules {
    /// Rules for a deposit that was already accepted as a mint.
    ///
    /// The mint cap and the disable switch only decide how new deposits are
    /// recorded; they never turn an existing mint into a refund.
    pub fn for_recorded_mint(self) -> Self {
        Self {
            max_mint_limit: U256::MAX,
            mint_disabled: false,
            ..self
        }
    }
}

/// Splits `"50000upokt"` into amount and denomination.
pub fn parse_coin(coin: &str) -> Option<(U256, String)> {
    let coin = coin.trim();
    let split = coin.find(|c: char| !c.is_ascii_digit())?;
    if split == 0 {
        return None;
    }
    let (amount, denom) = coin.split_at(split);
    let amount = U256::from_str(amount).ok()?;
    Some((amount, denom.to_string()))
}

struct Transfer {
    sender: String,
    amount: U256,
}

/// Transfers to `recipient` in `denom`. Coin lists like `"1upokt,2uatom"` are
/// split and matched per coin.
fn transfers_to(tx: &TxResponse, recipient: &str, denom: &str) -> Vec<Transfer> {
    let mut transfers = Vec::new();
    for event in tx.events.iter().filter(|e| e.event_type.eq_ignore_ascii_case("transfer")) {
        let (Some(sender), Some(to), Some(amount)) = (
            event.attribute("sender"),
            event.attribute("recipient"),
            event.attribute("amount"),
        ) else {
            continue;
        };
        if !to.eq_ignore_ascii_case(recipient) {
            continue;
        }
        for coin in amount.split(',') {
            if let Some((value, coin_denom)) = parse_coin(coin) {
                if coin_denom == denom {
                    transfers.push(Transfer {
                        sender: sender.to_lowercase(),
                        amount: value,
                    });
                }
            }
        }
    }
    transfers
}

/// Classifies a transaction that touched the vault.
///
/// Order of checks: on-chain failure, transfer shape, amount floor, memo,
/// amount ceiling, then the mint-disabled switch.
pub fn validate_tx_to_vault(tx: &TxResponse, rules: &DepositRules) -> DepositValidation {
    let mut result = DepositValidation {
        outcome: DepositOutcome::Failed,
        transaction_hash: tx.hash.clone(),
        height: tx.height,
        sender_address: String::new(),
        amount: U256::ZERO,
        memo: tx.memo.clone(),
    };

    if tx.code != 0 {
        if let Some(msg) = tx.messages.first() {
            result.sender_address = msg.from_address.to_lowercase();
            result.amount = msg
                .amount
                .iter()
                .find(|c| c.denom == rules.coin_denom)
                .and_then(|c| U256::from_str(&c.amount).ok())
                .unwrap_or(U256::ZERO);
        }
        debug!("[VALIDATE] tx {} failed on chain with code {}", tx.hash, tx.code);
        return result;
    }

    let transfers = transfers_to(tx, &rules.vault_address, &rules.coin_denom);
    if transfers.len() != 1 {
        result.outcome =
            DepositOutcome::Discarded(format!("expected 1 transfer to vault, got {}", transfers.len()));
        return result;
    }
    let transfer = &transfers[0];
    result.sender_address = transfer.sender.clone();
    result.amount = transfer.amount;

    if transfer.amount.is_zero() {
        result.outcome = DepositOutcome::Discarded("zero amount".to_string());
        return result;
    }
    if transfer.amount <= rules.min_amount {
        result.outcome = DepositOutcome::Discarded(format!(
            "amount {} not above minimum {}",
            transfer.amount, rules.min_amount
        ));
        return result;
    }

    let memo = match parse_memo(&tx.memo, &rules.destination_chain_id) {
        Ok(memo) => memo,
        Err(e) => {
            result.outcome = DepositOutcome::Refund(e.to_string());
            return result;
        }
    };

    if transfer.amount > rules.max_mint_limit {
        result.outcome = DepositOutcome::Refund(format!(
            "amount {} above max mint limit {}",
            transfer.amount, rules.max_mint_limit
        ));
        return result;
    }

    if rules.mint_disabled {
        result.outcome = DepositOutcome::Refund("minting is disabled".to_string());
        return result;
    }

    result.outcome = DepositOutcome::Mint(memo);
    result
}
