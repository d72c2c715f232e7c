//! EIP-712 typed data for mint authorizations.
//!
//! The mint controller verifies signatures over
//! `MintData(address recipient,uint256 amount,uint256 nonce)` under its
//! `EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)`.

use alloy_primitives::U256;
use anyhow::{Context, Result};
use std::str::FromStr;

use super::{keccak256, parse_eth_address};
use crate::models::MintData;

pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
pub const MINT_DATA_TYPE: &str = "MintData(address recipient,uint256 amount,uint256 nonce)";

/// Signing domain advertised by the mint controller (EIP-5267).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: U256,
    pub verifying_contract: String,
}

fn address_word(address: &str) -> Result<[u8; 32]> {
    let bytes = parse_eth_address(address)?;
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

fn uint_word(value: &str) -> Result<[u8; 32]> {
    let parsed = U256::from_str(value).with_context(|| format!("Invalid uint256: {}", value))?;
    Ok(parsed.to_be_bytes::<32>())
}

pub fn domain_separator(domain: &Eip712Domain) -> Result<[u8; 32]> {
    let mut encoded = Vec::with_capacity(32 * 5);
    encoded.extend_from_slice(&keccak256(DOMAIN_TYPE.as_bytes()));
    encoded.extend_from_slice(&keccak256(domain.name.as_bytes()));
    encoded.extend_from_slice(&keccak256(domain.version.as_bytes()));
    encoded.extend_from_slice(&domain.chain_id.to_be_bytes::<32>());
    encoded.extend_from_slice(&address_word(&domain.verifying_contract)?);
    Ok(keccak256(&encoded))
}

pub fn mint_data_hash(data: &MintData) -> Result<[u8; 32]> {
    let mut encoded = Vec::with_capacity(32 * 4);
    encoded.extend_from_slice(&keccak256(MINT_DATA_TYPE.as_bytes()));
    encoded.extend_from_slice(&address_word(&data.recipient)?);
    encoded.extend_from_slice(&uint_word(&data.amount)?);
    encoded.extend_from_slice(&uint_word(&data.nonce)?);
    Ok(keccak256(&encoded))
}

/// `keccak256(0x19 0x01 || domainSeparator || hashStruct(MintData))`
pub fn mint_data_digest(domain: &Eip712Domain, data: &MintData) -> Result<[u8; 32]> {
    let mut encoded = Vec::with_capacity(2 + 64);
    encoded.extend_from_slice(&[0x19, 0x01]);
    encoded.extend_from_slice(&domain_separator(domain)?);
    encoded.extend_from_slice(&mint_data_hash(data)?);
    Ok(keccak256(&encoded))
}
