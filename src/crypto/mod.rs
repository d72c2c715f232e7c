//! Cryptographic Operations Module
//!
//! Hashing, address derivation and secp256k1 signature handling for both
//! chains. The destination chain uses Ethereum conventions (keccak256,
//! 65-byte `r || s || v` signatures); the source chain uses Cosmos
//! conventions (sha256, ripemd160 addresses, bech32, 64-byte `r || s`).
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Private keys never leave the signer implementations. This
//! module only sees public keys, digests and signatures.

use anyhow::{Context, Result};
use bech32::{Bech32, Hrp};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use ripemd::Ripemd160;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

pub mod eip712;

/// Length of a compressed secp256k1 public key.
pub const COSMOS_PUBLIC_KEY_LENGTH: usize = 33;

/// Length of an account address on either chain.
pub const ADDRESS_LENGTH: usize = 20;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

// ============================================================================
// HASHING
// ============================================================================

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

// ============================================================================
// DESTINATION (EVM) ADDRESSES AND SIGNATURES
// ============================================================================

/// Derives the Ethereum address from an ECDSA public key.
///
/// The Ethereum address is computed as:
/// keccak256(uncompressed_public_key)[12:32] (last 20 bytes)
///
/// # Returns
///
/// Lowercase address with `0x` prefix
pub fn eth_address(verifying_key: &VerifyingKey) -> String {
    let point = verifying_key.to_encoded_point(false);
    // Uncompressed format: 0x04 || x (32 bytes) || y (32 bytes)
    let hash = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..32]))
}

/// True for `0x` followed by exactly 40 hex characters.
pub fn is_valid_eth_address(address: &str) -> bool {
    match address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) {
        Some(body) => body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Parses a 20-byte hex address.
pub fn parse_eth_address(address: &str) -> Result<[u8; ADDRESS_LENGTH]> {
    if !is_valid_eth_address(address) {
        return Err(anyhow::anyhow!("Invalid EVM address: {}", address));
    }
    let bytes = hex::decode(&address[2..]).context("Invalid EVM address hex")?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("EVM address must be 20 bytes"))
}

/// Sorts addresses ascending by numeric value and lowercases them.
pub fn sort_addresses(addresses: &[String]) -> Vec<String> {
    let mut sorted: Vec<String> = addresses.iter().map(|a| a.to_lowercase()).collect();
    sorted.sort_by_key(|a| parse_eth_address(a).unwrap_or([0xff; ADDRESS_LENGTH]));
    sorted
}

/// Turns a 64-byte prehash signature into an Ethereum `r || s || v` signature.
///
/// The recovery id is found by recovering against the expected public key.
/// High-S signatures are normalized first since the EVM rejects them.
///
/// # Arguments
///
/// * `digest` - The 32-byte hash that was signed
/// * `signature` - The ECDSA signature over `digest`
/// * `expected` - Public key that produced the signature
pub fn to_eth_signature(
    digest: &[u8; 32],
    signature: &EcdsaSignature,
    expected: &VerifyingKey,
) -> Result<[u8; 65]> {
    let signature = signature.normalize_s().unwrap_or_else(|| signature.clone());

    let mut recovery = None;
    for id in 0u8..2 {
        let Some(recovery_id) = RecoveryId::from_byte(id) else {
            continue;
        };
        if let Ok(recovered) = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id) {
            if recovered == *expected {
                recovery = Some(id);
                break;
            }
        }
    }
    let recovery_id =
        recovery.ok_or_else(|| anyhow::anyhow!("Signature does not recover to the signer key"))?;

    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&signature.to_bytes());
    // Ethereum format (27 or 28)
    out[64] = recovery_id + 27;
    Ok(out)
}

/// Recovers the signer address of an Ethereum `r || s || v` signature.
pub fn recover_eth_address(digest: &[u8; 32], signature: &[u8]) -> Result<String> {
    if signature.len() != 65 {
        return Err(anyhow::anyhow!(
            "Invalid signature length: expected 65 bytes, got {}",
            signature.len()
        ));
    }
    let v = signature[64];
    let id = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => return Err(anyhow::anyhow!("Invalid recovery byte {}", v)),
    };
    let sig = EcdsaSignature::from_slice(&signature[..64]).context("Malformed signature")?;
    let recovery_id =
        RecoveryId::from_byte(id).ok_or_else(|| anyhow::anyhow!("Invalid recovery id"))?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .context("Failed to recover public key")?;
    Ok(eth_address(&key))
}

// ============================================================================
// SOURCE (COSMOS) ADDRESSES AND SIGNATURES
// ============================================================================

/// Address of a compressed secp256k1 key: ripemd160(sha256(pubkey)).
pub fn cosmos_address_bytes(public_key: &[u8]) -> [u8; ADDRESS_LENGTH] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(public_key));
    hasher.finalize().into()
}

/// Parses a hex-encoded 33-byte compressed secp256k1 public key.
pub fn parse_cosmos_public_key(hex_key: &str) -> Result<[u8; COSMOS_PUBLIC_KEY_LENGTH]> {
    let trimmed = hex_key.trim().trim_start_matches("0x");
    let bytes = hex::decode(trimmed).with_context(|| format!("Invalid public key hex: {}", hex_key))?;
    let key: [u8; COSMOS_PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|b: Vec<u8>| {
        anyhow::anyhow!(
            "Invalid public key length: expected {} bytes, got {}",
            COSMOS_PUBLIC_KEY_LENGTH,
            b.len()
        )
    })?;
    VerifyingKey::from_sec1_bytes(&key).context("Public key is not on secp256k1")?;
    Ok(key)
}

pub fn bech32_encode(prefix: &str, bytes: &[u8]) -> Result<String> {
    let hrp = Hrp::parse(prefix).with_context(|| format!("Invalid bech32 prefix: {}", prefix))?;
    bech32::encode::<Bech32>(hrp, bytes).context("Failed to bech32-encode address")
}

/// Decodes a bech32 address, checking its prefix.
pub fn bech32_decode(prefix: &str, address: &str) -> Result<Vec<u8>> {
    let (hrp, bytes) =
        bech32::decode(address).with_context(|| format!("Invalid bech32 address: {}", address))?;
    if !hrp.as_str().eq_ignore_ascii_case(prefix) {
        return Err(anyhow::anyhow!(
            "Unexpected bech32 prefix {} in {}, expected {}",
            hrp,
            address,
            prefix
        ));
    }
    Ok(bytes)
}

pub fn is_valid_bech32_address(prefix: &str, address: &str) -> bool {
    bech32_decode(prefix, address)
        .map(|bytes| bytes.len() == ADDRESS_LENGTH)
        .unwrap_or(false)
}

/// Verifies a 64-byte `r || s` signature over `message` (hashed with sha256).
pub fn verify_cosmos_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    use k256::ecdsa::signature::Verifier;

    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(sig) = EcdsaSignature::from_slice(signature) else {
        return false;
    };
    // The source chain rejects malleable signatures.
    if sig.normalize_s().is_some() {
        return false;
    }
    key.verify(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_addresses_is_numeric() {
        let sorted = sort_addresses(&[
            "0xB000000000000000000000000000000000000000".to_string(),
            "0x0a00000000000000000000000000000000000000".to_string(),
        ]);
        assert_eq!(sorted[0], "0x0a00000000000000000000000000000000000000");
        assert_eq!(sorted[1], "0xb000000000000000000000000000000000000000");
    }

    #[test]
    fn test_is_valid_eth_address() {
        assert!(is_valid_eth_address(ZERO_ADDRESS));
        assert!(!is_valid_eth_address("0x1234"));
        assert!(!is_valid_eth_address("ab5801a7d398351b8be11c439e05c5b3259aec9b"));
    }
}
