//! Signing Capability Module
//!
//! One validator identity signs on both chains: 64-byte low-S secp256k1
//! signatures over sha256 for the source chain, and 65-byte recoverable
//! signatures over a keccak digest for the destination chain.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Key material stays inside the signer. Callers only receive
//! public keys, addresses and signatures.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::crypto::{self, ADDRESS_LENGTH, COSMOS_PUBLIC_KEY_LENGTH};
use crate::error::{BridgeError, BridgeResult};
use crate::gcp::GcpAuth;

pub mod kms;
pub mod mnemonic;

pub use kms::GcpKmsSigner;
pub use mnemonic::MnemonicSigner;

/// Signing capability shared by the signers and the health reporter.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Compressed secp256k1 public key used on the source chain.
    fn cosmos_public_key(&self) -> [u8; COSMOS_PUBLIC_KEY_LENGTH];

    fn cosmos_address_bytes(&self) -> [u8; ADDRESS_LENGTH] {
        crypto::cosmos_address_bytes(&self.cosmos_public_key())
    }

    /// `0x`-prefixed hex of the source address, as recorded in signatures.
    fn cosmos_address_hex(&self) -> String {
        format!("0x{}", hex::encode(self.cosmos_address_bytes()))
    }

    /// Signs `sha256(message)`; the result is low-S `r || s`.
    async fn cosmos_sign(&self, message: &[u8]) -> BridgeResult<[u8; 64]>;

    /// Lowercase `0x` destination address.
    fn eth_address(&self) -> String;

    /// Signs a 32-byte digest; `v` is 27 or 28.
    async fn eth_sign(&self, digest: &[u8; 32]) -> BridgeResult<[u8; 65]>;
}

/// Picks the signer from configuration: mnemonic first, then the KMS key.
pub async fn build_signer(config: &Config, auth: Arc<GcpAuth>) -> BridgeResult<Arc<dyn Signer>> {
    let source = &config.source;
    if !source.mnemonic.trim().is_empty() {
        let override_key = config.destination.private_key.trim();
        let signer = if override_key.is_empty() {
            MnemonicSigner::from_mnemonic(&source.mnemonic)?
        } else {
            MnemonicSigner::from_mnemonic_with_eth_key(&source.mnemonic, override_key)?
        };
        return Ok(Arc::new(signer));
    }
    if !source.kms_key.trim().is_empty() {
        let signer = GcpKmsSigner::connect(auth, source.kms_key.trim()).await?;
        return Ok(Arc::new(signer));
    }
    Err(BridgeError::Config(
        "either source.mnemonic or source.kms_key must be set".to_string(),
    ))
}
