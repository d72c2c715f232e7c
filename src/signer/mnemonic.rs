//! Mnemonic-derived signing keys.

use async_trait::async_trait;
use bip32::{DerivationPath, XPrv};
use k256::ecdsa::{signature::Signer as _, Signature, SigningKey};
use std::str::FromStr;

use super::Signer;
use crate::crypto::{self, COSMOS_PUBLIC_KEY_LENGTH};
use crate::error::{BridgeError, BridgeResult};

/// BIP-44 path of the source chain key.
pub const COSMOS_DERIVATION_PATH: &str = "m/44'/118'/0'/0/0";
/// BIP-44 path of the destination chain key.
pub const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Signer holding both keys in process memory.
pub struct MnemonicSigner {
    cosmos_key: SigningKey,
    cosmos_public_key: [u8; COSMOS_PUBLIC_KEY_LENGTH],
    eth_key: SigningKey,
    eth_address: String,
}

fn derive(seed: &[u8], path: &str) -> BridgeResult<SigningKey> {
    let path = DerivationPath::from_str(path).map_err(|e| BridgeError::Config(format!("bad derivation path: {}", e)))?;
    let xprv = XPrv::derive_from_path(seed, &path)
        .map_err(|e| BridgeError::Config(format!("key derivation failed: {}", e)))?;
    Ok(xprv.private_key().clone())
}

fn seed_from_mnemonic(phrase: &str) -> BridgeResult<[u8; 64]> {
    let mnemonic = bip39::Mnemonic::parse_normalized(phrase.trim())
        .map_err(|e| BridgeError::Config(format!("invalid mnemonic: {}", e)))?;
    Ok(mnemonic.to_seed(""))
}

impl MnemonicSigner {
    pub fn from_mnemonic(phrase: &str) -> BridgeResult<Self> {
        let seed = seed_from_mnemonic(phrase)?;
        let cosmos_key = derive(&seed, COSMOS_DERIVATION_PATH)?;
        let eth_key = derive(&seed, ETH_DERIVATION_PATH)?;
        Ok(Self::from_keys(cosmos_key, eth_key))
    }

    /// Source key from the mnemonic, destination key from a hex private key.
    pub fn from_mnemonic_with_eth_key(phrase: &str, eth_private_key: &str) -> BridgeResult<Self> {
        let seed = seed_from_mnemonic(phrase)?;
        let cosmos_key = derive(&seed, COSMOS_DERIVATION_PATH)?;
        let bytes = hex::decode(eth_private_key.trim().trim_start_matches("0x"))
            .map_err(|e| BridgeError::Config(format!("invalid destination private key hex: {}", e)))?;
        let eth_key = SigningKey::from_slice(&bytes)
            .map_err(|e| BridgeError::Config(format!("invalid destination private key: {}", e)))?;
        Ok(Self::from_keys(cosmos_key, eth_key))
    }

    pub fn from_keys(cosmos_key: SigningKey, eth_key: SigningKey) -> Self {
        let mut cosmos_public_key = [0u8; COSMOS_PUBLIC_KEY_LENGTH];
        cosmos_public_key.copy_from_slice(cosmos_key.verifying_key().to_encoded_point(true).as_bytes());
        let eth_address = crypto::eth_address(eth_key.verifying_key());
        Self {
            cosmos_key,
            cosmos_public_key,
            eth_key,
            eth_address,
        }
    }
}

#[async_trait]
impl Signer for MnemonicSigner {
    fn cosmos_public_key(&self) -> [u8; COSMOS_PUBLIC_KEY_LENGTH] {
        self.cosmos_public_key
    }

    async fn cosmos_sign(&self, message: &[u8]) -> BridgeResult<[u8; 64]> {
        let signature: Signature = self
            .cosmos_key
            .try_sign(message)
            .map_err(|e| BridgeError::Signing(e.to_string()))?;
        let mut out = [0u8; 64];
        out.copy_from_slice(&signature.to_bytes());
        Ok(out)
    }

    fn eth_address(&self) -> String {
        self.eth_address.clone()
    }

    async fn eth_sign(&self, digest: &[u8; 32]) -> BridgeResult<[u8; 65]> {
        let (signature, _) = self
            .eth_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| BridgeError::Signing(e.to_string()))?;
        crypto::to_eth_signature(digest, &signature, self.eth_key.verifying_key())
            .map_err(|e| BridgeError::Signing(e.to_string()))
    }
}
