//! Legacy amino multisig public key of the source vault.

use prost::Message;

use super::proto::{Any, LegacyAminoPubKey, Secp256k1PubKey, LEGACY_AMINO_PUBKEY_TYPE_URL, SECP256K1_PUBKEY_TYPE_URL};
use crate::crypto::{bech32_encode, cosmos_address_bytes, parse_cosmos_public_key, sha256, ADDRESS_LENGTH, COSMOS_PUBLIC_KEY_LENGTH};
use crate::error::{BridgeError, BridgeResult};

const AMINO_MULTISIG_PREFIX: [u8; 4] = [0x22, 0xc1, 0xf7, 0xe2];
const AMINO_SECP256K1_PREFIX: [u8; 4] = [0xeb, 0x5a, 0xe9, 0x87];

/// Threshold key over secp256k1 members, kept in address order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigKey {
    threshold: u32,
    public_keys: Vec<[u8; COSMOS_PUBLIC_KEY_LENGTH]>,
}

impl MultisigKey {
    /// Builds the key, sorting members by their address bytes.
    pub fn new(threshold: u32, mut public_keys: Vec<[u8; COSMOS_PUBLIC_KEY_LENGTH]>) -> BridgeResult<Self> {
        let n = public_keys.len();
        if n < 2 {
            return Err(BridgeError::Invariant(format!(
                "multisig needs at least 2 public keys, got {}",
                n
            )));
        }
        if threshold == 0 || threshold as usize > n {
            return Err(BridgeError::Invariant(format!(
                "multisig threshold {} out of range 1..={}",
                threshold, n
            )));
        }

        public_keys.sort_by_key(|key| cosmos_address_bytes(key));
        if public_keys.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(BridgeError::Invariant("duplicate multisig public key".to_string()));
        }

        Ok(Self { threshold, public_keys })
    }

    /// Parses hex-encoded member keys.
    pub fn from_hex(threshold: u32, hex_keys: &[String]) -> BridgeResult<Self> {
        let keys = hex_keys
            .iter()
            .map(|key| parse_cosmos_public_key(key).map_err(|e| BridgeError::Invariant(e.to_string())))
            .collect::<BridgeResult<Vec<_>>>()?;
        Self::new(threshold, keys)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Member keys in address order.
    pub fn public_keys(&self) -> &[[u8; COSMOS_PUBLIC_KEY_LENGTH]] {
        &self.public_keys
    }

    pub fn index_of(&self, public_key: &[u8]) -> Option<usize> {
        self.public_keys.iter().position(|key| key.as_slice() == public_key)
    }

    /// Amino binary encoding, the preimage of the multisig address.
    pub fn amino_bytes(&self) -> Vec<u8> {
        let mut out = AMINO_MULTISIG_PREFIX.to_vec();
        out.push(0x08);
        prost::encoding::encode_varint(self.threshold as u64, &mut out);
        for key in &self.public_keys {
            out.push(0x12);
            out.push((AMINO_SECP256K1_PREFIX.len() + 1 + COSMOS_PUBLIC_KEY_LENGTH) as u8);
            out.extend_from_slice(&AMINO_SECP256K1_PREFIX);
            out.push(COSMOS_PUBLIC_KEY_LENGTH as u8);
            out.extend_from_slice(key);
        }
        out
    }

    pub fn address_bytes(&self) -> [u8; ADDRESS_LENGTH] {
        let hash = sha256(&self.amino_bytes());
        let mut address = [0u8; ADDRESS_LENGTH];
        address.copy_from_slice(&hash[..ADDRESS_LENGTH]);
        address
    }

    pub fn address(&self, prefix: &str) -> BridgeResult<String> {
        bech32_encode(prefix, &self.address_bytes()).map_err(|e| BridgeError::Invariant(e.to_string()))
    }

    /// The key as it appears in `SignerInfo.public_key`.
    pub fn to_any(&self) -> Any {
        let public_keys = self
            .public_keys
            .iter()
            .map(|key| Any {
                type_url: SECP256K1_PUBKEY_TYPE_URL.to_string(),
                value: Secp256k1PubKey { key: key.to_vec() }.encode_to_vec(),
            })
            .collect();
        Any {
            type_url: LEGACY_AMINO_PUBKEY_TYPE_URL.to_string(),
            value: LegacyAminoPubKey {
                threshold: self.threshold,
                public_keys,
            }
            .encode_to_vec(),
        }
    }

    /// Checks the configured vault against this key set and this node's key.
    pub fn check_vault(&self, prefix: &str, vault_address: &str, own_key: &[u8]) -> BridgeResult<()> {
        if self.index_of(own_key).is_none() {
            return Err(BridgeError::Invariant(
                "this node's public key is not a multisig member".to_string(),
            ));
        }
        let derived = self.address(prefix)?;
        if !derived.eq_ignore_ascii_case(vault_address) {
            return Err(BridgeError::Invariant(format!(
                "multisig address mismatch: derived {}, configured {}",
                derived, vault_address
            )));
        }
        Ok(())
    }
}
