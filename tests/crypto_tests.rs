//! Unit tests for key handling and signatures on both chains

use alloy_primitives::U256;
use k256::ecdsa::SigningKey;

use bridge_validator::crypto::eip712::{domain_separator, mint_data_digest, Eip712Domain};
use bridge_validator::crypto::{
    bech32_decode, bech32_encode, eth_address, is_valid_bech32_address, recover_eth_address, sha256,
    sort_addresses, verify_cosmos_signature,
};
use bridge_validator::models::MintData;
use bridge_validator::signer::{MnemonicSigner, Signer};

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{validator_signer, DUMMY_MINT_CONTROLLER_ADDRESS, DUMMY_MNEMONIC, DUMMY_PREFIX, DUMMY_RECIPIENT_ADDR_EVM};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn test_domain() -> Eip712Domain {
    Eip712Domain {
        name: "MintController".to_string(),
        version: "1".to_string(),
        chain_id: U256::from(1u64),
        verifying_contract: DUMMY_MINT_CONTROLLER_ADDRESS.to_string(),
    }
}

fn test_mint_data(nonce: &str) -> MintData {
    MintData {
        recipient: DUMMY_RECIPIENT_ADDR_EVM.to_string(),
        amount: "50000".to_string(),
        nonce: nonce.to_string(),
    }
}

// ============================================================================
// DESTINATION CHAIN
// ============================================================================

/// Test the address derivation against the well-known key `0x...01`
#[test]
fn test_eth_address_known_vector() {
    let mut secret = [0u8; 32];
    secret[31] = 1;
    let key = SigningKey::from_slice(&secret).unwrap();
    assert_eq!(
        eth_address(key.verifying_key()),
        "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
    );
}

/// Test that the mnemonic derives the standard first Ethereum account
#[test]
fn test_mnemonic_eth_derivation() {
    let signer = MnemonicSigner::from_mnemonic(DUMMY_MNEMONIC).unwrap();
    assert_eq!(signer.eth_address(), "0x9858effd232b4033e47d90003d41ec34ecaeda94");
}

/// Test that a configured destination key overrides the mnemonic-derived one
#[test]
fn test_mnemonic_with_eth_key_override() {
    let key = format!("0x{}", "00".repeat(31) + "01");
    let signer = MnemonicSigner::from_mnemonic_with_eth_key(DUMMY_MNEMONIC, &key).unwrap();
    let plain = MnemonicSigner::from_mnemonic(DUMMY_MNEMONIC).unwrap();

    assert_eq!(signer.eth_address(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    assert_eq!(signer.cosmos_public_key(), plain.cosmos_public_key());
}

#[test]
fn test_invalid_mnemonic_rejected() {
    assert!(MnemonicSigner::from_mnemonic("not a real mnemonic phrase").is_err());
}

/// Test that a mint signature recovers to the signer with v in {27, 28}
/// Why: The mint controller recovers signers with ecrecover
#[tokio::test]
async fn test_eip712_sign_and_recover() {
    let signer = validator_signer(0);
    let digest = mint_data_digest(&test_domain(), &test_mint_data("6")).unwrap();

    let signature = signer.eth_sign(&digest).await.unwrap();

    assert!(signature[64] == 27 || signature[64] == 28);
    assert_eq!(recover_eth_address(&digest, &signature).unwrap(), signer.eth_address());
}

/// Test that the digest binds the nonce and the domain
#[test]
fn test_mint_digest_binds_fields() {
    let base = mint_data_digest(&test_domain(), &test_mint_data("6")).unwrap();
    assert_ne!(base, mint_data_digest(&test_domain(), &test_mint_data("7")).unwrap());

    let other_chain = Eip712Domain {
        chain_id: U256::from(5u64),
        ..test_domain()
    };
    assert_ne!(domain_separator(&test_domain()).unwrap(), domain_separator(&other_chain).unwrap());
    assert_ne!(base, mint_data_digest(&other_chain, &test_mint_data("6")).unwrap());
}

#[test]
fn test_mint_digest_rejects_bad_recipient() {
    let data = MintData {
        recipient: "0x1234".to_string(),
        ..test_mint_data("1")
    };
    assert!(mint_data_digest(&test_domain(), &data).is_err());
}

/// Test that addresses sort by numeric value and come out lowercase
#[test]
fn test_sort_addresses() {
    let sorted = sort_addresses(&[
        "0xB000000000000000000000000000000000000000".to_string(),
        "0x0a00000000000000000000000000000000000000".to_string(),
        "0x1000000000000000000000000000000000000000".to_string(),
    ]);
    assert_eq!(
        sorted,
        vec![
            "0x0a00000000000000000000000000000000000000".to_string(),
            "0x1000000000000000000000000000000000000000".to_string(),
            "0xb000000000000000000000000000000000000000".to_string(),
        ]
    );
}

// ============================================================================
// SOURCE CHAIN
// ============================================================================

/// Test that a source signature verifies against the signer's key and nothing else
#[tokio::test]
async fn test_cosmos_sign_and_verify() {
    let signer = validator_signer(0);
    let other = validator_signer(1);
    let message = b"sign document bytes";

    let signature = signer.cosmos_sign(message).await.unwrap();

    assert!(verify_cosmos_signature(&signer.cosmos_public_key(), message, &signature));
    assert!(!verify_cosmos_signature(&other.cosmos_public_key(), message, &signature));
    assert!(!verify_cosmos_signature(&signer.cosmos_public_key(), b"other bytes", &signature));
}

/// Test that the 33-byte key is compressed and the hex address has 20 bytes
#[test]
fn test_cosmos_identity_shape() {
    let signer = validator_signer(2);
    let key = signer.cosmos_public_key();
    assert!(key[0] == 0x02 || key[0] == 0x03);

    let hex_address = signer.cosmos_address_hex();
    assert!(hex_address.starts_with("0x"));
    assert_eq!(hex_address.len(), 42);
}

/// Test bech32 encoding with prefix checks
#[test]
fn test_bech32_prefix_checks() {
    let bytes = sha256(b"some key")[..20].to_vec();
    let address = bech32_encode(DUMMY_PREFIX, &bytes).unwrap();

    assert!(address.starts_with("pokt1"));
    assert_eq!(bech32_decode(DUMMY_PREFIX, &address).unwrap(), bytes);
    assert!(bech32_decode("cosmos", &address).is_err());
    assert!(is_valid_bech32_address(DUMMY_PREFIX, &address));
    assert!(!is_valid_bech32_address(DUMMY_PREFIX, "pokt1invalid"));
}
