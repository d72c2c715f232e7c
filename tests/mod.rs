//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    address_topic, build_test_config, burn_log, burn_receipt, committee_multisig, committee_public_keys,
    create_base_burn, create_base_invalid_mint, create_base_mint, deposit_tx, failed_deposit_tx, minted_event,
    source_address, test_context, test_context_with_settings, test_settings, test_store, u256_topic, valid_memo, validator_signer,
    vault_address, MockCosmos, MockEvm, MockMintController, MockWrappedToken, TestChains, DUMMY_ACCOUNT_NUMBER,
    DUMMY_BURNER_ADDR_EVM, DUMMY_DENOM, DUMMY_DESTINATION_BLOCK, DUMMY_DESTINATION_CHAIN_ID, DUMMY_GAS_LIMIT,
    DUMMY_MAX_MINT_LIMIT, DUMMY_MINT_CONTROLLER_ADDRESS, DUMMY_MNEMONIC, DUMMY_PREFIX, DUMMY_RECIPIENT_ADDR_EVM,
    DUMMY_SOURCE_CHAIN_ID, DUMMY_SOURCE_HEIGHT, DUMMY_TX_FEE, DUMMY_TX_HASH_1, DUMMY_TX_HASH_2, DUMMY_TX_HASH_3,
    DUMMY_WPOKT_ADDRESS,
};
