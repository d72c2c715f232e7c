//! Shared test helpers
//!
//! The module is organized into several categories:
//! - **Constants**: Dummy chain parameters, addresses and hashes
//! - **Committee**: Three deterministic validators sharing a 2-of-3 vault
//! - **Mock Chains**: In-process implementations of the chain capabilities
//! - **Builders**: Test configurations, worker contexts, transactions and documents

#![allow(dead_code)]

use alloy_primitives::U256;
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bridge_validator::config::{
    Config, DestinationConfig, HealthConfig, LoggerConfig, MongoConfig, SecretManagerConfig, ServiceConfig,
    SourceConfig,
};
use bridge_validator::cosmos::proto::MSG_SEND_TYPE_URL;
use bridge_validator::cosmos::{
    normalize_tx_hash, Account, CoinAmount, CosmosClient, EventAttribute, GasInfo, MultisigKey, SendMessage, TxEvent,
    TxResponse,
};
use bridge_validator::crypto::eip712::Eip712Domain;
use bridge_validator::crypto::{bech32_encode, sha256};
use bridge_validator::error::{BridgeError, BridgeResult};
use bridge_validator::evm::contracts::BURN_AND_BRIDGE_EVENT;
use bridge_validator::evm::{
    abi, BurnAndBridgeEvent, EvmClient, EvmLog, EvmTransaction, MintControllerContract, MintedEvent,
    TransactionReceipt, WrappedTokenContract,
};
use bridge_validator::models::{now, Burn, InvalidMint, Mint, MintMemo, Status};
use bridge_validator::signer::{MnemonicSigner, Signer};
use bridge_validator::store::{LockOptions, MemoryStore};
use bridge_validator::workers::{BridgeSettings, WorkerContext};

// ============================================================================
// CONSTANTS
// ============================================================================

// -------------------------------- CHAINS --------------------------------

pub const DUMMY_SOURCE_CHAIN_ID: &str = "poktroll";
pub const DUMMY_DESTINATION_CHAIN_ID: u64 = 1;
pub const DUMMY_PREFIX: &str = "pokt";
pub const DUMMY_DENOM: &str = "upokt";
pub const DUMMY_TX_FEE: u64 = 10_000;
pub const DUMMY_GAS_LIMIT: u64 = 200_000;
pub const DUMMY_MAX_MINT_LIMIT: u64 = 1_000_000;
pub const DUMMY_ACCOUNT_NUMBER: u64 = 7;

/// Latest source height reported by the mock chain
pub const DUMMY_SOURCE_HEIGHT: u64 = 100;

/// Latest destination block reported by the mock chain
pub const DUMMY_DESTINATION_BLOCK: u64 = 1_000;

// ------------------------- TOKENS AND CONTRACTS -------------------------

pub const DUMMY_WPOKT_ADDRESS: &str = "0x00000000000000000000000000000000000000a1";
pub const DUMMY_MINT_CONTROLLER_ADDRESS: &str = "0x00000000000000000000000000000000000000a2";

// -------------------------------- USERS ---------------------------------

/// Mint recipient on the destination chain
pub const DUMMY_RECIPIENT_ADDR_EVM: &str = "0xab5801a7d398351b8be11c439e05c5b3259aec9b";

/// Holder burning wrapped tokens on the destination chain
pub const DUMMY_BURNER_ADDR_EVM: &str = "0x00000000000000000000000000000000000000b1";

// -------------------------------- HASHES --------------------------------

pub const DUMMY_TX_HASH_1: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
pub const DUMMY_TX_HASH_2: &str = "0x0000000000000000000000000000000000000000000000000000000000000002";
pub const DUMMY_TX_HASH_3: &str = "0x0000000000000000000000000000000000000000000000000000000000000003";

/// Well-known BIP-39 test phrase
pub const DUMMY_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

// ============================================================================
// COMMITTEE
// ============================================================================

/// Validator `index` of the three-member test committee.
pub fn validator_signer(index: u8) -> Arc<MnemonicSigner> {
    let cosmos_key = SigningKey::from_slice(&[index + 1; 32]).unwrap();
    let eth_key = SigningKey::from_slice(&[index + 0x41; 32]).unwrap();
    Arc::new(MnemonicSigner::from_keys(cosmos_key, eth_key))
}

pub fn committee_public_keys() -> Vec<[u8; 33]> {
    (0..3).map(|i| validator_signer(i).cosmos_public_key()).collect()
}

/// 2-of-3 vault key of the test committee.
pub fn committee_multisig() -> MultisigKey {
    MultisigKey::new(2, committee_public_keys()).unwrap()
}

pub fn vault_address() -> String {
    committee_multisig().address(DUMMY_PREFIX).unwrap().to_lowercase()
}

/// Deterministic source address filled with `seed`.
pub fn source_address(seed: u8) -> String {
    bech32_encode(DUMMY_PREFIX, &[seed; 20]).unwrap()
}

// ============================================================================
// MOCK SOURCE CHAIN
// ============================================================================

pub struct CosmosState {
    pub height: u64,
    pub chain_id: String,
    /// Transactions returned by the vault search
    pub deposits: Vec<TxResponse>,
    /// Transactions returned by hash lookups
    pub txs: HashMap<String, TxResponse>,
    pub account: Account,
    pub broadcasts: Vec<Vec<u8>>,
    pub broadcast_error: Option<String>,
    pub fail_searches: bool,
}

pub struct MockCosmos {
    pub state: Mutex<CosmosState>,
}

impl MockCosmos {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CosmosState {
                height: DUMMY_SOURCE_HEIGHT,
                chain_id: DUMMY_SOURCE_CHAIN_ID.to_string(),
                deposits: Vec::new(),
                txs: HashMap::new(),
                account: Account {
                    account_number: DUMMY_ACCOUNT_NUMBER,
                    sequence: 3,
                },
                broadcasts: Vec::new(),
                broadcast_error: None,
                fail_searches: false,
            }),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.state.lock().unwrap().height = height;
    }

    /// Makes `tx` visible to both the vault search and hash lookups.
    pub fn add_deposit(&self, tx: TxResponse) {
        let mut state = self.state.lock().unwrap();
        state.txs.insert(normalize_tx_hash(&tx.hash), tx.clone());
        state.deposits.push(tx);
    }

    pub fn set_tx(&self, tx: TxResponse) {
        self.state.lock().unwrap().txs.insert(normalize_tx_hash(&tx.hash), tx);
    }

    pub fn remove_tx(&self, hash: &str) {
        self.state.lock().unwrap().txs.remove(&normalize_tx_hash(hash));
    }

    pub fn set_sequence(&self, sequence: u64) {
        self.state.lock().unwrap().account.sequence = sequence;
    }

    pub fn set_fail_searches(&self, fail: bool) {
        self.state.lock().unwrap().fail_searches = fail;
    }

    pub fn set_broadcast_error(&self, error: Option<&str>) {
        self.state.lock().unwrap().broadcast_error = error.map(str::to_string);
    }

    pub fn broadcast_count(&self) -> usize {
        self.state.lock().unwrap().broadcasts.len()
    }

    /// Hash the mock reports for broadcast bytes.
    pub fn hash_of(tx_bytes: &[u8]) -> String {
        normalize_tx_hash(&hex::encode_upper(sha256(tx_bytes)))
    }
}

#[async_trait]
impl CosmosClient for MockCosmos {
    async fn get_latest_block_height(&self) -> BridgeResult<u64> {
        Ok(self.state.lock().unwrap().height)
    }

    async fn get_chain_id(&self) -> BridgeResult<String> {
        Ok(self.state.lock().unwrap().chain_id.clone())
    }

    async fn get_txs_sent_to_address_after_height(&self, _address: &str, height: u64) -> BridgeResult<Vec<TxResponse>> {
        let state = self.state.lock().unwrap();
        if state.fail_searches {
            return Err(BridgeError::ChainRpc("search unavailable".to_string()));
        }
        let mut txs: Vec<TxResponse> = state.deposits.iter().filter(|tx| tx.height >= height).cloned().collect();
        txs.sort_by_key(|tx| tx.height);
        Ok(txs)
    }

    async fn get_txs_sent_from_address_after_height(
        &self,
        _address: &str,
        _height: u64,
    ) -> BridgeResult<Vec<TxResponse>> {
        Ok(Vec::new())
    }

    async fn get_tx(&self, hash: &str) -> BridgeResult<Option<TxResponse>> {
        Ok(self.state.lock().unwrap().txs.get(&normalize_tx_hash(hash)).cloned())
    }

    async fn get_account(&self, _address: &str) -> BridgeResult<Account> {
        Ok(self.state.lock().unwrap().account)
    }

    async fn simulate(&self, _tx_bytes: &[u8]) -> BridgeResult<GasInfo> {
        Ok(GasInfo {
            gas_wanted: DUMMY_GAS_LIMIT,
            gas_used: DUMMY_GAS_LIMIT / 2,
        })
    }

    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> BridgeResult<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = &state.broadcast_error {
            return Err(BridgeError::ChainRpc(error.clone()));
        }
        state.broadcasts.push(tx_bytes.to_vec());
        Ok(hex::encode_upper(sha256(tx_bytes)))
    }
}

// ============================================================================
// MOCK DESTINATION CHAIN
// ============================================================================

pub struct EvmState {
    pub block_number: u64,
    pub chain_id: u64,
    pub receipts: HashMap<String, TransactionReceipt>,
}

pub struct MockEvm {
    pub state: Mutex<EvmState>,
}

impl MockEvm {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EvmState {
                block_number: DUMMY_DESTINATION_BLOCK,
                chain_id: DUMMY_DESTINATION_CHAIN_ID,
                receipts: HashMap::new(),
            }),
        }
    }

    pub fn set_block_number(&self, block_number: u64) {
        self.state.lock().unwrap().block_number = block_number;
    }

    pub fn set_receipt(&self, receipt: TransactionReceipt) {
        self.state
            .lock()
            .unwrap()
            .receipts
            .insert(receipt.transaction_hash.to_lowercase(), receipt);
    }
}

#[async_trait]
impl EvmClient for MockEvm {
    async fn get_block_number(&self) -> BridgeResult<u64> {
        Ok(self.state.lock().unwrap().block_number)
    }

    async fn get_chain_id(&self) -> BridgeResult<u64> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn get_transaction_by_hash(&self, _hash: &str) -> BridgeResult<Option<EvmTransaction>> {
        Ok(None)
    }

    async fn get_transaction_receipt(&self, hash: &str) -> BridgeResult<Option<TransactionReceipt>> {
        Ok(self.state.lock().unwrap().receipts.get(&hash.to_lowercase()).cloned())
    }

    async fn get_logs(&self, _address: &str, _topic0: &str, _from: u64, _to: u64) -> BridgeResult<Vec<EvmLog>> {
        Ok(Vec::new())
    }

    async fn call(&self, to: &str, _data: &[u8]) -> BridgeResult<Vec<u8>> {
        Err(BridgeError::ChainRpc(format!("no contract at {}", to)))
    }
}

pub struct TokenState {
    pub nonces: HashMap<String, U256>,
    pub minted: Vec<MintedEvent>,
    pub burns: Vec<BurnAndBridgeEvent>,
    pub fail_burn_queries: bool,
    /// Inclusive ranges passed to the event filters
    pub queried: Vec<(u64, u64)>,
}

pub struct MockWrappedToken {
    pub state: Mutex<TokenState>,
}

impl MockWrappedToken {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TokenState {
                nonces: HashMap::new(),
                minted: Vec::new(),
                burns: Vec::new(),
                fail_burn_queries: false,
                queried: Vec::new(),
            }),
        }
    }

    pub fn set_nonce(&self, address: &str, nonce: u64) {
        self.state
            .lock()
            .unwrap()
            .nonces
            .insert(address.to_lowercase(), U256::from(nonce));
    }

    pub fn add_minted(&self, event: MintedEvent) {
        self.state.lock().unwrap().minted.push(event);
    }

    pub fn add_burn(&self, event: BurnAndBridgeEvent) {
        self.state.lock().unwrap().burns.push(event);
    }

    pub fn set_fail_burn_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_burn_queries = fail;
    }

    pub fn queried_ranges(&self) -> Vec<(u64, u64)> {
        self.state.lock().unwrap().queried.clone()
    }
}

#[async_trait]
impl WrappedTokenContract for MockWrappedToken {
    fn address(&self) -> &str {
        DUMMY_WPOKT_ADDRESS
    }

    async fn get_user_nonce(&self, address: &str) -> BridgeResult<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nonces
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn filter_minted_logs(&self, from_block: u64, to_block: u64) -> BridgeResult<Vec<MintedEvent>> {
        let mut state = self.state.lock().unwrap();
        state.queried.push((from_block, to_block));
        Ok(state
            .minted
            .iter()
            .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
            .cloned()
            .collect())
    }

    async fn filter_burn_and_bridge_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> BridgeResult<Vec<BurnAndBridgeEvent>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_burn_queries {
            return Err(BridgeError::ChainRpc("eth_getLogs unavailable".to_string()));
        }
        state.queried.push((from_block, to_block));
        Ok(state
            .burns
            .iter()
            .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
            .cloned()
            .collect())
    }
}

pub struct ControllerState {
    pub validator_count: U256,
    pub max_mint_limit: U256,
    pub domain: Eip712Domain,
}

pub struct MockMintController {
    pub state: Mutex<ControllerState>,
}

impl MockMintController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ControllerState {
                validator_count: U256::from(3u64),
                max_mint_limit: U256::from(DUMMY_MAX_MINT_LIMIT),
                domain: Eip712Domain {
                    name: "MintController".to_string(),
                    version: "1".to_string(),
                    chain_id: U256::from(DUMMY_DESTINATION_CHAIN_ID),
                    verifying_contract: DUMMY_MINT_CONTROLLER_ADDRESS.to_string(),
                },
            }),
        }
    }

    pub fn set_max_mint_limit(&self, limit: u64) {
        self.state.lock().unwrap().max_mint_limit = U256::from(limit);
    }

    pub fn set_validator_count(&self, count: u64) {
        self.state.lock().unwrap().validator_count = U256::from(count);
    }

    pub fn domain(&self) -> Eip712Domain {
        self.state.lock().unwrap().domain.clone()
    }
}

#[async_trait]
impl MintControllerContract for MockMintController {
    async fn validator_count(&self) -> BridgeResult<U256> {
        Ok(self.state.lock().unwrap().validator_count)
    }

    async fn max_mint_limit(&self) -> BridgeResult<U256> {
        Ok(self.state.lock().unwrap().max_mint_limit)
    }

    async fn eip712_domain(&self) -> BridgeResult<Eip712Domain> {
        Ok(self.domain())
    }
}

/// The four chain capabilities, shared by every node of a test.
pub struct TestChains {
    pub cosmos: Arc<MockCosmos>,
    pub evm: Arc<MockEvm>,
    pub token: Arc<MockWrappedToken>,
    pub controller: Arc<MockMintController>,
}

impl TestChains {
    pub fn new() -> Self {
        Self {
            cosmos: Arc::new(MockCosmos::new()),
            evm: Arc::new(MockEvm::new()),
            token: Arc::new(MockWrappedToken::new()),
            controller: Arc::new(MockMintController::new()),
        }
    }
}

// ============================================================================
// BUILDERS
// ============================================================================

// --------------------------- CONFIG AND CONTEXT ---------------------------

/// Settings of the test bridge: 2 source and 3 destination confirmations.
pub fn test_settings() -> BridgeSettings {
    BridgeSettings {
        vault_address: vault_address(),
        wpokt_address: DUMMY_WPOKT_ADDRESS.to_string(),
        source_chain_id: DUMMY_SOURCE_CHAIN_ID.to_string(),
        destination_chain_id: DUMMY_DESTINATION_CHAIN_ID.to_string(),
        bech32_prefix: DUMMY_PREFIX.to_string(),
        coin_denom: DUMMY_DENOM.to_string(),
        tx_fee: DUMMY_TX_FEE,
        gas_limit: DUMMY_GAS_LIMIT,
        source_confirmations: 2,
        destination_confirmations: 3,
        mint_disabled: false,
    }
}

/// Memory store with short lock timeouts so contention surfaces quickly.
pub fn test_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_lock_options(LockOptions {
        ttl: Duration::from_secs(60),
        acquire_timeout: Duration::from_millis(200),
        retry_interval: Duration::from_millis(10),
    }))
}

/// Worker context of committee member `validator` over shared store and chains.
pub fn test_context(db: Arc<MemoryStore>, chains: &TestChains, validator: u8) -> Arc<WorkerContext> {
    test_context_with_settings(db, chains, validator, test_settings())
}

/// Same as [`test_context`] with custom bridge settings.
pub fn test_context_with_settings(
    db: Arc<MemoryStore>,
    chains: &TestChains,
    validator: u8,
    settings: BridgeSettings,
) -> Arc<WorkerContext> {
    Arc::new(WorkerContext {
        db,
        cosmos: chains.cosmos.clone(),
        evm: chains.evm.clone(),
        wrapped_token: chains.token.clone(),
        mint_controller: chains.controller.clone(),
        signer: validator_signer(validator),
        multisig: committee_multisig(),
        settings,
    })
}

fn service(interval_ms: u64) -> ServiceConfig {
    ServiceConfig {
        enabled: true,
        interval_ms,
    }
}

/// Valid configuration for the test committee.
pub fn build_test_config() -> Config {
    Config {
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "bridge-test".to_string(),
            timeout_ms: 30_000,
        },
        source: SourceConfig {
            rpc_url: "http://127.0.0.1:1317".to_string(),
            chain_id: DUMMY_SOURCE_CHAIN_ID.to_string(),
            rpc_timeout_ms: 30_000,
            bech32_prefix: DUMMY_PREFIX.to_string(),
            coin_denom: DUMMY_DENOM.to_string(),
            tx_fee: DUMMY_TX_FEE,
            confirmations: 2,
            start_height: 0,
            mnemonic: DUMMY_MNEMONIC.to_string(),
            kms_key: String::new(),
            multisig_address: vault_address(),
            multisig_public_keys: committee_public_keys().iter().map(hex::encode).collect(),
            multisig_threshold: 2,
            mint_disabled: false,
            gas_limit: DUMMY_GAS_LIMIT,
        },
        destination: DestinationConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: DUMMY_DESTINATION_CHAIN_ID,
            rpc_timeout_ms: 30_000,
            private_key: String::new(),
            start_block: 0,
            confirmations: 3,
            wrapped_token_address: DUMMY_WPOKT_ADDRESS.to_string(),
            mint_controller_address: DUMMY_MINT_CONTROLLER_ADDRESS.to_string(),
            validator_addresses: (0..3).map(|i| validator_signer(i).eth_address()).collect(),
        },
        mint_monitor: service(50),
        mint_signer: service(50),
        mint_executor: service(50),
        burn_monitor: service(50),
        burn_signer: service(50),
        burn_executor: service(50),
        health: HealthConfig {
            interval_ms: 50,
            read_last_health: false,
        },
        logger: LoggerConfig::default(),
        secret_manager: SecretManagerConfig::default(),
    }
}

// ----------------------------- SOURCE CHAIN -----------------------------

/// Memo asking for a mint to `address` on the test destination chain.
pub fn valid_memo(address: &str) -> String {
    format!(r#"{{"address":"{}","chain_id":"{}"}}"#, address, DUMMY_DESTINATION_CHAIN_ID)
}

/// Successful bank send of `amount` from `sender` into the vault.
pub fn deposit_tx(hash: &str, height: u64, sender: &str, amount: u64, memo: &str) -> TxResponse {
    let vault = vault_address();
    TxResponse {
        hash: hash.to_string(),
        height,
        code: 0,
        memo: memo.to_string(),
        events: vec![TxEvent {
            event_type: "transfer".to_string(),
            attributes: vec![
                EventAttribute {
                    key: "recipient".to_string(),
                    value: vault.clone(),
                },
                EventAttribute {
                    key: "sender".to_string(),
                    value: sender.to_string(),
                },
                EventAttribute {
                    key: "amount".to_string(),
                    value: format!("{}{}", amount, DUMMY_DENOM),
                },
            ],
        }],
        messages: vec![SendMessage {
            from_address: sender.to_string(),
            to_address: vault,
            amount: vec![CoinAmount::new(amount.to_string(), DUMMY_DENOM)],
        }],
    }
}

/// Deposit that was included but failed on chain.
pub fn failed_deposit_tx(hash: &str, height: u64, sender: &str, amount: u64) -> TxResponse {
    TxResponse {
        code: 5,
        events: Vec::new(),
        ..deposit_tx(hash, height, sender, amount, "")
    }
}

/// Source transaction type URL carried by deposits.
pub fn msg_send_type_url() -> &'static str {
    MSG_SEND_TYPE_URL
}

// -------------------------- DESTINATION CHAIN ---------------------------

pub fn u256_topic(value: U256) -> String {
    format!("0x{}", hex::encode(value.to_be_bytes::<32>()))
}

pub fn address_topic(address: &[u8; 20]) -> String {
    format!("0x{}{}", "00".repeat(12), hex::encode(address))
}

/// Raw `BurnAndBridge` log as found in a receipt.
pub fn burn_log(
    tx_hash: &str,
    log_index: u64,
    block: u64,
    amount: u64,
    from: &str,
    pokt_address: &[u8; 20],
) -> EvmLog {
    let from_bytes: [u8; 20] = hex::decode(from.trim_start_matches("0x")).unwrap().try_into().unwrap();
    EvmLog {
        address: DUMMY_WPOKT_ADDRESS.to_string(),
        topics: vec![
            abi::event_topic(BURN_AND_BRIDGE_EVENT),
            u256_topic(U256::from(amount)),
            address_topic(&from_bytes),
            address_topic(pokt_address),
        ],
        data: "0x".to_string(),
        block_number: format!("0x{:x}", block),
        transaction_hash: tx_hash.to_string(),
        log_index: format!("0x{:x}", log_index),
        removed: false,
    }
}

/// Successful receipt carrying `logs`.
pub fn burn_receipt(tx_hash: &str, block: u64, logs: Vec<EvmLog>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: tx_hash.to_string(),
        block_number: format!("0x{:x}", block),
        status: Some("0x1".to_string()),
        logs,
    }
}

pub fn minted_event(recipient: &str, amount: u64, nonce: u64, tx_hash: &str, block: u64) -> MintedEvent {
    MintedEvent {
        recipient: recipient.to_lowercase(),
        amount: U256::from(amount),
        nonce: U256::from(nonce),
        transaction_hash: tx_hash.to_string(),
        block_number: block,
        log_index: 0,
    }
}

// ------------------------------ DOCUMENTS -------------------------------

/// Pending mint of 50000 to the dummy recipient.
pub fn create_base_mint(hash: &str) -> Mint {
    let timestamp = now();
    Mint {
        id: None,
        transaction_hash: hash.to_string(),
        height: "90".to_string(),
        confirmations: "0".to_string(),
        sender_address: source_address(0x11),
        sender_chain_id: DUMMY_SOURCE_CHAIN_ID.to_string(),
        recipient_address: DUMMY_RECIPIENT_ADDR_EVM.to_string(),
        recipient_chain_id: DUMMY_DESTINATION_CHAIN_ID.to_string(),
        wpokt_address: DUMMY_WPOKT_ADDRESS.to_string(),
        vault_address: vault_address(),
        amount: "50000".to_string(),
        memo: Some(MintMemo {
            address: DUMMY_RECIPIENT_ADDR_EVM.to_string(),
            chain_id: DUMMY_DESTINATION_CHAIN_ID.to_string(),
        }),
        data: None,
        signatures: Vec::new(),
        signers: Vec::new(),
        mint_transaction_hash: String::new(),
        status: Status::Pending,
        created_at: timestamp,
        updated_at: timestamp,
    }
}

/// Pending refund of a 50000 deposit.
pub fn create_base_invalid_mint(hash: &str) -> InvalidMint {
    let timestamp = now();
    InvalidMint {
        id: None,
        transaction_hash: hash.to_string(),
        height: "90".to_string(),
        confirmations: "0".to_string(),
        sender_address: source_address(0x11),
        sender_chain_id: DUMMY_SOURCE_CHAIN_ID.to_string(),
        memo: "invalid".to_string(),
        amount: "50000".to_string(),
        vault_address: vault_address(),
        signatures: Vec::new(),
        sequence: None,
        return_transaction_body: String::new(),
        return_transaction_hash: String::new(),
        status: Status::Pending,
        created_at: timestamp,
        updated_at: timestamp,
    }
}

/// Pending burn of 40000 at block 990.
pub fn create_base_burn(hash: &str, log_index: u64) -> Burn {
    let timestamp = now();
    Burn {
        id: None,
        transaction_hash: hash.to_string(),
        log_index: log_index.to_string(),
        block_number: "990".to_string(),
        confirmations: "0".to_string(),
        wpokt_address: DUMMY_WPOKT_ADDRESS.to_string(),
        sender_address: DUMMY_BURNER_ADDR_EVM.to_string(),
        sender_chain_id: DUMMY_DESTINATION_CHAIN_ID.to_string(),
        recipient_address: source_address(0x22),
        recipient_chain_id: DUMMY_SOURCE_CHAIN_ID.to_string(),
        amount: "40000".to_string(),
        signatures: Vec::new(),
        sequence: None,
        return_transaction_body: String::new(),
        return_transaction_hash: String::new(),
        status: Status::Pending,
        created_at: timestamp,
        updated_at: timestamp,
    }
}
