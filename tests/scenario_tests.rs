//! End-to-end bridge flows across a three-validator committee
//!
//! Each test drives every worker of every node in rounds over one shared
//! store and one set of mock chains. The test plays the relayer: it mints on
//! the destination chain and settles return transactions on the source chain.

use std::sync::Arc;

use bridge_validator::cosmos::{MultisigTxBody, TxResponse};
use bridge_validator::evm::contracts::parse_burn_and_bridge_log;
use bridge_validator::models::{
    Burn, InvalidMint, Mint, Status, COLLECTION_BURNS, COLLECTION_INVALID_MINTS, COLLECTION_MINTS,
};
use bridge_validator::store::{self, Filter, MemoryStore};
use bridge_validator::workers::{
    BurnExecutor, BurnMonitor, BurnSigner, MintExecutor, MintMonitor, MintSigner, Worker,
};

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{
    burn_log, burn_receipt, deposit_tx, minted_event, source_address, test_context, test_store, valid_memo,
    MockCosmos, TestChains, DUMMY_BURNER_ADDR_EVM, DUMMY_RECIPIENT_ADDR_EVM, DUMMY_TX_FEE, DUMMY_TX_HASH_1,
    DUMMY_TX_HASH_2,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

const DUMMY_MINT_TX_HASH: &str = "0x00000000000000000000000000000000000000000000000000000000000000f1";
const DUMMY_MINT_TX_HASH_2: &str = "0x00000000000000000000000000000000000000000000000000000000000000f2";

/// All six workers of one validator.
struct TestNode {
    workers: Vec<Box<dyn Worker>>,
}

impl TestNode {
    fn new(db: &Arc<MemoryStore>, chains: &TestChains, validator: u8) -> Self {
        let ctx = test_context(db.clone(), chains, validator);
        Self {
            workers: vec![
                Box::new(MintMonitor::new(ctx.clone(), 50)),
                Box::new(MintSigner::new(ctx.clone())),
                Box::new(MintExecutor::new(ctx.clone(), 900)),
                Box::new(BurnMonitor::new(ctx.clone(), 900)),
                Box::new(BurnSigner::new(ctx.clone())),
                Box::new(BurnExecutor::new(ctx)),
            ],
        }
    }

    async fn tick(&mut self) {
        for worker in self.workers.iter_mut() {
            let name = worker.name();
            worker
                .run()
                .await
                .unwrap_or_else(|e| panic!("{} failed: {}", name, e));
        }
    }
}

fn committee(db: &Arc<MemoryStore>, chains: &TestChains) -> Vec<TestNode> {
    (0..3).map(|validator| TestNode::new(db, chains, validator)).collect()
}

/// One tick of every worker on every node, in node order.
async fn round(nodes: &mut [TestNode]) {
    for node in nodes.iter_mut() {
        node.tick().await;
    }
}

async fn load_mint(db: &MemoryStore, hash: &str) -> Mint {
    store::find_one_as::<Mint>(db, COLLECTION_MINTS, &Filter::new().eq("transaction_hash", hash))
        .await
        .unwrap()
        .expect("mint should exist")
}

async fn load_invalid_mint(db: &MemoryStore, hash: &str) -> InvalidMint {
    store::find_one_as::<InvalidMint>(db, COLLECTION_INVALID_MINTS, &Filter::new().eq("transaction_hash", hash))
        .await
        .unwrap()
        .expect("invalid mint should exist")
}

async fn load_burn(db: &MemoryStore, hash: &str) -> Burn {
    store::find_one_as::<Burn>(db, COLLECTION_BURNS, &Filter::new().eq("transaction_hash", hash))
        .await
        .unwrap()
        .expect("burn should exist")
}

/// Marks every broadcast so far as included on the source chain with `code`.
fn settle_broadcasts(chains: &TestChains, code: u32) {
    let broadcasts = chains.cosmos.state.lock().unwrap().broadcasts.clone();
    for tx_bytes in broadcasts {
        chains.cosmos.set_tx(TxResponse {
            hash: MockCosmos::hash_of(&tx_bytes),
            height: 120,
            code,
            memo: String::new(),
            events: Vec::new(),
            messages: Vec::new(),
        });
    }
}

// ============================================================================
// MINT FLOW
// ============================================================================

/// Test that deposits become signed mints that settle once minted on the destination chain
/// Why: Every validator must sign identical mint data with consecutive nonces
#[tokio::test]
async fn test_mint_happy_path() {
    let db = test_store();
    let chains = TestChains::new();
    let sender = source_address(0x11);
    let memo = valid_memo(DUMMY_RECIPIENT_ADDR_EVM);
    chains.token.set_nonce(DUMMY_RECIPIENT_ADDR_EVM, 4);
    chains.cosmos.add_deposit(deposit_tx(DUMMY_TX_HASH_1, 90, &sender, 50_000, &memo));
    chains.cosmos.add_deposit(deposit_tx(DUMMY_TX_HASH_2, 91, &sender, 70_000, &memo));

    let mut nodes = committee(&db, &chains);
    round(&mut nodes).await;

    assert_eq!(db.count(COLLECTION_MINTS).await, 2);
    let first = load_mint(&db, DUMMY_TX_HASH_1).await;
    let second = load_mint(&db, DUMMY_TX_HASH_2).await;
    assert_eq!(first.status, Status::Signed);
    assert_eq!(second.status, Status::Signed);
    assert_eq!(first.signatures.len(), 3);
    assert_eq!(first.data.as_ref().unwrap().nonce, "5");
    assert_eq!(second.data.as_ref().unwrap().nonce, "6");

    // The relayer submits both mints
    chains
        .token
        .add_minted(minted_event(DUMMY_RECIPIENT_ADDR_EVM, 50_000, 5, DUMMY_MINT_TX_HASH, 1_002));
    chains
        .token
        .add_minted(minted_event(DUMMY_RECIPIENT_ADDR_EVM, 70_000, 6, DUMMY_MINT_TX_HASH_2, 1_003));
    chains.evm.set_block_number(1_010);
    round(&mut nodes).await;

    let first = load_mint(&db, DUMMY_TX_HASH_1).await;
    let second = load_mint(&db, DUMMY_TX_HASH_2).await;
    assert_eq!(first.status, Status::Success);
    assert_eq!(first.mint_transaction_hash, DUMMY_MINT_TX_HASH);
    assert_eq!(second.status, Status::Success);
    assert_eq!(second.mint_transaction_hash, DUMMY_MINT_TX_HASH_2);
    assert_eq!(chains.cosmos.broadcast_count(), 0);
}

/// Test that a restarted executor rescanning settled events changes nothing
#[tokio::test]
async fn test_mint_executor_rescan_is_idempotent() {
    let db = test_store();
    let chains = TestChains::new();
    chains.cosmos.add_deposit(deposit_tx(
        DUMMY_TX_HASH_1,
        90,
        &source_address(0x11),
        50_000,
        &valid_memo(DUMMY_RECIPIENT_ADDR_EVM),
    ));

    let mut nodes = committee(&db, &chains);
    round(&mut nodes).await;
    chains
        .token
        .add_minted(minted_event(DUMMY_RECIPIENT_ADDR_EVM, 50_000, 1, DUMMY_MINT_TX_HASH, 1_002));
    chains.evm.set_block_number(1_010);
    round(&mut nodes).await;
    let settled = load_mint(&db, DUMMY_TX_HASH_1).await;
    assert_eq!(settled.status, Status::Success);

    let mut restarted = MintExecutor::new(test_context(db.clone(), &chains, 0), 900);
    restarted.run().await.unwrap();

    let rescanned = load_mint(&db, DUMMY_TX_HASH_1).await;
    assert_eq!(rescanned.status, Status::Success);
    assert_eq!(rescanned.updated_at, settled.updated_at);
    assert_eq!(restarted.last_block(), 1_010);
}

// ============================================================================
// REFUND FLOW
// ============================================================================

/// Test that an invalid memo and an over-cap deposit are both refunded minus the fee
/// Why: Each refund consumes its own vault sequence and must settle independently
#[tokio::test]
async fn test_refunds_settle() {
    let db = test_store();
    let chains = TestChains::new();
    chains.controller.set_max_mint_limit(30_000);
    let sender = source_address(0x11);
    chains.cosmos.add_deposit(deposit_tx(
        DUMMY_TX_HASH_1,
        90,
        &sender,
        50_000,
        &valid_memo(DUMMY_RECIPIENT_ADDR_EVM),
    ));
    chains.cosmos.add_deposit(deposit_tx(DUMMY_TX_HASH_2, 91, &sender, 20_000, "not json"));

    let mut nodes = committee(&db, &chains);
    round(&mut nodes).await;

    assert_eq!(db.count(COLLECTION_MINTS).await, 0);
    assert_eq!(chains.cosmos.broadcast_count(), 2);
    let over_cap = load_invalid_mint(&db, DUMMY_TX_HASH_1).await;
    let bad_memo = load_invalid_mint(&db, DUMMY_TX_HASH_2).await;
    assert_eq!(over_cap.status, Status::Submitted);
    assert_eq!(bad_memo.status, Status::Submitted);

    let mut sequences = vec![over_cap.sequence.unwrap(), bad_memo.sequence.unwrap()];
    sequences.sort();
    assert_eq!(sequences, vec![3, 4]);

    let body = MultisigTxBody::from_json(&over_cap.return_transaction_body).unwrap();
    assert_eq!(body.to_address, sender);
    assert_eq!(body.amount.amount, (50_000 - DUMMY_TX_FEE).to_string());
    let body = MultisigTxBody::from_json(&bad_memo.return_transaction_body).unwrap();
    assert_eq!(body.amount.amount, (20_000 - DUMMY_TX_FEE).to_string());

    settle_broadcasts(&chains, 0);
    round(&mut nodes).await;

    assert_eq!(load_invalid_mint(&db, DUMMY_TX_HASH_1).await.status, Status::Success);
    assert_eq!(load_invalid_mint(&db, DUMMY_TX_HASH_2).await.status, Status::Success);
    assert_eq!(chains.cosmos.broadcast_count(), 2);
}

// ============================================================================
// BURN FLOW
// ============================================================================

/// Test that a failed return transaction is re-signed at the next sequence
/// Why: A rejected broadcast still consumes the vault sequence it used
#[tokio::test]
async fn test_burn_revert_and_resign() {
    let db = test_store();
    let chains = TestChains::new();
    let log = burn_log(DUMMY_TX_HASH_1, 0, 990, 40_000, DUMMY_BURNER_ADDR_EVM, &[0x22; 20]);
    chains.token.add_burn(parse_burn_and_bridge_log(&log).unwrap());
    chains.evm.set_receipt(burn_receipt(DUMMY_TX_HASH_1, 990, vec![log]));

    let mut nodes = committee(&db, &chains);
    round(&mut nodes).await;

    let submitted = load_burn(&db, DUMMY_TX_HASH_1).await;
    assert_eq!(submitted.status, Status::Submitted);
    assert_eq!(submitted.sequence, Some(3));
    let body = MultisigTxBody::from_json(&submitted.return_transaction_body).unwrap();
    assert_eq!(body.to_address, source_address(0x22));
    assert_eq!(body.amount.amount, "40000");

    settle_broadcasts(&chains, 11);
    chains.cosmos.set_sequence(4);
    round(&mut nodes).await;

    let resubmitted = load_burn(&db, DUMMY_TX_HASH_1).await;
    assert_eq!(resubmitted.status, Status::Submitted);
    assert_eq!(resubmitted.sequence, Some(4));
    assert_ne!(resubmitted.return_transaction_hash, submitted.return_transaction_hash);
    assert_eq!(chains.cosmos.broadcast_count(), 2);

    chains.cosmos.set_tx(TxResponse {
        hash: resubmitted.return_transaction_hash.clone(),
        height: 130,
        code: 0,
        memo: String::new(),
        events: Vec::new(),
        messages: Vec::new(),
    });
    round(&mut nodes).await;

    let settled = load_burn(&db, DUMMY_TX_HASH_1).await;
    assert_eq!(settled.status, Status::Success);
    assert_eq!(db.count(COLLECTION_BURNS).await, 1);
}
