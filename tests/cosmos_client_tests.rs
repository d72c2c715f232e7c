//! Unit tests for the source chain REST client
//!
//! These tests run the client against a wiremock REST gateway.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bridge_validator::cosmos::{CosmosClient, LcdCosmosClient};
use bridge_validator::error::BridgeError;

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{source_address, vault_address, DUMMY_DENOM, DUMMY_PREFIX, DUMMY_SOURCE_CHAIN_ID};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn client(server: &MockServer) -> LcdCosmosClient {
    LcdCosmosClient::new(&server.uri(), DUMMY_PREFIX, Duration::from_secs(5)).unwrap()
}

/// LCD form of a deposit into the vault.
fn lcd_tx(txhash: &str, height: u64, amount: u64, memo: &str) -> serde_json::Value {
    let vault = vault_address();
    let sender = source_address(0x11);
    json!({
        "height": height.to_string(),
        "txhash": txhash,
        "code": 0,
        "events": [{
            "type": "transfer",
            "attributes": [
                {"key": "recipient", "value": vault},
                {"key": "sender", "value": sender},
                {"key": "amount", "value": format!("{}{}", amount, DUMMY_DENOM)}
            ]
        }],
        "tx": {
            "body": {
                "memo": memo,
                "messages": [
                    {
                        "@type": "/cosmos.bank.v1beta1.MsgSend",
                        "from_address": sender,
                        "to_address": vault,
                        "amount": [{"denom": DUMMY_DENOM, "amount": amount.to_string()}]
                    },
                    {
                        "@type": "/cosmos.staking.v1beta1.MsgDelegate",
                        "delegator_address": sender
                    }
                ]
            }
        }
    })
}

// ============================================================================
// CHAIN STATE
// ============================================================================

/// Test that the latest height is parsed from its string form
#[tokio::test]
async fn test_get_latest_block_height() {
    let _ = tracing_subscriber::fmt().try_init();
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cosmos/base/tendermint/v1beta1/blocks/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "block": {"header": {"height": "12345", "chain_id": DUMMY_SOURCE_CHAIN_ID}}
        })))
        .mount(&mock_server)
        .await;

    assert_eq!(client(&mock_server).get_latest_block_height().await.unwrap(), 12345);
}

/// Test that startup network validation compares the node's network id
/// Why: A validator pointed at the wrong chain must refuse to start
#[tokio::test]
async fn test_validate_network() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cosmos/base/tendermint/v1beta1/node_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "default_node_info": {"network": DUMMY_SOURCE_CHAIN_ID}
        })))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    assert!(client.validate_network(DUMMY_SOURCE_CHAIN_ID).await.is_ok());
    assert!(matches!(
        client.validate_network("other-chain").await,
        Err(BridgeError::Config(_))
    ));
}

/// Test that a gateway failure surfaces as a chain RPC error
#[tokio::test]
async fn test_server_error_is_chain_rpc() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cosmos/base/tendermint/v1beta1/blocks/latest"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&mock_server)
        .await;

    assert!(matches!(
        client(&mock_server).get_latest_block_height().await,
        Err(BridgeError::ChainRpc(_))
    ));
}

// ============================================================================
// TRANSACTION SEARCH
// ============================================================================

/// Test that the vault search pages until the reported total and keeps only bank sends
/// Why: The mint monitor must see every deposit above its cursor
#[tokio::test]
async fn test_search_pages_until_total() {
    let mock_server = MockServer::start().await;
    let vault = vault_address();
    let query = format!("transfer.recipient='{}' AND tx.height>=90", vault);

    Mock::given(method("GET"))
        .and(path("/cosmos/tx/v1beta1/txs"))
        .and(query_param("query", query.as_str()))
        .and(query_param("page", "1"))
        .and(query_param("order_by", "ORDER_BY_ASC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tx_responses": [lcd_tx("AAAA", 90, 50000, "first")],
            "total": "2"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cosmos/tx/v1beta1/txs"))
        .and(query_param("query", query.as_str()))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tx_responses": [lcd_tx("BBBB", 95, 70000, "second")],
            "total": "2"
        })))
        .mount(&mock_server)
        .await;

    let txs = client(&mock_server)
        .get_txs_sent_to_address_after_height(&vault, 90)
        .await
        .unwrap();

    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].hash, "0xaaaa");
    assert_eq!(txs[0].height, 90);
    assert_eq!(txs[0].memo, "first");
    assert_eq!(txs[0].messages.len(), 1);
    assert_eq!(txs[0].messages[0].amount[0].amount, "50000");
    assert_eq!(txs[1].hash, "0xbbbb");
    assert_eq!(txs[1].events[0].attribute("amount"), Some("70000upokt"));
}

/// Test that foreign addresses are rejected before any request is made
#[tokio::test]
async fn test_search_rejects_foreign_address() {
    let mock_server = MockServer::start().await;
    let result = client(&mock_server)
        .get_txs_sent_to_address_after_height("cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu", 1)
        .await;
    assert!(matches!(result, Err(BridgeError::Validation(_))));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// SINGLE TRANSACTIONS
// ============================================================================

/// Test that lookups use the uppercase hash and normalize it back
#[tokio::test]
async fn test_get_tx_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cosmos/tx/v1beta1/txs/ABCDEF"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tx_response": lcd_tx("ABCDEF", 42, 50000, "memo")
        })))
        .mount(&mock_server)
        .await;

    let tx = client(&mock_server).get_tx("0xabcdef").await.unwrap().unwrap();
    assert_eq!(tx.hash, "0xabcdef");
    assert_eq!(tx.height, 42);
    assert_eq!(tx.code, 0);
}

/// Test that unknown transactions are reported as absent, not as errors
/// Why: Executors poll return transactions that may not be indexed yet
#[tokio::test]
async fn test_get_tx_not_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cosmos/tx/v1beta1/txs/0001"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cosmos/tx/v1beta1/txs/0002"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"code":5,"message":"tx not found: 0002"}"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cosmos/tx/v1beta1/txs/0003"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database locked"))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    assert!(client.get_tx("0x0001").await.unwrap().is_none());
    assert!(client.get_tx("0x0002").await.unwrap().is_none());
    assert!(matches!(client.get_tx("0x0003").await, Err(BridgeError::ChainRpc(_))));
}

// ============================================================================
// ACCOUNT AND BROADCAST
// ============================================================================

#[tokio::test]
async fn test_get_account() {
    let mock_server = MockServer::start().await;
    let vault = vault_address();
    Mock::given(method("GET"))
        .and(path(format!("/cosmos/auth/v1beta1/accounts/{}", vault)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "account": {
                "@type": "/cosmos.auth.v1beta1.BaseAccount",
                "address": vault,
                "account_number": "7",
                "sequence": "12"
            }
        })))
        .mount(&mock_server)
        .await;

    let account = client(&mock_server).get_account(&vault).await.unwrap();
    assert_eq!(account.account_number, 7);
    assert_eq!(account.sequence, 12);
}

#[tokio::test]
async fn test_simulate() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cosmos/tx/v1beta1/simulate"))
        .and(body_partial_json(json!({"tx_bytes": "AQID"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "gas_info": {"gas_wanted": "200000", "gas_used": "81234"}
        })))
        .mount(&mock_server)
        .await;

    let gas = client(&mock_server).simulate(&[1, 2, 3]).await.unwrap();
    assert_eq!(gas.gas_wanted, 200000);
    assert_eq!(gas.gas_used, 81234);
}

/// Test that a synchronous broadcast returns the normalized hash
#[tokio::test]
async fn test_broadcast_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cosmos/tx/v1beta1/txs"))
        .and(body_partial_json(json!({"tx_bytes": "AQID", "mode": "BROADCAST_MODE_SYNC"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tx_response": {"txhash": "FEED", "code": 0, "raw_log": ""}
        })))
        .mount(&mock_server)
        .await;

    assert_eq!(client(&mock_server).broadcast_tx(&[1, 2, 3]).await.unwrap(), "0xfeed");
}

/// Test that a CheckTx rejection is an error
/// Why: A rejected broadcast must leave the document signed for a retry
#[tokio::test]
async fn test_broadcast_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cosmos/tx/v1beta1/txs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tx_response": {"txhash": "FEED", "code": 32, "raw_log": "account sequence mismatch"}
        })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).broadcast_tx(&[1, 2, 3]).await.unwrap_err();
    assert!(matches!(err, BridgeError::ChainRpc(ref msg) if msg.contains("sequence mismatch")));
}
