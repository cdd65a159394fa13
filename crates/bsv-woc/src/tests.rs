//! Tests for the WhatsOnChain client.

use std::sync::Arc;
use std::time::Duration;

use bsv_primitives::chainhash::Hash;
use bsv_spv::{
    BlockId, BlockchainProvider, ChainTracker, ProviderChainTracker, ProviderError, SpentStatus,
    TargetType,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::WocClient;
use crate::error::WocError;
use crate::rate_limit::RateLimiter;
use crate::types::WocConfig;

const TXID: &str = "157428aee67d11123203735e4c540fa1bdab3b36d5882c6f8c5ff79f07d20d1c";
const PREV_TXID: &str = "3ecead27a44d013ad1aae40038acbb1883ac9242406808bb4667c15b4f164eac";
const RAW_TX: &str = "0100000001ac4e164f5bc16746bb0868404292ac8318bbac3800e4aad13a014da427adce3e000000006a47304402203a61a2e931612b4bda08d541cfb980885173b8dcf64a3471238ae7abcd368d6402204cbf24f04b9aa2256d8901f0ed97866603d2be8324c2bfb7a37bf8fc90edd5b441210263e2dee22b1ddc5e11f6fab8bcd2378bdd19580d640501ea956ec0e786f93e76ffffffff013c660000000000001976a9146bfd5c7fbe21529d45803dbcf0c87dd3c71efbc288ac00000000";
const BLOCK_HASH: &str = "0000000000000000025855b1f9c05cd52b7e9e5b1b2f3ef9f4fe1e6a0a0e4f01";
const MERKLE_ROOT: &str = "bb6f640cc4ee56bf38eb5a1969ac0c16caa2d3d202b22bf3735d10eec0ca6e00";

fn test_config(server_url: &str) -> WocConfig {
    WocConfig {
        base_url: server_url.to_string(),
        network: "main".to_string(),
        api_key: Some("test-key".to_string()),
        min_request_interval: Duration::ZERO,
        max_retries: 2,
        retry_backoff: Duration::from_millis(1),
    }
}

fn hash(s: &str) -> Hash {
    Hash::from_hex(s).unwrap()
}

fn tx_json() -> serde_json::Value {
    serde_json::json!({
        "txid": TXID,
        "hash": TXID,
        "version": 1,
        "size": 191,
        "locktime": 0,
        "vin": [{
            "txid": PREV_TXID,
            "vout": 0,
            "scriptSig": {"asm": "", "hex": "47"},
            "sequence": 4294967295u32
        }],
        "vout": [{
            "value": 0.00026172,
            "n": 0,
            "scriptPubKey": {
                "asm": "OP_DUP OP_HASH160 6bfd5c7fbe21529d45803dbcf0c87dd3c71efbc2 OP_EQUALVERIFY OP_CHECKSIG",
                "hex": "76a9146bfd5c7fbe21529d45803dbcf0c87dd3c71efbc288ac",
                "type": "pubkeyhash"
            }
        }],
        "blockhash": BLOCK_HASH,
        "confirmations": 10,
        "blockheight": 814435
    })
}

fn block_json() -> serde_json::Value {
    serde_json::json!({
        "hash": BLOCK_HASH,
        "height": 814435,
        "merkleroot": MERKLE_ROOT,
        "time": 1697371225,
        "txcount": 2,
        "tx": [PREV_TXID, TXID]
    })
}

#[tokio::test]
async fn test_fetch_transaction() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/hash/{}", TXID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(tx_json()))
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));
    let tx = client.fetch_transaction(&hash(TXID)).await.unwrap();

    assert_eq!(tx.txid, hash(TXID));
    assert_eq!(tx.inputs[0].prev_txid, Some(hash(PREV_TXID)));
    assert_eq!(tx.outputs[0].value_satoshis, 26172);
    assert_eq!(tx.outputs[0].locking_script.len(), 25);
    assert_eq!(tx.block_height, Some(814435));
    assert_eq!(tx.block_hash, Some(hash(BLOCK_HASH)));
    assert_eq!(tx.total_output_satoshis(), 26172);
}

#[tokio::test]
async fn test_coinbase_input() {
    let server = MockServer::start().await;
    let mut body = tx_json();
    body["vin"] = serde_json::json!([{"coinbase": "0363700c", "sequence": 4294967295u32}]);

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/hash/{}", TXID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));
    let tx = client.fetch_transaction(&hash(TXID)).await.unwrap();
    assert_eq!(tx.inputs[0].prev_txid, None);
}

#[tokio::test]
async fn test_fetch_transaction_wrong_txid() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/hash/{}", PREV_TXID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(tx_json()))
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));
    let result = client.fetch_transaction(&hash(PREV_TXID)).await;
    assert!(matches!(result, Err(WocError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_fetch_raw_transaction() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/{}/hex", TXID)))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("{}\n", RAW_TX)))
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));
    let tx = client.fetch_raw_transaction(&hash(TXID)).await.unwrap();
    assert_eq!(tx.txid(), hash(TXID));
    assert_eq!(tx.outputs[0].satoshis, 26172);
    assert_eq!(tx.inputs[0].source_txid, hash(PREV_TXID));
}

#[tokio::test]
async fn test_spent_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/{}/0/spent", PREV_TXID)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"txid": TXID, "vin": 0})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/{}/0/spent", TXID)))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/{}/7/spent", TXID)))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad vout"))
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));

    let spent = client.fetch_spent_status(&hash(PREV_TXID), 0).await.unwrap();
    assert_eq!(
        spent,
        SpentStatus::Spent {
            txid: hash(TXID),
            input_index: 0
        }
    );

    let unspent = client.get_spent_status(&hash(TXID), 0).await.unwrap();
    assert_eq!(unspent, SpentStatus::Unspent);

    let err = client.get_spent_status(&hash(TXID), 7).await.unwrap_err();
    assert!(matches!(err, ProviderError::Client { status: 400, .. }));
    assert!(err.is_unspent_equivalent());
}

#[tokio::test]
async fn test_fetch_block() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/bsv/main/block/height/814435"))
        .respond_with(ResponseTemplate::new(200).set_body_json(block_json()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/block/hash/{}", BLOCK_HASH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(block_json()))
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));

    let by_height = client.get_block(&BlockId::Height(814435)).await.unwrap();
    assert_eq!(by_height.merkle_root, hash(MERKLE_ROOT));
    assert_eq!(by_height.tx_ids, vec![hash(PREV_TXID), hash(TXID)]);

    let by_hash = client.fetch_block(&BlockId::Hash(hash(BLOCK_HASH))).await.unwrap();
    assert_eq!(by_hash, by_height);

    let missing = client.get_block(&BlockId::Height(1)).await.unwrap_err();
    assert!(matches!(missing, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_chain_tracker_over_client() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/bsv/main/block/height/814435"))
        .respond_with(ResponseTemplate::new(200).set_body_json(block_json()))
        .mount(&server)
        .await;

    let tracker = ProviderChainTracker::new(WocClient::new(test_config(&server.uri())));
    assert!(tracker
        .is_valid_root_for_height(&hash(MERKLE_ROOT), 814435)
        .await
        .unwrap());
    assert!(!tracker
        .is_valid_root_for_height(&hash(TXID), 814435)
        .await
        .unwrap());
    assert!(!tracker
        .is_valid_root_for_height(&hash(MERKLE_ROOT), 2)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_retries_after_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/hash/{}", TXID)))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/hash/{}", TXID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(tx_json()))
        .expect(1)
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));
    let tx = client.get_transaction(&hash(TXID)).await.unwrap();
    assert_eq!(tx.txid, hash(TXID));
}

#[tokio::test]
async fn test_rate_limit_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/hash/{}", TXID)))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));
    let err = client.fetch_transaction(&hash(TXID)).await.unwrap_err();
    assert!(matches!(err, WocError::RateLimited { attempts: 3 }));

    let provider_err = ProviderError::from(err);
    assert!(matches!(provider_err, ProviderError::RateLimited(_)));
    assert!(provider_err.is_transient());
}

#[tokio::test]
async fn test_server_error_maps_to_server() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/hash/{}", TXID)))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));
    let err = client.get_transaction(&hash(TXID)).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Server {
            status: 502,
            message: "bad gateway".to_string()
        }
    );
}

#[tokio::test]
async fn test_api_key_header_set_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/bsv/main/block/height/814435"))
        .and(header("Authorization", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(block_json()))
        .expect(1)
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));
    client.fetch_block(&BlockId::Height(814435)).await.unwrap();
}

#[tokio::test]
async fn test_network_in_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/bsv/test/block/height/814435"))
        .respond_with(ResponseTemplate::new(200).set_body_json(block_json()))
        .expect(1)
        .mount(&server)
        .await;

    let client = WocClient::new(WocConfig {
        network: "test".to_string(),
        base_url: format!("{}/", server.uri()),
        ..test_config(&server.uri())
    });
    client.fetch_block(&BlockId::Height(814435)).await.unwrap();
}

#[tokio::test]
async fn test_fetch_tsc_proof() {
    let server = MockServer::start().await;
    let proof = serde_json::json!({
        "index": 1,
        "txOrId": TXID,
        "target": BLOCK_HASH,
        "nodes": [PREV_TXID, "*"]
    });

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/{}/proof/tsc", TXID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([proof])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/bsv/main/tx/{}/proof/tsc", PREV_TXID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(proof.clone()))
        .mount(&server)
        .await;

    let client = WocClient::new(test_config(&server.uri()));

    let from_list = client.fetch_tsc_proof(&hash(TXID)).await.unwrap();
    assert_eq!(from_list.index, 1);
    assert_eq!(from_list.target_type, TargetType::Hash);
    assert_eq!(from_list.nodes[1], "*");

    let single = client.fetch_tsc_proof(&hash(PREV_TXID)).await.unwrap();
    assert_eq!(single, from_list);
}

#[tokio::test]
async fn test_shared_rate_limiter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/bsv/main/block/height/814435"))
        .respond_with(ResponseTemplate::new(200).set_body_json(block_json()))
        .expect(3)
        .mount(&server)
        .await;

    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(40)));
    let a = WocClient::with_rate_limiter(test_config(&server.uri()), Arc::clone(&limiter));
    let b = WocClient::with_rate_limiter(test_config(&server.uri()), Arc::clone(&limiter));

    let start = std::time::Instant::now();
    a.fetch_block(&BlockId::Height(814435)).await.unwrap();
    b.fetch_block(&BlockId::Height(814435)).await.unwrap();
    a.fetch_block(&BlockId::Height(814435)).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(80));
    assert!(Arc::ptr_eq(a.rate_limiter(), b.rate_limiter()));
}
