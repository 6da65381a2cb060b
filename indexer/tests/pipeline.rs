mod common;

use claims_core::claim_id_from_outpoint;
use claims_core::opcodes::{OP_2DROP, OP_DROP};
use claims_core::script::{build_claim_name_script, build_support_script, build_update_script};
use claim_indexer::IndexerError;

use common::*;

const VALUE: &[u8] = br#"{"ver":"0.0.1","title":"hello","author":"someone"}"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claim_name_script_end_to_end() {
    let h = harness().await;

    // 0xb5 <"test"> <value> OP_2DROP OP_DROP <p2pkh>
    let mut script = vec![0xb5, 0x04];
    script.extend_from_slice(b"test");
    script.push(VALUE.len() as u8);
    script.extend_from_slice(VALUE);
    script.extend_from_slice(&[OP_2DROP, OP_DROP]);
    script.extend_from_slice(&pay_script(9));

    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.chain.mine_block(vec![
        coinbase("cb1", 50.0, 1),
        spend("claim", &[(txid("cb0"), 0)], vec![script_output(0, 1.0, &script), pay_output(1, 48.9, 1)]),
    ]);
    h.index_all().await;

    assert_eq!(h.db.claims().count().await.unwrap(), 1);
    let claim_id = claim_id_from_outpoint(&txid("claim"), 0);
    let claim = h.db.claims().get(&claim_id).await.unwrap().unwrap();
    assert_eq!(claim.name, "test");
    assert_eq!(claim.bid_state, "Accepted");
    assert_eq!(claim.claim_address, address(9));
    assert_eq!(claim.amount, 100_000_000);
    assert_eq!(claim.height, 1);
    assert_eq!(claim.title.as_deref(), Some("hello"));
    assert_eq!(claim.author.as_deref(), Some("someone"));

    let output = h.db.outputs().get(&txid("claim").to_hex(), 0).await.unwrap().unwrap();
    assert_eq!(output.addresses(), vec![address(9)]);
    assert_eq!(output.claim_id.as_deref(), Some(claim_id.as_str()));
    assert_eq!(h.db.addresses().get(&address(9)).await.unwrap().unwrap().balance, 100_000_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ledger_conservation() {
    let h = harness().await;
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.chain.mine_block(vec![
        coinbase("cb1", 50.0, 2),
        spend("pay", &[(txid("cb0"), 0)], vec![pay_output(0, 20.0, 2), pay_output(1, 29.5, 1)]),
    ]);
    h.index_all().await;

    let tx = h.db.transactions().get_by_hash(&txid("pay").to_hex()).await.unwrap().unwrap();
    let links = h.db.addresses().transaction_addresses(tx.id).await.unwrap();
    let net: i64 = links.iter().map(|l| l.credit_amount - l.debit_amount).sum();
    let inputs: i64 = h.db.inputs().for_transaction(&tx.hash).await.unwrap().iter().map(|i| i.value).sum();
    let outputs: i64 = h.db.outputs().for_transaction(&tx.hash).await.unwrap().iter().map(|o| o.value).sum();
    assert_eq!(net, outputs - inputs);
    assert_eq!(tx.fee, 50_000_000);

    assert_eq!(h.db.addresses().get(&address(1)).await.unwrap().unwrap().balance, 2_950_000_000);
    assert_eq!(h.db.addresses().get(&address(2)).await.unwrap().unwrap().balance, 7_000_000_000);
    assert_eq!(h.db.outputs().unspent_total().await.unwrap(), 9_950_000_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replay_is_idempotent() {
    let h = harness().await;
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.chain.mine_block(vec![
        coinbase("cb1", 50.0, 1),
        spend(
            "claim",
            &[(txid("cb0"), 0)],
            vec![script_output(0, 1.0, &build_claim_name_script("name", VALUE, &pay_script(3)).unwrap()), pay_output(1, 48.0, 1)],
        ),
    ]);
    h.index_all().await;

    let snapshot = |h: &Harness| {
        let db = h.db.clone();
        async move {
            let tx = db.transactions().get_by_hash(&txid("claim").to_hex()).await.unwrap().unwrap();
            (
                db.blocks().count().await.unwrap(),
                db.transactions().count().await.unwrap(),
                db.outputs().for_transaction(&tx.hash).await.unwrap().len(),
                db.inputs().for_transaction(&tx.hash).await.unwrap().len(),
                db.addresses().transaction_addresses(tx.id).await.unwrap(),
                db.addresses().get(&address(1)).await.unwrap().unwrap().balance,
                db.claims().count().await.unwrap(),
                db.claims().get(&claim_id_from_outpoint(&txid("claim"), 0)).await.unwrap().unwrap().bid_state,
            )
        }
    };

    let before = snapshot(&h).await;
    h.pipeline.process_block(1).await.unwrap();
    h.pipeline.process_block(1).await.unwrap();
    assert_eq!(snapshot(&h).await, before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replaying_an_older_block_keeps_later_updates() {
    let h = harness().await;
    let claim_id = claim_id_from_outpoint(&txid("claim"), 0);
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.chain.mine_block(vec![spend(
        "claim",
        &[(txid("cb0"), 0)],
        vec![script_output(0, 1.0, &build_claim_name_script("name", VALUE, &pay_script(3)).unwrap())],
    )]);
    h.chain.mine_block(vec![spend(
        "update",
        &[(txid("claim"), 0)],
        vec![script_output(
            0,
            0.9,
            &build_update_script("name", &claim_id, br#"{"ver":"0.0.1","title":"second"}"#, &pay_script(3)).unwrap(),
        )],
    )]);
    h.index_all().await;
    let before = h.db.claims().get(&claim_id).await.unwrap().unwrap();
    assert_eq!(before.transaction_hash, txid("update").to_hex());

    h.pipeline.process_block(1).await.unwrap();
    h.pipeline.process_block(0).await.unwrap();
    let after = h.db.claims().get(&claim_id).await.unwrap().unwrap();
    assert_eq!(after, before);
    assert_eq!(after.title.as_deref(), Some("second"));
    assert_eq!(after.height, 2);
    assert!(h.db.outputs().get(&txid("claim").to_hex(), 0).await.unwrap().unwrap().is_spent);

    // Replaying the block that moved it is a no-op as well
    h.pipeline.process_block(2).await.unwrap();
    let again = h.db.claims().get(&claim_id).await.unwrap().unwrap();
    assert_eq!((again.transaction_hash, again.bid_state), (before.transaction_hash, before.bid_state));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_heights_must_be_contiguous() {
    let h = harness().await;
    for i in 0..3 {
        h.chain.mine_block(vec![coinbase(&format!("cb{}", i), 50.0, 1)]);
    }
    h.pipeline.process_block(0).await.unwrap();

    let err = h.pipeline.process_block(2).await.unwrap_err();
    assert!(matches!(err, IndexerError::HeightOutOfOrder { height: 2, max_indexed: 0 }));
    assert!(err.is_fatal());
    assert!(h.db.blocks().get_by_height(2).await.unwrap().is_none());

    h.pipeline.process_block(1).await.unwrap();
    h.pipeline.process_block(2).await.unwrap();
    let first = h.db.blocks().get_by_height(0).await.unwrap().unwrap();
    let second = h.db.blocks().get_by_height(1).await.unwrap().unwrap();
    assert_eq!(first.next_block_hash.as_deref(), Some(second.hash.as_str()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spend_then_update_reopens_claim() {
    let h = harness().await;
    let claim_id = claim_id_from_outpoint(&txid("claim"), 0);

    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1), coinbase("cb0b", 50.0, 1)]);
    h.chain.mine_block(vec![spend(
        "claim",
        &[(txid("cb0"), 0)],
        vec![script_output(0, 1.0, &build_claim_name_script("name", VALUE, &pay_script(3)).unwrap())],
    )]);
    h.index_all().await;
    assert_eq!(h.db.claims().get(&claim_id).await.unwrap().unwrap().bid_state, "Accepted");

    // An update spending the claim output settles the spend first
    let updated = br#"{"ver":"0.0.1","title":"second"}"#;
    h.chain.mine_block(vec![spend(
        "update",
        &[(txid("claim"), 0)],
        vec![script_output(0, 0.9, &build_update_script("name", &claim_id, updated, &pay_script(3)).unwrap())],
    )]);
    h.index_all().await;

    let claim = h.db.claims().get(&claim_id).await.unwrap().unwrap();
    assert_eq!(claim.bid_state, "Accepted");
    assert_eq!(claim.transaction_hash, txid("update").to_hex());
    assert_eq!(claim.height, 2);
    assert_eq!(claim.title.as_deref(), Some("second"));
    assert_eq!(h.db.claims().count().await.unwrap(), 1);

    // A plain spend abandons it
    h.chain.mine_block(vec![spend("abandon", &[(txid("update"), 0)], vec![pay_output(0, 0.8, 1)])]);
    h.index_all().await;
    assert_eq!(h.db.claims().get(&claim_id).await.unwrap().unwrap().bid_state, "Spent");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_supports_follow_their_outputs() {
    let h = harness().await;
    let claim_id = claim_id_from_outpoint(&txid("claim"), 0);
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1), coinbase("cb0b", 50.0, 1)]);
    h.chain.mine_block(vec![
        spend(
            "claim",
            &[(txid("cb0"), 0)],
            vec![script_output(0, 1.0, &build_claim_name_script("name", VALUE, &pay_script(3)).unwrap())],
        ),
        spend(
            "support",
            &[(txid("cb0b"), 0)],
            vec![script_output(0, 5.0, &build_support_script("name", &claim_id, None, &pay_script(4)).unwrap())],
        ),
    ]);
    h.index_all().await;

    let support = h.db.supports().get(&txid("support").to_hex(), 0).await.unwrap().unwrap();
    assert_eq!(support.supported_claim_id, claim_id);
    assert_eq!(support.support_amount, 500_000_000);
    assert_eq!(support.bid_state, "Accepted");
    assert_eq!(h.db.supports().for_claim(&claim_id).await.unwrap().len(), 1);

    h.chain.mine_block(vec![spend("withdraw", &[(txid("support"), 0)], vec![pay_output(0, 4.9, 4)])]);
    h.index_all().await;
    assert_eq!(h.db.supports().get(&txid("support").to_hex(), 0).await.unwrap().unwrap().bid_state, "Spent");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_undecodable_claims_are_quarantined() {
    let h = harness().await;
    let garbage = [0xff, 0xfe, 0x00, 0x01];
    // Names must be direct pushes, not PUSHDATA1
    let truncated = [0xb5, 0x4c, 0xff, 0x01];

    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.chain.mine_block(vec![spend(
        "odd",
        &[(txid("cb0"), 0)],
        vec![
            script_output(0, 1.0, &build_claim_name_script("odd", &garbage, &pay_script(3)).unwrap()),
            script_output(1, 0.0, &truncated),
            pay_output(2, 48.0, 1),
        ],
    )]);
    h.index_all().await;

    assert_eq!(h.db.abnormal_claims().count().await.unwrap(), 2);
    let bad_value = h.db.abnormal_claims().get(&txid("odd").to_hex(), 0).await.unwrap().unwrap();
    assert_eq!(bad_value.name, "odd");
    assert_eq!(bad_value.value_as_hex, hex::encode(garbage));

    // The claim itself is still tracked
    let claim = h.db.claims().get(&claim_id_from_outpoint(&txid("odd"), 0)).await.unwrap().unwrap();
    assert_eq!(claim.claim_type, "unknown");
    assert_eq!(claim.bid_state, "Accepted");

    let malformed = h.db.outputs().get(&txid("odd").to_hex(), 1).await.unwrap().unwrap();
    assert!(malformed.addresses().is_empty());
    assert!(malformed.claim_id.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_prevout_is_fatal() {
    let h = harness().await;
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.chain.mine_block(vec![spend("orphan", &[(txid("nowhere"), 3)], vec![pay_output(0, 1.0, 2)])]);

    h.pipeline.process_block(0).await.unwrap();
    let err = h.pipeline.process_block(1).await.unwrap_err();
    match &err {
        IndexerError::MissingOutput { txid: prev, vout, vin, .. } => {
            assert_eq!(prev, &txid("nowhere").to_hex());
            assert_eq!((*vout, *vin), (3, 0));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.is_fatal());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transient_rpc_failures_are_retried() {
    let h = harness().await;
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.chain.mine_block(vec![coinbase("cb1", 50.0, 1)]);

    h.chain.fail_next_calls(2);
    h.pipeline.process_block(0).await.unwrap();

    h.chain.fail_next_calls(100);
    let err = h.pipeline.process_block(1).await.unwrap_err();
    assert!(matches!(err, IndexerError::RetriesExhausted { attempts: 3, .. }));
    assert!(err.is_fatal());
}
