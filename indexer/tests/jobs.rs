mod common;

use std::time::Duration;

use claims_core::claim_id_from_outpoint;
use claims_core::script::{build_claim_name_script, build_update_script};
use database::{now_ts, TransactionRow, MEMPOOL_BLOCK_HASH};
use rpc_core::MempoolEntry;

use claim_indexer::jobs::claim_trie_sync::reconcile_name;
use claim_indexer::jobs::{ChainSync, ChainSyncState, ChainValidation, MempoolSync, ValidationIssue};

use common::*;

const VALUE: &[u8] = br#"{"ver":"0.0.1","title":"t"}"#;

fn entry(height: u64, depends: Vec<claim_hashes::Hash>) -> MempoolEntry {
    MempoolEntry { size: 250, fee: 0.001, time: now_ts(), height, depends }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mempool_parents_stored_before_children() {
    let h = harness().await;
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.index_all().await;

    let parent = spend("parent", &[(txid("cb0"), 0)], vec![pay_output(0, 49.0, 2)]);
    let child = spend("child", &[(txid("parent"), 0)], vec![pay_output(0, 48.0, 3)]);
    let grandchild = spend("grandchild", &[(txid("child"), 0)], vec![pay_output(0, 47.0, 4)]);
    h.chain.submit_to_mempool(grandchild, entry(0, vec![txid("child")]));
    h.chain.submit_to_mempool(child, entry(0, vec![txid("parent")]));
    h.chain.submit_to_mempool(parent, entry(0, vec![]));

    let sync = MempoolSync::new(h.pipeline.clone(), Duration::from_secs(3600), Duration::from_secs(30));
    let report = sync.sync().await.unwrap();
    assert_eq!((report.added, report.failed), (3, 0));

    let row = |seed: &'static str| {
        let db = h.db.clone();
        async move { db.transactions().get_by_hash(&txid(seed).to_hex()).await.unwrap().unwrap() }
    };
    let (parent, child, grandchild) = (row("parent").await, row("child").await, row("grandchild").await);
    assert!(parent.id < child.id);
    assert!(child.id < grandchild.id);
    assert_eq!(grandchild.block_hash.as_deref(), Some(MEMPOOL_BLOCK_HASH));
    assert_eq!(grandchild.fee, 100_000_000);

    // Confirmation moves the rows into their block without duplicating them
    let block_hash = h.chain.mine_block(vec![
        coinbase("cb1", 50.0, 1),
        spend("parent", &[(txid("cb0"), 0)], vec![pay_output(0, 49.0, 2)]),
    ]);
    h.index_all().await;
    let confirmed = row("parent").await;
    assert_eq!(confirmed.id, parent.id);
    assert_eq!(confirmed.block_hash, Some(block_hash.to_hex()));
    assert_eq!(h.db.addresses().get(&address(4)).await.unwrap().unwrap().balance, 4_700_000_000);
}

/// Block 0 funds, block 1 claims "test" at `claim:0`
async fn confirmed_claim() -> (Harness, String) {
    let h = harness().await;
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1), coinbase("cb0b", 50.0, 1)]);
    h.chain.mine_block(vec![spend(
        "claim",
        &[(txid("cb0"), 0)],
        vec![script_output(0, 1.0, &build_claim_name_script("test", VALUE, &pay_script(2)).unwrap())],
    )]);
    h.index_all().await;
    (h, claim_id_from_outpoint(&txid("claim"), 0))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_mempool_update_restores_the_claim() {
    let (h, claim_id) = confirmed_claim().await;
    let confirmed = h.db.claims().get(&claim_id).await.unwrap().unwrap();

    let update = build_update_script("test", &claim_id, br#"{"ver":"0.0.1","title":"pending"}"#, &pay_script(2)).unwrap();
    h.chain.submit_to_mempool(
        spend("update", &[(txid("claim"), 0)], vec![script_output(0, 0.9, &update)]),
        entry(1, vec![]),
    );
    let sync = MempoolSync::new(h.pipeline.clone(), Duration::ZERO, Duration::from_secs(30));
    assert_eq!(sync.sync().await.unwrap().added, 1);
    let pending = h.db.claims().get(&claim_id).await.unwrap().unwrap();
    assert_eq!(pending.transaction_hash, txid("update").to_hex());
    assert_eq!(pending.title.as_deref(), Some("pending"));

    h.chain.drop_from_mempool(&txid("update"));
    assert_eq!(sync.sync().await.unwrap().removed, 1);

    let restored = h.db.claims().get(&claim_id).await.unwrap().unwrap();
    assert_eq!((restored.transaction_hash.as_str(), restored.vout), (confirmed.transaction_hash.as_str(), 0));
    assert_eq!(restored.height, 1);
    assert_eq!(restored.title.as_deref(), Some("t"));
    assert_eq!(restored.bid_state, "Accepted");
    assert_eq!(restored.amount, 100_000_000);
    assert_eq!(h.db.claims().count().await.unwrap(), 1);
    assert!(!h.db.outputs().get(&txid("claim").to_hex(), 0).await.unwrap().unwrap().is_spent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_mempool_abandon_reopens_the_claim() {
    let (h, claim_id) = confirmed_claim().await;

    // Abandons the confirmed claim and makes a new one
    h.chain.submit_to_mempool(
        spend(
            "abandon",
            &[(txid("claim"), 0), (txid("cb0b"), 0)],
            vec![script_output(0, 2.0, &build_claim_name_script("other", VALUE, &pay_script(4)).unwrap())],
        ),
        entry(1, vec![]),
    );
    let sync = MempoolSync::new(h.pipeline.clone(), Duration::ZERO, Duration::from_secs(30));
    sync.sync().await.unwrap();
    let fresh = claim_id_from_outpoint(&txid("abandon"), 0);
    assert_eq!(h.db.claims().get(&claim_id).await.unwrap().unwrap().bid_state, "Spent");
    assert!(h.db.claims().get(&fresh).await.unwrap().is_some());

    h.chain.drop_from_mempool(&txid("abandon"));
    assert_eq!(sync.sync().await.unwrap().removed, 1);
    let reopened = h.db.claims().get(&claim_id).await.unwrap().unwrap();
    assert_eq!(reopened.bid_state, "Accepted");
    assert_eq!(reopened.transaction_hash, txid("claim").to_hex());
    assert!(h.db.claims().get(&fresh).await.unwrap().is_none());
    assert_eq!(h.db.addresses().get(&address(4)).await.unwrap().unwrap().balance, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partial_mempool_transactions_are_not_skipped() {
    let h = harness().await;
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.index_all().await;

    // A row left behind before its outputs were written
    h.db.blocks().ensure_mempool_block().await.unwrap();
    h.db.transactions()
        .put(&TransactionRow {
            hash: txid("pay").to_hex(),
            block_hash: Some(MEMPOOL_BLOCK_HASH.into()),
            input_count: 1,
            output_count: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    h.chain.submit_to_mempool(spend("pay", &[(txid("cb0"), 0)], vec![pay_output(0, 49.0, 2)]), entry(0, vec![]));
    h.chain.submit_to_mempool(spend("orphan", &[(txid("nowhere"), 0)], vec![pay_output(0, 1.0, 3)]), entry(0, vec![]));

    let sync = MempoolSync::new(h.pipeline.clone(), Duration::from_secs(3600), Duration::from_secs(30));
    let report = sync.sync().await.unwrap();
    assert_eq!((report.added, report.skipped, report.failed), (1, 0, 1));
    assert_eq!(h.db.outputs().count_for_transaction(&txid("pay").to_hex()).await.unwrap(), 1);
    assert_eq!(h.db.addresses().get(&address(2)).await.unwrap().unwrap().balance, 4_900_000_000);

    // The failed one left nothing behind and is tried again
    assert!(h.db.transactions().get_by_hash(&txid("orphan").to_hex()).await.unwrap().is_none());
    let again = sync.sync().await.unwrap();
    assert_eq!((again.added, again.skipped, again.failed), (0, 1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claims_expire_after_the_window() {
    let h = harness().await;
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.chain.mine_block(vec![spend(
        "claim",
        &[(txid("cb0"), 0)],
        vec![script_output(0, 1.0, &build_claim_name_script("test", VALUE, &pay_script(2)).unwrap())],
    )]);
    h.index_all().await;
    let claim_id = claim_id_from_outpoint(&txid("claim"), 0);

    assert_eq!(reconcile_name(&h.pipeline, "test", 1 + 262_973).await.unwrap(), 1);
    assert_eq!(h.db.claims().get(&claim_id).await.unwrap().unwrap().bid_state, "Active");

    assert_eq!(reconcile_name(&h.pipeline, "test", 1 + 262_974).await.unwrap(), 1);
    assert_eq!(h.db.claims().get(&claim_id).await.unwrap().unwrap().bid_state, "Expired");

    // Nothing left to change
    assert_eq!(reconcile_name(&h.pipeline, "test", 1 + 262_975).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_chain_sync_repairs_a_replaced_block() {
    let h = harness().await;
    h.chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
    h.chain.mine_block(vec![coinbase("cb1", 50.0, 1)]);
    h.chain.mine_block(vec![coinbase("cb2", 50.0, 1)]);
    h.index_all().await;

    // The node now reports a different block at height 1
    let mut replaced = h.chain.block_at(1).unwrap();
    let late = coinbase("late", 25.0, 5);
    replaced.hash = txid("replacement");
    replaced.tx.push(late.txid);
    h.chain.submit_to_mempool(late, entry(1, vec![]));
    h.chain.replace_block(replaced);

    let issues = ChainValidation::new(h.pipeline.clone(), 10).validate_range(0, 2).await.unwrap();
    assert!(issues.iter().any(|i| matches!(i, ValidationIssue::BlockHashMismatch { height: 1, .. })));

    let job = ChainSync::new(h.pipeline.clone(), Duration::from_secs(30));
    let mut state = ChainSyncState::default();
    for _ in 0..3 {
        job.sweep(&mut state).await.unwrap();
    }

    let block = h.db.blocks().get_by_height(1).await.unwrap().unwrap();
    assert_eq!(block.hash, txid("replacement").to_hex());
    let late_row = h.db.transactions().get_by_hash(&txid("late").to_hex()).await.unwrap().unwrap();
    assert_eq!(late_row.block_hash, Some(txid("replacement").to_hex()));
    assert_eq!(h.db.addresses().get(&address(5)).await.unwrap().unwrap().balance, 2_500_000_000);
    assert!(state.errors.is_empty());

    let issues = ChainValidation::new(h.pipeline.clone(), 10).validate_range(0, 2).await.unwrap();
    assert!(issues.is_empty(), "{:?}", issues);
}
