//! Chain Sync: sweep indexed heights, realign block columns with the node and
//! backfill whatever the live pipeline missed

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use database::{BlockRow, FieldValue};

use crate::error::Result;
use crate::jobs::Job;
use crate::processing::{block_row, Pipeline, Placement};

pub const JOB_NAME: &str = "chain_sync";

const MAX_ERRORS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    pub area: String,
    pub height: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSyncState {
    /// Next height to check
    pub last_height: u64,
    /// Sweep ceiling, refreshed from the index when reached
    pub max_height_stored: u64,
    #[serde(default)]
    pub errors: Vec<SyncError>,
}

impl ChainSyncState {
    /// Record a failure; one entry per (area, height), oldest dropped first
    pub fn record_error(&mut self, area: &str, height: u64, message: String) {
        self.errors.retain(|e| !(e.area == area && e.height == height));
        self.errors.push(SyncError { area: area.to_string(), height, message });
        if self.errors.len() > MAX_ERRORS {
            let excess = self.errors.len() - MAX_ERRORS;
            self.errors.drain(..excess);
        }
    }

    pub fn clear_error(&mut self, area: &str, height: u64) {
        self.errors.retain(|e| !(e.area == area && e.height == height));
    }
}

/// Columns of `local` that differ from `expected`, confirmations excluded
pub fn block_diff(local: &BlockRow, expected: &BlockRow) -> Vec<(&'static str, FieldValue)> {
    let mut diff: Vec<(&'static str, FieldValue)> = Vec::new();
    macro_rules! check {
        ($column:ident) => {
            if local.$column != expected.$column {
                diff.push((stringify!($column), expected.$column.clone().into()));
            }
        };
    }
    check!(hash);
    check!(time);
    check!(bits);
    check!(size);
    check!(chainwork);
    check!(difficulty);
    check!(merkle_root);
    check!(name_claim_root);
    check!(nonce);
    check!(version);
    check!(previous_block_hash);
    check!(next_block_hash);
    check!(tx_hashes);
    diff
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeightReport {
    pub block_backfilled: bool,
    pub columns_fixed: usize,
    pub transactions_backfilled: usize,
}

pub struct ChainSync {
    pipeline: Pipeline,
    budget: Duration,
}

impl ChainSync {
    pub fn new(pipeline: Pipeline, budget: Duration) -> Self {
        Self { pipeline, budget }
    }

    /// One budgeted sweep step starting from `state`
    pub async fn sweep(&self, state: &mut ChainSyncState) -> Result<()> {
        let blocks = self.pipeline.db().blocks();
        let refresh = |max: Option<i64>| max.map_or(0, |h| h.max(0) as u64);

        if blocks.max_height().await?.is_none() {
            debug!("Chain sync: index is empty");
            return Ok(());
        }
        if state.last_height >= state.max_height_stored {
            state.max_height_stored = refresh(blocks.max_height().await?);
        }
        if state.last_height > state.max_height_stored {
            state.last_height = 0;
        }

        let started = Instant::now();
        let mut checked = 0u64;
        loop {
            let height = state.last_height;
            match self.sync_height(height, state).await {
                Ok(report) => {
                    state.clear_error("block", height);
                    if report != HeightReport::default() {
                        info!("Chain sync realigned height {}: {:?}", height, report);
                    }
                }
                Err(e) => {
                    warn!("Chain sync failed at height {}: {}", height, e);
                    state.record_error("block", height, e.to_string());
                }
            }
            checked += 1;

            if height >= state.max_height_stored {
                state.max_height_stored = refresh(blocks.max_height().await?);
                if height >= state.max_height_stored {
                    state.last_height = 0;
                    break;
                }
            }
            state.last_height = height + 1;
            if started.elapsed() >= self.budget {
                break;
            }
        }

        debug!("Chain sync checked {} heights, next {}", checked, state.last_height);
        Ok(())
    }

    async fn sync_height(&self, height: u64, state: &mut ChainSyncState) -> Result<HeightReport> {
        let rpc = self.pipeline.rpc();
        let retry = self.pipeline.retry();
        let hash = retry.run("getblockhash", || rpc.get_block_hash(height)).await?;
        let block = retry.run("getblock", || rpc.get_block(&hash)).await?;
        let expected = block_row(&block);

        let mut report = HeightReport::default();
        match self.pipeline.db().blocks().get_by_height(height as i64).await? {
            None => {
                self.pipeline.process_block(height).await?;
                report.block_backfilled = true;
                return Ok(report);
            }
            Some(local) if local.hash != expected.hash => {
                warn!("Height {} indexed as {} but the node has {}", height, local.hash, expected.hash);
                self.pipeline.process_block(height).await?;
                report.block_backfilled = true;
                return Ok(report);
            }
            Some(local) => {
                let diff = block_diff(&local, &expected);
                if !diff.is_empty() {
                    let columns: Vec<&str> = diff.iter().map(|(c, _)| *c).collect();
                    warn!("Block {} differs in {:?}", height, columns);
                    report.columns_fixed = diff.len();
                    self.pipeline.db().blocks().update_fields(local.id, &diff).await?;
                }
            }
        }

        let transactions = self.pipeline.db().transactions();
        let placement = Placement::Block { hash, height, time: block.time };
        for txid in &block.tx {
            let stored = transactions.get_by_hash(&txid.to_hex()).await?;
            let aligned = stored.map_or(false, |tx| tx.block_hash.as_deref() == Some(expected.hash.as_str()));
            if aligned {
                continue;
            }
            match self.pipeline.process_transaction(txid, placement).await {
                Ok(_) => {
                    report.transactions_backfilled += 1;
                    state.clear_error("transaction", height);
                }
                Err(e) => {
                    warn!("Backfill of transaction {} at height {} failed: {}", txid, height, e);
                    state.record_error("transaction", height, format!("{}: {}", txid, e));
                }
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl Job for ChainSync {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    async fn run(&self) -> Result<Option<serde_json::Value>> {
        let mut state: ChainSyncState =
            self.pipeline.db().job_status().load_state(JOB_NAME).await?.unwrap_or_default();
        self.sweep(&mut state).await?;
        Ok(Some(serde_json::to_value(&state)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rpc_core::MemoryChain;

    use crate::testing::{coinbase, pipeline, test_db};

    fn row(hash: &str) -> BlockRow {
        BlockRow {
            height: 3,
            hash: hash.into(),
            confirmations: 1,
            time: 100,
            bits: "1f00ffff".into(),
            tx_hashes: "aa".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_block_diff_ignores_confirmations() {
        let local = row("h");
        let mut expected = row("h");
        expected.confirmations = 50;
        assert!(block_diff(&local, &expected).is_empty());

        expected.time = 101;
        expected.next_block_hash = Some("n".into());
        let diff = block_diff(&local, &expected);
        assert_eq!(diff, vec![("time", FieldValue::Int(101)), ("next_block_hash", FieldValue::Text(Some("n".into())))]);
    }

    #[test]
    fn test_error_log_is_keyed_and_bounded() {
        let mut state = ChainSyncState::default();
        state.record_error("block", 5, "first".into());
        state.record_error("block", 5, "second".into());
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].message, "second");

        for height in 0..(MAX_ERRORS as u64 + 10) {
            state.record_error("transaction", height, "x".into());
        }
        assert_eq!(state.errors.len(), MAX_ERRORS);
        assert_eq!(state.errors.last().unwrap().height, MAX_ERRORS as u64 + 9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sweep_repairs_columns_and_missing_blocks() {
        let (_dir, db) = test_db().await;
        let chain = Arc::new(MemoryChain::new());
        for i in 0..4 {
            chain.mine_block(vec![coinbase(&format!("cb{}", i), 50.0, 1)]);
        }
        let pipeline = pipeline(&chain, &db);
        for height in 0..4 {
            pipeline.process_block(height).await.unwrap();
        }

        // Corrupt one column and lose one transaction
        let block1 = db.blocks().get_by_height(1).await.unwrap().unwrap();
        db.blocks().update_fields(block1.id, &[("bits", FieldValue::from("bad".to_string()))]).await.unwrap();
        let cb2 = db.transactions().get_by_hash(&crate::testing::txid("cb2").to_hex()).await.unwrap().unwrap();
        db.transactions().delete(&cb2).await.unwrap();

        let job = ChainSync::new(pipeline, Duration::from_secs(30));
        let mut state = ChainSyncState::default();
        job.sweep(&mut state).await.unwrap();

        assert_eq!(db.blocks().get_by_height(1).await.unwrap().unwrap().bits, "1f00ffff");
        assert!(db.transactions().get_by_hash(&cb2.hash).await.unwrap().is_some());
        assert!(state.errors.is_empty());
        // A full sweep wraps the cursor
        assert_eq!(state.last_height, 0);
        assert_eq!(state.max_height_stored, 3);
    }

    #[tokio::test]
    async fn test_budget_stops_sweep_and_errors_advance_cursor() {
        let (_dir, db) = test_db().await;
        let chain = Arc::new(MemoryChain::new());
        for i in 0..3 {
            chain.mine_block(vec![coinbase(&format!("cb{}", i), 50.0, 1)]);
        }
        let pipeline = pipeline(&chain, &db);
        for height in 0..3 {
            pipeline.process_block(height).await.unwrap();
        }

        let job = ChainSync::new(pipeline, Duration::ZERO);
        let mut state = ChainSyncState { last_height: 1, max_height_stored: 2, errors: vec![] };
        chain.fail_next_calls(10);
        job.sweep(&mut state).await.unwrap();

        assert_eq!(state.last_height, 2);
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].height, 1);
    }
}
