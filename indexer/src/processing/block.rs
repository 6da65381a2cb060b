//! Block level ingestion

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use claim_hashes::Hash;
use database::BlockRow;
use rpc_core::BlockResponse;

use crate::error::{IndexerError, Result};
use crate::processing::transaction::Placement;
use crate::processing::Pipeline;

/// Serialises block commits against each other and against mempool passes
#[derive(Clone, Default)]
pub struct BlockLock(Arc<Mutex<()>>);

impl BlockLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    pub height: u64,
    pub hash: Hash,
    pub transactions: usize,
}

impl BlockOutcome {
    /// Height the caller should process next
    pub fn next_height(&self) -> u64 {
        self.height + 1
    }
}

/// Row holding the scalar columns of a verbose block
pub fn block_row(block: &BlockResponse) -> BlockRow {
    BlockRow {
        height: block.height as i64,
        hash: block.hash.to_hex(),
        confirmations: block.confirmations,
        time: block.time,
        bits: block.bits.clone(),
        size: block.size as i64,
        chainwork: block.chainwork.clone(),
        difficulty: block.difficulty,
        merkle_root: block.merkle_root.clone(),
        name_claim_root: block.name_claim_root.clone(),
        nonce: block.nonce as i64,
        version: block.version,
        previous_block_hash: block.previous_block_hash.map(|h| h.to_hex()),
        next_block_hash: block.next_block_hash.map(|h| h.to_hex()),
        tx_hashes: block.tx.iter().map(Hash::to_hex).collect::<Vec<_>>().join(","),
        ..Default::default()
    }
}

impl Pipeline {
    /// Index the block at `height` and every transaction it lists.
    ///
    /// Heights must arrive in order: anything above the highest indexed
    /// height plus one is rejected. An empty index accepts any first height.
    pub async fn process_block(&self, height: u64) -> Result<BlockOutcome> {
        let _guard = self.block_lock().acquire().await;

        if let Some(max_indexed) = self.db().blocks().max_height().await? {
            if height as i64 > max_indexed + 1 {
                return Err(IndexerError::HeightOutOfOrder { height, max_indexed });
            }
        }

        let rpc = self.rpc();
        let hash = self.retry().run("getblockhash", || rpc.get_block_hash(height)).await?;
        let block = self.retry().run("getblock", || rpc.get_block(&hash)).await?;

        self.db().blocks().put(&block_row(&block)).await?;
        debug!("Block {} ({}) has {} transactions", height, hash, block.tx.len());

        let placement = Placement::Block { hash, height, time: block.time };
        for txid in &block.tx {
            self.index_transaction(txid, placement).await?;
        }

        if height > 0 {
            self.db().blocks().set_next_block_hash(height as i64 - 1, &hash.to_hex()).await?;
        }

        info!("Indexed block {} ({} transactions)", height, block.tx.len());
        Ok(BlockOutcome { height, hash, transactions: block.tx.len() })
    }
}
