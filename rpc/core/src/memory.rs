//! In-memory chain source
//!
//! Serves the same calls as a full node from blocks, transactions, mempool
//! entries and claim listings pushed into it. Used as a fixture in tests and
//! for replaying captured chains.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use claim_hashes::Hash;

use crate::api::RpcApi;
use crate::model::*;

const GENESIS_TIME: i64 = 1_466_646_588;
const BLOCK_SPACING: i64 = 150;

#[derive(Default)]
struct ChainState {
    /// Indexed by height
    blocks: Vec<BlockResponse>,
    transactions: HashMap<Hash, RawTransaction>,
    mempool: HashMap<Hash, MempoolEntry>,
    claims: BTreeMap<String, ClaimsForName>,
}

#[derive(Default)]
pub struct MemoryChain {
    state: RwLock<ChainState>,
    failures: AtomicU32,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block confirming `txs` and return its hash. Confirmed
    /// transactions leave the mempool.
    pub fn mine_block(&self, txs: Vec<RawTransaction>) -> Hash {
        let mut state = self.state.write();
        let height = state.blocks.len() as u64;
        let time = GENESIS_TIME + height as i64 * BLOCK_SPACING;
        let previous = state.blocks.last().map(|b| b.hash);
        let hash = Hash::of(format!("block:{}:{:?}", height, previous).as_bytes());

        if let Some(parent) = state.blocks.last_mut() {
            parent.next_block_hash = Some(hash);
        }

        let mut tx_hashes = Vec::with_capacity(txs.len());
        for mut tx in txs {
            tx.block_hash = Some(hash);
            tx.block_time = Some(time);
            tx.time = Some(time);
            tx_hashes.push(tx.txid);
            state.mempool.remove(&tx.txid);
            state.transactions.insert(tx.txid, tx);
        }

        state.blocks.push(BlockResponse {
            hash,
            height,
            confirmations: 1,
            size: 0,
            version: 1,
            merkle_root: hex::encode(Hash::of(&height.to_le_bytes()).as_bytes()),
            name_claim_root: String::new(),
            tx: tx_hashes,
            time,
            nonce: height,
            bits: "1f00ffff".to_string(),
            difficulty: 1.0,
            chainwork: format!("{:064x}", height + 1),
            previous_block_hash: previous,
            next_block_hash: None,
        });
        hash
    }

    /// Overwrite a stored block, keeping its height slot
    pub fn replace_block(&self, block: BlockResponse) {
        let mut state = self.state.write();
        if let Some(slot) = state.blocks.get_mut(block.height as usize) {
            *slot = block;
        }
    }

    pub fn block_at(&self, height: u64) -> Option<BlockResponse> {
        self.state.read().blocks.get(height as usize).cloned()
    }

    pub fn tip_height(&self) -> Option<u64> {
        self.state.read().blocks.len().checked_sub(1).map(|h| h as u64)
    }

    /// Add an unconfirmed transaction
    pub fn submit_to_mempool(&self, tx: RawTransaction, entry: MempoolEntry) {
        let mut state = self.state.write();
        state.mempool.insert(tx.txid, entry);
        state.transactions.insert(tx.txid, tx);
    }

    /// Evict an unconfirmed transaction, as the node does on conflicts or expiry
    pub fn drop_from_mempool(&self, txid: &Hash) {
        let mut state = self.state.write();
        if state.mempool.remove(txid).is_some() {
            state.transactions.remove(txid);
        }
    }

    pub fn set_claims_for_name(&self, name: &str, claims: ClaimsForName) {
        self.state.write().claims.insert(name.to_string(), claims);
    }

    /// Make the next `count` calls fail with a network error
    pub fn fail_next_calls(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), RpcError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RpcError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RpcApi for MemoryChain {
    async fn get_block_count(&self) -> Result<u64, RpcError> {
        self.check_failure()?;
        Ok(self.tip_height().unwrap_or(0))
    }

    async fn get_block_hash(&self, height: u64) -> Result<Hash, RpcError> {
        self.check_failure()?;
        self.state
            .read()
            .blocks
            .get(height as usize)
            .map(|b| b.hash)
            .ok_or_else(|| RpcError::Rpc { code: -8, message: "Block height out of range".to_string() })
    }

    async fn get_block(&self, hash: &Hash) -> Result<BlockResponse, RpcError> {
        self.check_failure()?;
        let state = self.state.read();
        let tip = state.blocks.len() as i64 - 1;
        state
            .blocks
            .iter()
            .find(|b| &b.hash == hash)
            .map(|b| {
                let mut block = b.clone();
                block.confirmations = tip - block.height as i64 + 1;
                block
            })
            .ok_or_else(|| RpcError::not_found("Block not found"))
    }

    async fn get_raw_transaction(&self, txid: &Hash) -> Result<RawTransaction, RpcError> {
        self.check_failure()?;
        let state = self.state.read();
        let mut tx = state
            .transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| RpcError::not_found("No such mempool or blockchain transaction"))?;
        if let Some(block_hash) = tx.block_hash {
            if let Some(block) = state.blocks.iter().find(|b| b.hash == block_hash) {
                tx.confirmations = Some(state.blocks.len() as i64 - block.height as i64);
            }
        }
        Ok(tx)
    }

    async fn get_raw_mempool(&self) -> Result<HashMap<Hash, MempoolEntry>, RpcError> {
        self.check_failure()?;
        Ok(self.state.read().mempool.clone())
    }

    async fn get_claims_in_trie(&self) -> Result<Vec<ClaimNameEntry>, RpcError> {
        self.check_failure()?;
        let state = self.state.read();
        Ok(state
            .claims
            .iter()
            .map(|(name, listing)| ClaimNameEntry {
                name: name.clone(),
                claims: listing
                    .claims
                    .iter()
                    .map(|c| TrieClaim {
                        claim_id: c.claim_id.clone(),
                        txid: c.txid,
                        n: c.n,
                        amount: c.amount,
                        height: c.height,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn get_claims_for_name(&self, name: &str) -> Result<ClaimsForName, RpcError> {
        self.check_failure()?;
        Ok(self.state.read().claims.get(name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coinbase(seed: &str) -> RawTransaction {
        RawTransaction::new(
            Hash::of(seed.as_bytes()),
            vec![Vin::coinbase(seed.as_bytes())],
            vec![Vout::new(0, 1.0, &[0x51], "nonstandard", vec![])],
        )
    }

    #[tokio::test]
    async fn test_blocks_are_linked() {
        let chain = MemoryChain::new();
        let first = chain.mine_block(vec![coinbase("a")]);
        let second = chain.mine_block(vec![coinbase("b")]);

        assert_eq!(chain.get_block_count().await.unwrap(), 1);
        assert_eq!(chain.get_block_hash(1).await.unwrap(), second);

        let genesis = chain.get_block(&first).await.unwrap();
        assert_eq!(genesis.next_block_hash, Some(second));
        assert_eq!(genesis.confirmations, 2);
        assert_eq!(chain.get_block(&second).await.unwrap().previous_block_hash, Some(first));
    }

    #[tokio::test]
    async fn test_mining_clears_mempool() {
        let chain = MemoryChain::new();
        let tx = coinbase("pending");
        let txid = tx.txid;
        chain.submit_to_mempool(tx.clone(), MempoolEntry { size: 0, fee: 0.0, time: 0, height: 0, depends: vec![] });
        assert!(chain.get_raw_mempool().await.unwrap().contains_key(&txid));
        assert!(chain.get_raw_transaction(&txid).await.unwrap().block_hash.is_none());

        let block = chain.mine_block(vec![tx]);
        assert!(chain.get_raw_mempool().await.unwrap().is_empty());
        assert_eq!(chain.get_raw_transaction(&txid).await.unwrap().block_hash, Some(block));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let chain = MemoryChain::new();
        chain.mine_block(vec![]);
        chain.fail_next_calls(2);
        assert!(matches!(chain.get_block_count().await, Err(RpcError::Network(_))));
        assert!(chain.get_block_count().await.is_err());
        assert!(chain.get_block_count().await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_lookups() {
        let chain = MemoryChain::new();
        assert!(chain.get_block(&Hash::zeroed()).await.unwrap_err().is_not_found());
        assert!(chain.get_raw_transaction(&Hash::zeroed()).await.unwrap_err().is_not_found());
        assert!(chain.get_claims_for_name("none").await.unwrap().claims.is_empty());
    }
}
