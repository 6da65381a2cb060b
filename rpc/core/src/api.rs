//! Chain source contract

use std::collections::HashMap;

use async_trait::async_trait;
use claim_hashes::Hash;

use crate::model::*;

/// Read-only view of a full node, as the indexer consumes it
#[async_trait]
pub trait RpcApi: Send + Sync {
    // Chain
    async fn get_block_count(&self) -> Result<u64, RpcError>;
    async fn get_block_hash(&self, height: u64) -> Result<Hash, RpcError>;
    async fn get_block(&self, hash: &Hash) -> Result<BlockResponse, RpcError>;
    async fn get_raw_transaction(&self, txid: &Hash) -> Result<RawTransaction, RpcError>;

    // Mempool
    async fn get_raw_mempool(&self) -> Result<HashMap<Hash, MempoolEntry>, RpcError>;

    // Claim trie
    async fn get_claims_in_trie(&self) -> Result<Vec<ClaimNameEntry>, RpcError>;
    async fn get_claims_for_name(&self, name: &str) -> Result<ClaimsForName, RpcError>;
}
