//! Claim chain relational indexer
//!
//! Mirrors a claim chain full node into a relational store: blocks,
//! transactions, outputs and inputs, per-address ledgers, and the claims and
//! supports carried by claim scripts. Periodic jobs reconcile the index with
//! the node's chain, mempool and claim trie.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod jobs;
pub mod pool;
pub mod processing;
pub mod retry;
pub mod rpc_client;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::Args;
pub use config::Config;
pub use daemon::Daemon;
pub use error::{IndexerError, Result};
pub use processing::Pipeline;
pub use rpc_client::RpcClient;
