//! Block and transaction ingestion
//!
//! A [`Pipeline`] turns chain-source blocks into index rows: block header,
//! transactions, outputs, inputs, per-address ledger rows and the claim and
//! support rows implied by claim scripts. Blocks are committed one at a time
//! under the [`BlockLock`].

pub mod block;
pub mod cert;
pub mod claim;
pub mod ledger;
pub mod transaction;
pub mod vin;
pub mod vout;

use std::sync::Arc;

use claims_core::Network;
use database::Database;
use rpc_core::RpcApi;

use crate::retry::RetryPolicy;

pub use block::{block_row, BlockLock, BlockOutcome};
pub use cert::CertificateCheck;
pub use ledger::{to_base_units, Ledger, LedgerEntry};
pub use transaction::{Placement, TransactionOutcome};
pub use vout::output_addresses;

#[derive(Clone)]
pub struct Pipeline {
    rpc: Arc<dyn RpcApi>,
    db: Database,
    network: Network,
    retry: RetryPolicy,
    workers: usize,
    lock: BlockLock,
}

impl Pipeline {
    pub fn new(rpc: Arc<dyn RpcApi>, db: Database, network: Network) -> Self {
        Self { rpc, db, network, retry: RetryPolicy::default(), workers: 0, lock: BlockLock::new() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ceiling for every fan-out; 0 means one worker per CPU
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn rpc(&self) -> &Arc<dyn RpcApi> {
        &self.rpc
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn block_lock(&self) -> &BlockLock {
        &self.lock
    }
}
