#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use claim_hashes::Hash;
use claims_core::address::{address_from_pay_script, p2pkh_script};
use claims_core::Network;
use database::Database;
use rpc_core::{MemoryChain, RawTransaction, Vin, Vout};
use tempfile::TempDir;

use claim_indexer::processing::Pipeline;
use claim_indexer::retry::RetryPolicy;

pub struct Harness {
    pub _dir: TempDir,
    pub db: Database,
    pub chain: Arc<MemoryChain>,
    pub pipeline: Pipeline,
}

pub async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("index.db")).await.unwrap();
    db.migrate().await.unwrap();
    let chain = Arc::new(MemoryChain::new());
    let pipeline = Pipeline::new(chain.clone(), db.clone(), Network::Mainnet)
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)))
        .with_workers(4);
    Harness { _dir: dir, db, chain, pipeline }
}

impl Harness {
    /// Index every block the chain has that the index does not
    pub async fn index_all(&self) {
        let next = self.db.blocks().max_height().await.unwrap().map_or(0, |h| h as u64 + 1);
        let tip = self.chain.tip_height().unwrap();
        for height in next..=tip {
            self.pipeline.process_block(height).await.unwrap();
        }
    }
}

pub fn pay_script(tag: u8) -> Vec<u8> {
    p2pkh_script(&[tag; 20])
}

pub fn address(tag: u8) -> String {
    address_from_pay_script(&pay_script(tag), Network::Mainnet).unwrap()
}

pub fn txid(seed: &str) -> Hash {
    Hash::of(seed.as_bytes())
}

pub fn pay_output(n: u32, value: f64, tag: u8) -> Vout {
    Vout::new(n, value, &pay_script(tag), "pubkeyhash", vec![address(tag)])
}

/// Claim scripts come back from the node without addresses
pub fn script_output(n: u32, value: f64, script: &[u8]) -> Vout {
    Vout::new(n, value, script, "nonstandard", vec![])
}

pub fn coinbase(seed: &str, value: f64, tag: u8) -> RawTransaction {
    RawTransaction::new(txid(seed), vec![Vin::coinbase(seed.as_bytes())], vec![pay_output(0, value, tag)])
}

pub fn spend(seed: &str, inputs: &[(Hash, u32)], outputs: Vec<Vout>) -> RawTransaction {
    let vin = inputs.iter().map(|(txid, n)| Vin::spending(*txid, *n)).collect();
    RawTransaction::new(txid(seed), vin, outputs)
}
