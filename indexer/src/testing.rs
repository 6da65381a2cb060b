//! Fixtures shared by the unit tests

use std::sync::Arc;
use std::time::Duration;

use claim_hashes::Hash;
use claims_core::address::{address_from_pay_script, p2pkh_script};
use claims_core::Network;
use database::Database;
use rpc_core::{MemoryChain, RawTransaction, Vin, Vout};

use crate::processing::Pipeline;
use crate::retry::RetryPolicy;

pub async fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("index.db")).await.unwrap();
    db.migrate().await.unwrap();
    (dir, db)
}

pub fn pipeline(chain: &Arc<MemoryChain>, db: &Database) -> Pipeline {
    Pipeline::new(chain.clone(), db.clone(), Network::Mainnet)
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)))
        .with_workers(4)
}

pub fn pay_script(tag: u8) -> Vec<u8> {
    p2pkh_script(&[tag; 20])
}

pub fn address(tag: u8) -> String {
    address_from_pay_script(&pay_script(tag), Network::Mainnet).unwrap()
}

pub fn pay_output(n: u32, value: f64, tag: u8) -> Vout {
    Vout::new(n, value, &pay_script(tag), "pubkeyhash", vec![address(tag)])
}

pub fn script_output(n: u32, value: f64, script: &[u8]) -> Vout {
    Vout::new(n, value, script, "nonstandard", vec![])
}

pub fn txid(seed: &str) -> Hash {
    Hash::of(seed.as_bytes())
}

pub fn coinbase(seed: &str, value: f64, tag: u8) -> RawTransaction {
    RawTransaction::new(txid(seed), vec![Vin::coinbase(seed.as_bytes())], vec![pay_output(0, value, tag)])
}

pub fn spend(seed: &str, inputs: &[(Hash, u32)], outputs: Vec<Vout>) -> RawTransaction {
    let vin = inputs.iter().map(|(txid, n)| Vin::spending(*txid, *n)).collect();
    RawTransaction::new(txid(seed), vin, outputs)
}
