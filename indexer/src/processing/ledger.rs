//! Per-transaction credit/debit accumulator

use std::collections::BTreeMap;

use parking_lot::Mutex;

const COIN: f64 = 100_000_000.0;

/// Convert a node-reported coin amount into base units
pub fn to_base_units(coins: f64) -> i64 {
    (coins * COIN).round() as i64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    pub credit: i64,
    pub debit: i64,
}

impl LedgerEntry {
    pub fn net(&self) -> i64 {
        self.credit - self.debit
    }
}

/// Totals per address for one transaction. Shared by that transaction's
/// input and output workers and flushed once both are done.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Mutex<BTreeMap<String, LedgerEntry>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&self, address: &str, amount: i64) {
        self.entries.lock().entry(address.to_string()).or_default().credit += amount;
    }

    pub fn debit(&self, address: &str, amount: i64) {
        self.entries.lock().entry(address.to_string()).or_default().debit += amount;
    }

    /// Snapshot ordered by address
    pub fn entries(&self) -> Vec<(String, LedgerEntry)> {
        self.entries.lock().iter().map(|(a, e)| (a.clone(), *e)).collect()
    }

    pub fn totals(&self) -> LedgerEntry {
        self.entries.lock().values().fold(LedgerEntry::default(), |acc, e| LedgerEntry {
            credit: acc.credit + e.credit,
            debit: acc.debit + e.debit,
        })
    }
}
