//! Mempool Sync: mirror the node's unconfirmed transactions

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use claim_hashes::Hash;
use claims_core::claim_id_from_outpoint;
use database::{now_ts, TransactionRow, MEMPOOL_BLOCK_HASH};
use rpc_core::MempoolEntry;

use crate::error::Result;
use crate::jobs::Job;
use crate::processing::{Pipeline, Placement};

pub const JOB_NAME: &str = "mempool_sync";

/// Transaction ids ordered so that every in-pool dependency precedes its
/// dependents. Dependencies outside the pool are ignored; a cycle is broken
/// at the first transaction visited.
pub fn dependency_order(entries: &HashMap<Hash, MempoolEntry>) -> Vec<Hash> {
    fn visit(txid: Hash, entries: &HashMap<Hash, MempoolEntry>, seen: &mut HashSet<Hash>, out: &mut Vec<Hash>) {
        if !seen.insert(txid) {
            return;
        }
        if let Some(entry) = entries.get(&txid) {
            let depends: BTreeSet<Hash> = entry.depends.iter().copied().filter(|d| entries.contains_key(d)).collect();
            for dependency in depends {
                visit(dependency, entries, seen, out);
            }
        }
        out.push(txid);
    }

    let mut roots: Vec<Hash> = entries.keys().copied().collect();
    roots.sort();

    let mut seen = HashSet::with_capacity(entries.len());
    let mut out = Vec::with_capacity(entries.len());
    for txid in roots {
        visit(txid, entries, &mut seen, &mut out);
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolSyncReport {
    pub added: usize,
    /// Already indexed, in the pool or in a block
    pub skipped: usize,
    pub failed: usize,
    pub removed: usize,
    /// The node was ahead of the index; nothing was done
    pub deferred: bool,
}

pub struct MempoolSync {
    pipeline: Pipeline,
    retention: Duration,
    cooldown: Duration,
    deferred_until: Mutex<Option<Instant>>,
}

impl MempoolSync {
    pub fn new(pipeline: Pipeline, retention: Duration, cooldown: Duration) -> Self {
        Self { pipeline, retention, cooldown, deferred_until: Mutex::new(None) }
    }

    /// One pass, holding the block lock throughout
    pub async fn sync(&self) -> Result<MempoolSyncReport> {
        let mut report = MempoolSyncReport::default();
        if let Some(until) = *self.deferred_until.lock() {
            if Instant::now() < until {
                report.deferred = true;
                return Ok(report);
            }
        }

        let _guard = self.pipeline.block_lock().acquire().await;
        let db = self.pipeline.db();
        let rpc = self.pipeline.rpc();
        let entries = self.pipeline.retry().run("getrawmempool", || rpc.get_raw_mempool()).await?;

        let indexed_height = db.blocks().max_height().await?;
        let ahead = entries.values().map(|e| e.height as i64).max().map_or(false, |h| indexed_height.map_or(true, |i| h > i));
        if ahead {
            info!("Mempool references heights above the index ({:?}); retrying in {:?}", indexed_height, self.cooldown);
            *self.deferred_until.lock() = Some(Instant::now() + self.cooldown);
            report.deferred = true;
            return Ok(report);
        }
        *self.deferred_until.lock() = None;

        let transactions = db.transactions();
        for txid in dependency_order(&entries) {
            if let Some(row) = transactions.get_by_hash(&txid.to_hex()).await? {
                let complete = db.outputs().count_for_transaction(&row.hash).await? == row.output_count;
                if complete || row.block_hash.as_deref() != Some(MEMPOOL_BLOCK_HASH) {
                    report.skipped += 1;
                    continue;
                }
                debug!("Re-indexing partially stored mempool transaction {}", txid);
                self.drop_transaction(&row).await?;
            }
            let Some(entry) = entries.get(&txid) else { continue };
            let placement = Placement::Mempool { height: entry.height, time: entry.time };
            match self.pipeline.index_transaction(&txid, placement).await {
                Ok(_) => report.added += 1,
                Err(e) => {
                    warn!("Skipping mempool transaction {}: {}", txid, e);
                    report.failed += 1;
                    if let Some(partial) = transactions.get_by_hash(&txid.to_hex()).await? {
                        self.drop_transaction(&partial).await?;
                    }
                }
            }
        }

        report.removed = self.remove_stale(&entries).await?;
        if report.added > 0 || report.removed > 0 {
            info!("Mempool sync: {:?}", report);
        } else {
            debug!("Mempool sync: {:?}", report);
        }
        Ok(report)
    }

    /// Delete local unconfirmed transactions the node dropped, once they are
    /// older than the retention window, and re-open what they spent
    async fn remove_stale(&self, entries: &HashMap<Hash, MempoolEntry>) -> Result<usize> {
        let db = self.pipeline.db();
        let live: HashSet<String> = entries.keys().map(Hash::to_hex).collect();
        let cutoff = now_ts() - self.retention.as_secs() as i64;

        let mut removed = 0;
        for tx in db.transactions().mempool().await? {
            let seen_at = tx.transaction_time.unwrap_or(tx.created_at);
            if live.contains(&tx.hash) || seen_at > cutoff {
                continue;
            }
            self.drop_transaction(&tx).await?;
            debug!("Removed dropped mempool transaction {}", tx.hash);
            removed += 1;
        }
        Ok(removed)
    }

    /// Delete an unconfirmed transaction and undo its effects. Claims it
    /// created go with it; claims it only moved return to the outpoint it
    /// spent, and whatever it spent is re-opened.
    async fn drop_transaction(&self, tx: &TransactionRow) -> Result<()> {
        let db = self.pipeline.db();
        let txid = Hash::from_hex(&tx.hash)?;

        let mut moved = Vec::new();
        for output in db.outputs().for_transaction(&tx.hash).await? {
            let Some(claim) = db.claims().get_by_outpoint(&tx.hash, output.vout).await? else { continue };
            if claim.claim_id == claim_id_from_outpoint(&txid, output.vout as u32) {
                db.claims().delete(&claim.claim_id).await?;
            } else {
                moved.push(claim);
            }
        }

        let deleted = db.transactions().delete(tx).await?;
        for output in &deleted.unspent_outputs {
            let owner = moved.iter().position(|c| output.claim_id.as_deref() == Some(c.claim_id.as_str()));
            if let Some(index) = owner {
                if self.pipeline.restore_claim(output).await? {
                    moved.swap_remove(index);
                }
            }
            db.claims().reopen_at(&output.transaction_hash, output.vout).await?;
            db.supports().reopen_at(&output.transaction_hash, output.vout).await?;
        }
        // Moved without spending its previous outpoint; nothing to go back to
        for claim in moved {
            warn!("Claim {} lost its outpoint {}:{}", claim.claim_id, claim.transaction_hash, claim.vout);
            db.claims().mark_spent_at(&claim.transaction_hash, claim.vout).await?;
        }
        db.addresses().resync_balances(&deleted.address_ids).await?;
        Ok(())
    }
}

#[async_trait]
impl Job for MempoolSync {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    async fn run(&self) -> Result<Option<serde_json::Value>> {
        let report = self.sync().await?;
        Ok(Some(serde_json::to_value(&report)?))
    }
}
