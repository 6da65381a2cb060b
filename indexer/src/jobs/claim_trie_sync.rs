//! Claim Trie Sync: align claim activation, effective amounts and bid states
//! with the node's claim trie, then pick each name's controlling claim

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use claims_core::{derive_bid_state, expiring_claim_heights, select_controlling, BidState, Contender};
use database::now_ts;

use crate::error::{IndexerError, Result};
use crate::jobs::Job;
use crate::pool::run_bounded;
use crate::processing::Pipeline;

pub const JOB_NAME: &str = "claim_trie_sync";

/// Incremental passes between two full passes
const FULL_PASS_EVERY: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimTrieSyncState {
    /// Start time of the last pass that completed without errors; 0 forces a full pass
    pub last_synced_at: i64,
    /// Chain height of that same pass
    pub last_height: u64,
    #[serde(default)]
    pub runs_since_full: u32,
    #[serde(default)]
    pub names_synced: usize,
    #[serde(default)]
    pub failed: usize,
}

pub struct ClaimTrieSync {
    pipeline: Pipeline,
}

impl ClaimTrieSync {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// One pass. Full on the first run and every [`FULL_PASS_EVERY`] runs,
    /// otherwise limited to [`incremental_names`](Self::incremental_names).
    pub async fn sync(&self, state: &mut ClaimTrieSyncState) -> Result<()> {
        let started = now_ts();
        let rpc = self.pipeline.rpc();
        let retry = self.pipeline.retry();
        let claims = self.pipeline.db().claims();

        let height = retry.run("getblockcount", || rpc.get_block_count()).await?;
        let full = state.last_synced_at == 0 || state.runs_since_full >= FULL_PASS_EVERY;

        let names: Vec<String> = if full {
            let trie = retry.run("getclaimsintrie", || rpc.get_claims_in_trie()).await?;
            let mut names: BTreeSet<String> = trie.into_iter().map(|entry| entry.name).collect();
            // Names that left the trie still need their claims demoted
            names.extend(claims.names_modified_since(0).await?);
            names.into_iter().collect()
        } else {
            self.incremental_names(state, height).await?
        };
        debug!("Claim trie sync at height {}: {} names ({})", height, names.len(), if full { "full" } else { "incremental" });

        let pipeline = self.pipeline.clone();
        let reconciled = run_bounded(names.clone(), self.pipeline.workers(), move |name| {
            let pipeline = pipeline.clone();
            async move { reconcile_name(&pipeline, &name, height).await.map_err(|e| (name, e)) }
        })
        .await;

        let pipeline = self.pipeline.clone();
        let assigned = run_bounded(names.clone(), self.pipeline.workers(), move |name| {
            let pipeline = pipeline.clone();
            async move { assign_controlling(&pipeline, &name).await.map_err(|e| (name, e)) }
        })
        .await;

        let mut failed = 0;
        for (_, (name, e)) in reconciled.errors.iter().chain(assigned.errors.iter()) {
            warn!("Claim trie sync of '{}' failed: {}", name, e);
            failed += 1;
        }
        let changed: usize = reconciled.results.iter().map(|(_, n)| n).sum();
        let takeovers = assigned.results.iter().filter(|(_, moved)| *moved).count();

        state.names_synced = names.len();
        state.failed = failed;
        state.runs_since_full = if full { 0 } else { state.runs_since_full + 1 };
        if failed == 0 {
            state.last_synced_at = started;
            state.last_height = height;
        }
        info!(
            "Claim trie sync: {} names, {} claims updated, {} controlling changes, {} failures",
            names.len(),
            changed,
            takeovers,
            failed
        );
        Ok(())
    }

    /// Names touched since the last clean pass, names whose accepted claims
    /// reached their activation height, and names with live claims that
    /// expired between the last clean pass and `height`
    pub async fn incremental_names(&self, state: &ClaimTrieSyncState, height: u64) -> Result<Vec<String>> {
        let claims = self.pipeline.db().claims();
        let mut names: BTreeSet<String> = claims.names_modified_since(state.last_synced_at).await?.into_iter().collect();
        names.extend(claims.names_activating_by(height as i64).await?);

        let (from, to) = (state.last_height.min(u32::MAX as u64) as u32, height.min(u32::MAX as u64) as u32);
        for heights in expiring_claim_heights(from, to) {
            let expiring = claims
                .names_with_live_claims_between(i64::from(*heights.start()), i64::from(*heights.end()))
                .await?;
            names.extend(expiring);
        }
        Ok(names.into_iter().collect())
    }
}

/// Bring every claim of `name` in line with the node's view at `height`.
/// Returns the number of claims updated.
pub async fn reconcile_name(pipeline: &Pipeline, name: &str, height: u64) -> Result<usize> {
    let rpc = pipeline.rpc();
    let listing = pipeline.retry().run("getclaimsforname", || rpc.get_claims_for_name(name)).await?;
    let claims = pipeline.db().claims();

    let mut updated = 0;
    for claim in claims.by_name(name).await? {
        let current: BidState = claim
            .bid_state
            .parse()
            .map_err(|e: String| IndexerError::Internal(format!("claim {}: {}", claim.claim_id, e)))?;
        let (valid_at, effective) = match listing.claims.iter().find(|c| c.claim_id == claim.claim_id) {
            Some(entry) => (entry.valid_at_height as i64, entry.effective_amount),
            None => (claim.valid_at_height, claim.amount),
        };

        let derived = derive_bid_state(
            current == BidState::Spent,
            claim.height.max(0) as u32,
            valid_at.max(0) as u32,
            height as u32,
        );
        // Control is decided by the second pass only
        let bid_state = match (current, derived) {
            (BidState::Controlling, BidState::Active) => BidState::Controlling,
            (_, derived) => derived,
        };

        if valid_at != claim.valid_at_height || effective != claim.effective_amount || bid_state != current {
            claims.update_trie_fields(&claim.claim_id, valid_at, effective, bid_state.as_str()).await?;
            debug!("Claim {} '{}': {} -> {}", claim.claim_id, name, current, bid_state);
            updated += 1;
        }
    }
    Ok(updated)
}

/// Make the best active claim of `name` its only controlling claim. Returns
/// whether control changed hands.
pub async fn assign_controlling(pipeline: &Pipeline, name: &str) -> Result<bool> {
    let claims = pipeline.db().claims().by_name(name).await?;
    let states: Vec<BidState> = claims.iter().map(|c| c.bid_state.parse().unwrap_or(BidState::Accepted)).collect();
    let contenders: Vec<Contender<'_>> = claims
        .iter()
        .zip(&states)
        .map(|(c, state)| Contender {
            claim_id: &c.claim_id,
            bid_state: *state,
            valid_at_height: c.valid_at_height.max(0) as u32,
            effective_amount: c.effective_amount,
        })
        .collect();

    let winner = select_controlling(&contenders);
    let holder = claims
        .iter()
        .zip(&states)
        .find(|(_, state)| **state == BidState::Controlling)
        .map(|(c, _)| c.claim_id.as_str());
    let others_controlling = states.iter().filter(|s| **s == BidState::Controlling).count() > 1;

    if winner == holder && !others_controlling {
        return Ok(false);
    }
    pipeline.db().claims().set_controlling(name, winner).await?;
    if winner != holder {
        info!("Name '{}' now controlled by {:?}", name, winner);
    }
    Ok(winner != holder)
}

#[async_trait]
impl Job for ClaimTrieSync {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    async fn run(&self) -> Result<Option<serde_json::Value>> {
        let mut state: ClaimTrieSyncState =
            self.pipeline.db().job_status().load_state(JOB_NAME).await?.unwrap_or_default();
        self.sync(&mut state).await?;
        Ok(Some(serde_json::to_value(&state)?))
    }
}
