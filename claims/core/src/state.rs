//! Claim bid states and the rules that move a claim between them.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Blocks a claim stays live after the extended expiration fork
pub const EXPIRATION_WINDOW: u32 = 2_102_400;
/// Window that applied before the extended expiration fork
pub const ORIGINAL_EXPIRATION_WINDOW: u32 = 262_974;
pub const EXTENDED_EXPIRATION_FORK_HEIGHT: u32 = 400_155;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BidState {
    Accepted,
    Active,
    Controlling,
    Expired,
    Spent,
}

impl BidState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidState::Accepted => "Accepted",
            BidState::Active => "Active",
            BidState::Controlling => "Controlling",
            BidState::Expired => "Expired",
            BidState::Spent => "Spent",
        }
    }

    /// State after the claim is updated in place; an update re-opens a spent claim
    pub fn on_update(self) -> Self {
        match self {
            BidState::Spent => BidState::Accepted,
            other => other,
        }
    }
}

impl fmt::Display for BidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BidState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Accepted" => Ok(BidState::Accepted),
            "Active" => Ok(BidState::Active),
            "Controlling" => Ok(BidState::Controlling),
            "Expired" => Ok(BidState::Expired),
            "Spent" => Ok(BidState::Spent),
            other => Err(format!("unknown bid state: {}", other)),
        }
    }
}

/// Expiration window that applies to a claim made at `claim_height`
pub fn expiration_window(claim_height: u32) -> u32 {
    if claim_height.saturating_add(ORIGINAL_EXPIRATION_WINDOW) < EXTENDED_EXPIRATION_FORK_HEIGHT {
        ORIGINAL_EXPIRATION_WINDOW
    } else {
        EXPIRATION_WINDOW
    }
}

pub fn is_expired(claim_height: u32, current_height: u32) -> bool {
    current_height.saturating_sub(claim_height) >= expiration_window(claim_height)
}

/// Claim heights whose expiry falls after `from` and at or before `to`
pub fn expiring_claim_heights(from: u32, to: u32) -> Vec<RangeInclusive<u32>> {
    let fork_claims = i64::from(EXTENDED_EXPIRATION_FORK_HEIGHT - ORIGINAL_EXPIRATION_WINDOW);
    let regimes = [
        (i64::from(ORIGINAL_EXPIRATION_WINDOW), 0, fork_claims - 1),
        (i64::from(EXPIRATION_WINDOW), fork_claims, i64::from(u32::MAX)),
    ];
    regimes
        .into_iter()
        .filter_map(|(window, first, last)| {
            let low = (i64::from(from) - window + 1).max(first);
            let high = (i64::from(to) - window).min(last);
            (low <= high).then(|| low as u32..=high as u32)
        })
        .collect()
}

/// Bid state implied by chain position alone. `Controlling` is never derived
/// here; it is assigned per name by trie reconciliation.
pub fn derive_bid_state(spent: bool, claim_height: u32, valid_at_height: u32, current_height: u32) -> BidState {
    if spent {
        BidState::Spent
    } else if is_expired(claim_height, current_height) {
        BidState::Expired
    } else if valid_at_height > current_height {
        BidState::Accepted
    } else {
        BidState::Active
    }
}

/// A live claim competing for control of a name
#[derive(Debug, Clone, Copy)]
pub struct Contender<'a> {
    pub claim_id: &'a str,
    pub bid_state: BidState,
    pub valid_at_height: u32,
    pub effective_amount: i64,
}

/// Pick the claim that controls a name: among active claims, the greatest
/// `valid_at_height`, then effective amount, then claim id.
pub fn select_controlling<'a>(contenders: &[Contender<'a>]) -> Option<&'a str> {
    contenders
        .iter()
        .filter(|c| matches!(c.bid_state, BidState::Active | BidState::Controlling))
        .max_by(|a, b| {
            (a.valid_at_height, a.effective_amount, a.claim_id).cmp(&(b.valid_at_height, b.effective_amount, b.claim_id))
        })
        .map(|c| c.claim_id)
}
