//! Chain Validation: read-only comparison of the index against the node

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::jobs::Job;
use crate::processing::Pipeline;

pub const JOB_NAME: &str = "chain_validation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationIssue {
    MissingBlock { height: u64 },
    BlockHashMismatch { height: u64, indexed: String, node: String },
    MissingTransaction { height: u64, txid: String },
    InputCountMismatch { txid: String, expected: i64, stored: i64 },
    OutputCountMismatch { txid: String, expected: i64, stored: i64 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingBlock { height } => write!(f, "block {} is not indexed", height),
            ValidationIssue::BlockHashMismatch { height, indexed, node } => {
                write!(f, "block {} indexed as {} but the node has {}", height, indexed, node)
            }
            ValidationIssue::MissingTransaction { height, txid } => {
                write!(f, "transaction {} of block {} is not indexed", txid, height)
            }
            ValidationIssue::InputCountMismatch { txid, expected, stored } => {
                write!(f, "transaction {} has {} of {} inputs", txid, stored, expected)
            }
            ValidationIssue::OutputCountMismatch { txid, expected, stored } => {
                write!(f, "transaction {} has {} of {} outputs", txid, stored, expected)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainValidationState {
    pub next_height: u64,
    pub issues_found: u64,
}

pub struct ChainValidation {
    pipeline: Pipeline,
    batch: u64,
}

impl ChainValidation {
    pub fn new(pipeline: Pipeline, batch: u64) -> Self {
        Self { pipeline, batch: batch.max(1) }
    }

    /// Check every height in `from..=to`. Nothing is written.
    pub async fn validate_range(&self, from: u64, to: u64) -> Result<Vec<ValidationIssue>> {
        let rpc = self.pipeline.rpc();
        let retry = self.pipeline.retry();
        let db = self.pipeline.db();
        let mut issues = Vec::new();

        for height in from..=to {
            let hash = retry.run("getblockhash", || rpc.get_block_hash(height)).await?;
            let Some(local) = db.blocks().get_by_height(height as i64).await? else {
                issues.push(ValidationIssue::MissingBlock { height });
                continue;
            };
            if local.hash != hash.to_hex() {
                issues.push(ValidationIssue::BlockHashMismatch { height, indexed: local.hash, node: hash.to_hex() });
                continue;
            }

            let block = retry.run("getblock", || rpc.get_block(&hash)).await?;
            for txid in block.tx.iter().map(|t| t.to_hex()) {
                let Some(tx) = db.transactions().get_by_hash(&txid).await? else {
                    issues.push(ValidationIssue::MissingTransaction { height, txid });
                    continue;
                };
                let inputs = db.inputs().count_for_transaction(&txid).await?;
                if inputs != tx.input_count {
                    issues.push(ValidationIssue::InputCountMismatch {
                        txid: txid.clone(),
                        expected: tx.input_count,
                        stored: inputs,
                    });
                }
                let outputs = db.outputs().count_for_transaction(&txid).await?;
                if outputs != tx.output_count {
                    issues.push(ValidationIssue::OutputCountMismatch { txid, expected: tx.output_count, stored: outputs });
                }
            }
        }

        for issue in &issues {
            warn!("Validation: {}", issue);
        }
        info!("Validated heights {}..={}: {} issues", from, to, issues.len());
        Ok(issues)
    }
}

#[async_trait]
impl Job for ChainValidation {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    async fn run(&self) -> Result<Option<serde_json::Value>> {
        let db = self.pipeline.db();
        let mut state: ChainValidationState = db.job_status().load_state(JOB_NAME).await?.unwrap_or_default();
        let Some(max) = db.blocks().max_height().await? else {
            return Ok(Some(serde_json::to_value(&state)?));
        };
        let max = max.max(0) as u64;
        if state.next_height > max {
            state.next_height = 0;
        }

        let to = (state.next_height + self.batch - 1).min(max);
        let issues = self.validate_range(state.next_height, to).await?;
        state.issues_found += issues.len() as u64;
        state.next_height = if to >= max { 0 } else { to + 1 };
        Ok(Some(serde_json::to_value(&state)?))
    }
}
