//! Certificate Sync: validate channel signatures the inline check could not settle

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::jobs::Job;
use crate::processing::{CertificateCheck, Pipeline};

pub const JOB_NAME: &str = "certificate_sync";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSyncState {
    /// Row id the next batch starts after
    pub after_id: i64,
    pub valid: u64,
    pub invalid: u64,
    /// Claims skipped because their channel is not indexed
    pub waiting: u64,
}

pub struct CertificateSync {
    pipeline: Pipeline,
    batch: i64,
}

impl CertificateSync {
    pub fn new(pipeline: Pipeline, batch: i64) -> Self {
        Self { pipeline, batch: batch.max(1) }
    }

    /// Check one batch of pending claims. Claims waiting for their channel
    /// are passed over; the cursor wraps once the table end is reached.
    pub async fn check_batch(&self, state: &mut CertificateSyncState) -> Result<usize> {
        let claims = self.pipeline.db().claims();
        let mut batch = claims.pending_certificates(state.after_id, self.batch).await?;
        if batch.is_empty() && state.after_id > 0 {
            state.after_id = 0;
            batch = claims.pending_certificates(0, self.batch).await?;
        }

        for claim in &batch {
            match self.pipeline.check_certificate(claim).await? {
                CertificateCheck::Valid => state.valid += 1,
                CertificateCheck::Invalid => state.invalid += 1,
                CertificateCheck::ChannelUnknown => {
                    debug!("Claim {} waits for channel {:?}", claim.claim_id, claim.publisher_id);
                    state.waiting += 1;
                }
            }
            state.after_id = claim.id;
        }

        if !batch.is_empty() {
            info!("Checked {} channel signatures (next after row {})", batch.len(), state.after_id);
        }
        Ok(batch.len())
    }
}

#[async_trait]
impl Job for CertificateSync {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    async fn run(&self) -> Result<Option<serde_json::Value>> {
        let mut state: CertificateSyncState =
            self.pipeline.db().job_status().load_state(JOB_NAME).await?.unwrap_or_default();
        self.check_batch(&mut state).await?;
        Ok(Some(serde_json::to_value(&state)?))
    }
}
