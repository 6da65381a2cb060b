//! Periodic reconciliation jobs
//!
//! Each job runs on its own timer. A run never overlaps the previous run of
//! the same job, and its outcome (success flag, error, state blob) is written
//! to the job status table.

pub mod certificate_sync;
pub mod chain_sync;
pub mod chain_validation;
pub mod claim_trie_sync;
pub mod mempool_sync;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use database::Database;

use crate::error::Result;

pub use certificate_sync::CertificateSync;
pub use chain_sync::{block_diff, ChainSync, ChainSyncState, SyncError};
pub use chain_validation::{ChainValidation, ValidationIssue};
pub use claim_trie_sync::{ClaimTrieSync, ClaimTrieSyncState};
pub use mempool_sync::{dependency_order, MempoolSync, MempoolSyncReport};

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    /// One pass. The returned value is persisted as the job's state.
    async fn run(&self) -> Result<Option<serde_json::Value>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed,
    Failed(String),
    /// The previous run was still in progress
    Skipped,
}

/// A job with its overlap guard
pub struct ScheduledJob {
    job: Arc<dyn Job>,
    db: Database,
    every: Duration,
    running: AtomicBool,
}

impl ScheduledJob {
    pub fn new(job: Arc<dyn Job>, db: Database, every: Duration) -> Self {
        Self { job, db, every, running: AtomicBool::new(false) }
    }

    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run the job now unless it is already running
    pub async fn trigger(&self) -> TriggerOutcome {
        if self.running.swap(true, Ordering::AcqRel) {
            debug!("{} still running, skipping tick", self.name());
            return TriggerOutcome::Skipped;
        }

        let outcome = match self.job.run().await {
            Ok(state) => {
                self.record(true, state.as_ref(), None).await;
                TriggerOutcome::Completed
            }
            Err(e) => {
                if e.is_fatal() {
                    error!("{} failed: {}", self.name(), e);
                } else {
                    warn!("{} failed: {}", self.name(), e);
                }
                self.record(false, None, Some(e.to_string())).await;
                TriggerOutcome::Failed(e.to_string())
            }
        };

        self.running.store(false, Ordering::Release);
        outcome
    }

    async fn record(&self, ok: bool, state: Option<&serde_json::Value>, message: Option<String>) {
        if let Err(e) = self.db.job_status().save(self.name(), ok, state, message).await {
            warn!("Could not record status of {}: {}", self.name(), e);
        }
    }
}

#[derive(Default)]
pub struct JobRunner {
    jobs: Vec<Arc<ScheduledJob>>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, job: Arc<dyn Job>, db: Database, every: Duration) {
        self.jobs.push(Arc::new(ScheduledJob::new(job, db, every)));
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Start one timer task per job
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        self.jobs
            .into_iter()
            .map(|job| {
                info!("Scheduling {} every {:?}", job.name(), job.every);
                tokio::spawn(async move {
                    let mut ticker = interval(job.every);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        let job = job.clone();
                        // Runs detached so a long pass shows up as skipped ticks
                        tokio::spawn(async move {
                            job.trigger().await;
                        });
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    use crate::error::IndexerError;

    struct Counting {
        runs: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    #[async_trait]
    impl Job for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> Result<Option<serde_json::Value>> {
            let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(IndexerError::Internal("boom".into()));
            }
            Ok(Some(serde_json::json!({ "runs": runs })))
        }
    }

    async fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("jobs.db")).await.unwrap();
        db.migrate().await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_trigger_persists_state() {
        let (_dir, db) = test_db().await;
        let job = Arc::new(Counting { runs: AtomicUsize::new(0), gate: None, fail: false });
        let scheduled = ScheduledJob::new(job, db.clone(), Duration::from_secs(1));

        assert_eq!(scheduled.trigger().await, TriggerOutcome::Completed);
        let status = db.job_status().get("counting").await.unwrap().unwrap();
        assert!(status.is_success);
        let state: serde_json::Value = db.job_status().load_state("counting").await.unwrap().unwrap();
        assert_eq!(state["runs"], 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_state() {
        let (_dir, db) = test_db().await;
        db.job_status().save("counting", true, Some(&serde_json::json!({ "runs": 7 })), None).await.unwrap();

        let job = Arc::new(Counting { runs: AtomicUsize::new(0), gate: None, fail: true });
        let scheduled = ScheduledJob::new(job, db.clone(), Duration::from_secs(1));
        assert!(matches!(scheduled.trigger().await, TriggerOutcome::Failed(_)));

        let status = db.job_status().get("counting").await.unwrap().unwrap();
        assert!(!status.is_success);
        assert!(status.error_message.unwrap().contains("boom"));
        let state: serde_json::Value = db.job_status().load_state("counting").await.unwrap().unwrap();
        assert_eq!(state["runs"], 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_trigger_is_skipped() {
        let (_dir, db) = test_db().await;
        let gate = Arc::new(Notify::new());
        let job = Arc::new(Counting { runs: AtomicUsize::new(0), gate: Some(gate.clone()), fail: false });
        let scheduled = Arc::new(ScheduledJob::new(job.clone(), db, Duration::from_secs(1)));

        let first = {
            let scheduled = scheduled.clone();
            tokio::spawn(async move { scheduled.trigger().await })
        };
        while !scheduled.is_running() {
            tokio::task::yield_now().await;
        }
        assert_eq!(scheduled.trigger().await, TriggerOutcome::Skipped);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), TriggerOutcome::Completed);
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }
}
