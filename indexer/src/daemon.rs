//! Indexer daemon: follows the chain tip and drives the reconciliation jobs

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use database::Database;
use rpc_core::RpcApi;

use crate::config::{Config, JobsConfig};
use crate::error::Result;
use crate::jobs::{CertificateSync, ChainSync, ChainValidation, ClaimTrieSync, JobRunner, MempoolSync};
use crate::processing::Pipeline;
use crate::rpc_client::RpcClient;

pub struct Daemon {
    pipeline: Pipeline,
    jobs: JobsConfig,
    poll_interval: Duration,
    start_height: u64,
    shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
    /// Open the database and connect to the node described by `config`
    pub async fn new(config: Config) -> Result<Self> {
        let db = match &config.database.url {
            Some(url) => Database::connect(url).await?,
            None => Database::open(&config.database.path).await?,
        };
        db.migrate().await?;

        let rpc: Arc<dyn RpcApi> =
            Arc::new(RpcClient::new(&config.rpc.url, Duration::from_secs(config.rpc.timeout_secs))?);
        let pipeline = Pipeline::new(rpc, db, config.network)
            .with_retry(config.rpc.retry_policy())
            .with_workers(config.daemon.workers);
        Ok(Self::with_pipeline(pipeline, &config))
    }

    pub fn with_pipeline(pipeline: Pipeline, config: &Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            pipeline,
            jobs: config.jobs.clone(),
            poll_interval: Duration::from_secs(config.daemon.poll_interval_secs.max(1)),
            start_height: config.daemon.start_height,
            shutdown_tx,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Handle that stops [`run`](Self::run) when sent to
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Index every block between the index tip and the node tip. Returns the
    /// number of blocks indexed.
    pub async fn catch_up(&self) -> Result<u64> {
        let rpc = self.pipeline.rpc();
        let tip = self.pipeline.retry().run("getblockcount", || rpc.get_block_count()).await?;
        let next = match self.pipeline.db().blocks().max_height().await? {
            Some(max) => (max + 1) as u64,
            None => self.start_height,
        };
        if next > tip {
            return Ok(0);
        }

        info!("Catching up from height {} to {}", next, tip);
        let mut indexed = 0;
        for height in next..=tip {
            let outcome = self.pipeline.process_block(height).await?;
            debug!("Next height {}", outcome.next_height());
            indexed += 1;
        }
        Ok(indexed)
    }

    fn build_jobs(&self) -> JobRunner {
        let db = self.pipeline.db().clone();
        let jobs = &self.jobs;
        let mut runner = JobRunner::new();

        if jobs.chain_sync.enabled {
            let job = ChainSync::new(self.pipeline.clone(), jobs.chain_sync.budget());
            runner.add(Arc::new(job), db.clone(), jobs.chain_sync.interval());
        }
        if jobs.chain_validation.enabled {
            let job = ChainValidation::new(self.pipeline.clone(), jobs.validation_batch);
            runner.add(Arc::new(job), db.clone(), jobs.chain_validation.interval());
        }
        if jobs.mempool_sync.enabled {
            let job = MempoolSync::new(
                self.pipeline.clone(),
                Duration::from_secs(jobs.mempool_retention_secs),
                Duration::from_secs(jobs.mempool_cooldown_secs),
            );
            runner.add(Arc::new(job), db.clone(), jobs.mempool_sync.interval());
        }
        if jobs.claim_trie_sync.enabled {
            let job = ClaimTrieSync::new(self.pipeline.clone());
            runner.add(Arc::new(job), db.clone(), jobs.claim_trie_sync.interval());
        }
        if jobs.certificate_sync.enabled {
            let job = CertificateSync::new(self.pipeline.clone(), jobs.certificate_batch);
            runner.add(Arc::new(job), db, jobs.certificate_sync.interval());
        }
        runner
    }

    /// Follow the chain until shutdown. A fatal integrity error stops the
    /// daemon and is returned; anything else is logged and retried on the
    /// next tick.
    pub async fn run(self) -> Result<()> {
        info!("Starting claim indexer ({})", self.pipeline.network());
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let runner = self.build_jobs();
        info!("{} reconciliation jobs enabled", runner.len());
        let job_handles = runner.spawn();

        let mut ticker = interval(self.poll_interval);
        let result = loop {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                    break Ok(());
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    match self.catch_up().await {
                        Ok(0) => {}
                        Ok(indexed) => info!("Indexed {} blocks", indexed),
                        Err(e) if e.is_fatal() => {
                            error!("Halting: {}", e);
                            break Err(e);
                        }
                        Err(e) => warn!("Catch-up interrupted: {}", e),
                    }
                }
            }
        };

        for handle in job_handles {
            handle.abort();
        }
        self.pipeline.db().close().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rpc_core::MemoryChain;

    use crate::testing::{coinbase, pipeline, test_db};

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.daemon.poll_interval_secs = 1;
        for schedule in [
            &mut config.jobs.chain_sync,
            &mut config.jobs.chain_validation,
            &mut config.jobs.mempool_sync,
            &mut config.jobs.claim_trie_sync,
            &mut config.jobs.certificate_sync,
        ] {
            schedule.enabled = false;
        }
        config
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_catch_up_from_start_height() {
        let (_dir, db) = test_db().await;
        let chain = Arc::new(MemoryChain::new());
        for i in 0..5 {
            chain.mine_block(vec![coinbase(&format!("cb{}", i), 50.0, 1)]);
        }
        let mut config = quiet_config();
        config.daemon.start_height = 2;
        let daemon = Daemon::with_pipeline(pipeline(&chain, &db), &config);

        assert_eq!(daemon.catch_up().await.unwrap(), 3);
        assert!(db.blocks().get_by_height(1).await.unwrap().is_none());
        assert_eq!(db.blocks().max_height().await.unwrap(), Some(4));
        assert_eq!(daemon.catch_up().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_stops_on_shutdown() {
        let (_dir, db) = test_db().await;
        let chain = Arc::new(MemoryChain::new());
        chain.mine_block(vec![coinbase("cb0", 50.0, 1)]);
        let daemon = Daemon::with_pipeline(pipeline(&chain, &db), &quiet_config());
        let shutdown = daemon.shutdown_handle();
        let reader = db.clone();

        let handle = tokio::spawn(daemon.run());
        while reader.blocks().max_height().await.unwrap().is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
