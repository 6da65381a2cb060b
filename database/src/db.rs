use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Executor;

use crate::cache::AddressCache;
use crate::errors::DbResult;
use crate::stores::{
    AbnormalClaimStore, AddressStore, BlockStore, ClaimStore, InputStore, JobStatusStore, OutputStore, SupportStore,
    TransactionStore,
};

const SCHEMA: &str = include_str!("../migrations/001_initial_schema.sql");
const ADDRESS_CACHE_SIZE: usize = 100_000;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    addresses: Arc<AddressCache>,
}

impl Database {
    /// Open (creating if missing) the database file at `path`
    pub async fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        Self::connect_with(options).await
    }

    /// Open from a `sqlite://` URL
    pub async fn connect(url: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> DbResult<Self> {
        let options = options
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Ok(Self { pool, addresses: Arc::new(AddressCache::new(ADDRESS_CACHE_SIZE)) })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create any missing tables and indexes
    pub async fn migrate(&self) -> DbResult<()> {
        self.pool.execute(SCHEMA).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn blocks(&self) -> BlockStore {
        BlockStore::new(self.pool.clone())
    }

    pub fn transactions(&self) -> TransactionStore {
        TransactionStore::new(self.pool.clone())
    }

    pub fn outputs(&self) -> OutputStore {
        OutputStore::new(self.pool.clone())
    }

    pub fn inputs(&self) -> InputStore {
        InputStore::new(self.pool.clone())
    }

    pub fn addresses(&self) -> AddressStore {
        AddressStore::new(self.pool.clone(), self.addresses.clone())
    }

    pub fn claims(&self) -> ClaimStore {
        ClaimStore::new(self.pool.clone())
    }

    pub fn supports(&self) -> SupportStore {
        SupportStore::new(self.pool.clone())
    }

    pub fn abnormal_claims(&self) -> AbnormalClaimStore {
        AbnormalClaimStore::new(self.pool.clone())
    }

    pub fn job_status(&self) -> JobStatusStore {
        JobStatusStore::new(self.pool.clone())
    }
}

#[cfg(test)]
pub(crate) async fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("index.db")).await.unwrap();
    db.migrate().await.unwrap();
    (dir, db)
}
