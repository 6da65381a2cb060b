use sqlx::SqlitePool;

use crate::models::{now_ts, BlockRow, FieldValue, MEMPOOL_BLOCK_HASH};
use crate::DbResult;

pub struct BlockStore {
    pool: SqlitePool,
}

impl BlockStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_hash(&self, hash: &str) -> DbResult<Option<BlockRow>> {
        let block = sqlx::query_as::<_, BlockRow>("SELECT * FROM blocks WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(block)
    }

    pub async fn get_by_height(&self, height: i64) -> DbResult<Option<BlockRow>> {
        let block = sqlx::query_as::<_, BlockRow>("SELECT * FROM blocks WHERE height = ? AND hash <> ?")
            .bind(height)
            .bind(MEMPOOL_BLOCK_HASH)
            .fetch_optional(&self.pool)
            .await?;
        Ok(block)
    }

    /// Highest indexed canonical height, `None` for an empty index
    pub async fn max_height(&self) -> DbResult<Option<i64>> {
        let height = sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(height) FROM blocks WHERE hash <> ?")
            .bind(MEMPOOL_BLOCK_HASH)
            .fetch_one(&self.pool)
            .await?;
        Ok(height)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM blocks WHERE hash <> ?")
            .bind(MEMPOOL_BLOCK_HASH)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Find the block by hash (or, failing that, by height) and overwrite its
    /// scalar columns; insert it when neither exists. Returns the row id.
    pub async fn put(&self, block: &BlockRow) -> DbResult<i64> {
        let existing = match self.get_by_hash(&block.hash).await? {
            Some(row) => Some(row),
            None => self.get_by_height(block.height).await?,
        };

        if let Some(row) = existing {
            sqlx::query(
                r#"
                UPDATE blocks SET
                    height = ?, hash = ?, confirmations = ?, time = ?, bits = ?, size = ?,
                    chainwork = ?, difficulty = ?, merkle_root = ?, name_claim_root = ?,
                    nonce = ?, version = ?, previous_block_hash = ?, next_block_hash = ?,
                    tx_hashes = ?
                WHERE id = ?
                "#,
            )
            .bind(block.height)
            .bind(&block.hash)
            .bind(block.confirmations)
            .bind(block.time)
            .bind(&block.bits)
            .bind(block.size)
            .bind(&block.chainwork)
            .bind(block.difficulty)
            .bind(&block.merkle_root)
            .bind(&block.name_claim_root)
            .bind(block.nonce)
            .bind(block.version)
            .bind(&block.previous_block_hash)
            .bind(&block.next_block_hash)
            .bind(&block.tx_hashes)
            .bind(row.id)
            .execute(&self.pool)
            .await?;
            return Ok(row.id);
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO blocks (
                height, hash, confirmations, time, bits, size, chainwork, difficulty,
                merkle_root, name_claim_root, nonce, version, previous_block_hash,
                next_block_hash, tx_hashes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(block.height)
        .bind(&block.hash)
        .bind(block.confirmations)
        .bind(block.time)
        .bind(&block.bits)
        .bind(block.size)
        .bind(&block.chainwork)
        .bind(block.difficulty)
        .bind(&block.merkle_root)
        .bind(&block.name_claim_root)
        .bind(block.nonce)
        .bind(block.version)
        .bind(&block.previous_block_hash)
        .bind(&block.next_block_hash)
        .bind(&block.tx_hashes)
        .bind(now_ts())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Id of the sentinel block parenting unconfirmed transactions, created on first use
    pub async fn ensure_mempool_block(&self) -> DbResult<i64> {
        sqlx::query("INSERT OR IGNORE INTO blocks (height, hash, created_at) VALUES (0, ?, ?)")
            .bind(MEMPOOL_BLOCK_HASH)
            .bind(now_ts())
            .execute(&self.pool)
            .await?;
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM blocks WHERE hash = ?")
            .bind(MEMPOOL_BLOCK_HASH)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn set_next_block_hash(&self, height: i64, next_hash: &str) -> DbResult<()> {
        sqlx::query("UPDATE blocks SET next_block_hash = ? WHERE height = ? AND hash <> ?")
            .bind(next_hash)
            .bind(height)
            .bind(MEMPOOL_BLOCK_HASH)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Overwrite only the given columns of one block
    pub async fn update_fields(&self, id: i64, fields: &[(&'static str, FieldValue)]) -> DbResult<u64> {
        super::update_fields(&self.pool, "blocks", id, fields).await
    }
}
