use sqlx::SqlitePool;

use crate::models::{now_ts, OutputRow, TransactionRow, MEMPOOL_BLOCK_HASH};
use crate::DbResult;

/// What a transaction deletion released
#[derive(Debug, Default)]
pub struct DeletedTransaction {
    /// Outputs of other transactions that the deleted inputs had spent
    pub unspent_outputs: Vec<OutputRow>,
    /// Addresses whose balance needs recomputing
    pub address_ids: Vec<i64>,
}

pub struct TransactionStore {
    pool: SqlitePool,
}

impl TransactionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_hash(&self, hash: &str) -> DbResult<Option<TransactionRow>> {
        let tx = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tx)
    }

    /// Insert or overwrite by hash; a mempool row is re-parented to whatever
    /// block the new row names. Returns the row id.
    pub async fn put(&self, tx: &TransactionRow) -> DbResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO transactions (
                hash, block_hash, version, lock_time, raw, input_count, output_count,
                value, fee, transaction_time, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO UPDATE SET
                block_hash = excluded.block_hash,
                version = excluded.version,
                lock_time = excluded.lock_time,
                raw = excluded.raw,
                input_count = excluded.input_count,
                output_count = excluded.output_count,
                value = excluded.value,
                fee = excluded.fee,
                transaction_time = excluded.transaction_time
            RETURNING id
            "#,
        )
        .bind(&tx.hash)
        .bind(&tx.block_hash)
        .bind(tx.version)
        .bind(tx.lock_time)
        .bind(&tx.raw)
        .bind(tx.input_count)
        .bind(tx.output_count)
        .bind(tx.value)
        .bind(tx.fee)
        .bind(tx.transaction_time)
        .bind(now_ts())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn set_fee(&self, id: i64, fee: i64) -> DbResult<()> {
        sqlx::query("UPDATE transactions SET fee = ? WHERE id = ?")
            .bind(fee)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn hashes_for_block(&self, block_hash: &str) -> DbResult<Vec<String>> {
        let hashes = sqlx::query_scalar::<_, String>("SELECT hash FROM transactions WHERE block_hash = ? ORDER BY id")
            .bind(block_hash)
            .fetch_all(&self.pool)
            .await?;
        Ok(hashes)
    }

    pub async fn mempool(&self) -> DbResult<Vec<TransactionRow>> {
        let txs = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE block_hash = ? ORDER BY id")
            .bind(MEMPOOL_BLOCK_HASH)
            .fetch_all(&self.pool)
            .await?;
        Ok(txs)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Remove a transaction with its inputs, outputs, address links and its
    /// support and abnormal claim rows. Outputs its inputs had spent become
    /// unspent again. Claim rows stay: the caller decides which were created
    /// here and which were only moved.
    pub async fn delete(&self, tx: &TransactionRow) -> DbResult<DeletedTransaction> {
        let mut db_tx = self.pool.begin().await?;

        let unspent_outputs = sqlx::query_as::<_, OutputRow>(
            r#"
            UPDATE outputs SET is_spent = FALSE, spent_by_input_id = NULL
            WHERE spent_by_input_id IN (SELECT id FROM inputs WHERE transaction_id = ?)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .fetch_all(&mut *db_tx)
        .await?;

        let address_ids = sqlx::query_scalar::<_, i64>("SELECT address_id FROM transaction_addresses WHERE transaction_id = ?")
            .bind(tx.id)
            .fetch_all(&mut *db_tx)
            .await?;

        sqlx::query("DELETE FROM transaction_addresses WHERE transaction_id = ?")
            .bind(tx.id)
            .execute(&mut *db_tx)
            .await?;
        sqlx::query("DELETE FROM inputs WHERE transaction_id = ?")
            .bind(tx.id)
            .execute(&mut *db_tx)
            .await?;
        sqlx::query("DELETE FROM outputs WHERE transaction_id = ?")
            .bind(tx.id)
            .execute(&mut *db_tx)
            .await?;
        for table in ["supports", "abnormal_claims"] {
            sqlx::query(&format!("DELETE FROM {} WHERE transaction_hash = ?", table))
                .bind(&tx.hash)
                .execute(&mut *db_tx)
                .await?;
        }
        sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(tx.id)
            .execute(&mut *db_tx)
            .await?;

        db_tx.commit().await?;
        Ok(DeletedTransaction { unspent_outputs, address_ids })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_db;
    use crate::models::{ClaimRow, InputRow, OutputRow, SupportRow, TransactionRow, MEMPOOL_BLOCK_HASH};

    fn tx(hash: &str, block: &str) -> TransactionRow {
        TransactionRow {
            hash: hash.into(),
            block_hash: Some(block.into()),
            version: 1,
            input_count: 1,
            output_count: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mempool_row_reparented() {
        let (_dir, db) = test_db().await;
        let store = db.transactions();
        let id = store.put(&tx("t1", MEMPOOL_BLOCK_HASH)).await.unwrap();
        assert_eq!(store.mempool().await.unwrap().len(), 1);

        assert_eq!(store.put(&tx("t1", "b1")).await.unwrap(), id);
        assert!(store.mempool().await.unwrap().is_empty());
        assert_eq!(store.hashes_for_block("b1").await.unwrap(), vec!["t1".to_string()]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_unspends_outputs() {
        let (_dir, db) = test_db().await;
        let funding_id = db.transactions().put(&tx("fund", "b1")).await.unwrap();
        let output_id = db
            .outputs()
            .put(&OutputRow {
                transaction_id: funding_id,
                transaction_hash: "fund".into(),
                vout: 0,
                value: 10,
                address_list: "[]".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let spender = db.transactions().put(&tx("spend", MEMPOOL_BLOCK_HASH)).await.unwrap();
        let input_id = db
            .inputs()
            .put(&InputRow {
                transaction_id: spender,
                transaction_hash: "spend".into(),
                prevout_hash: "fund".into(),
                prevout_n: 0,
                ..Default::default()
            })
            .await
            .unwrap();
        db.outputs().mark_spent(output_id, input_id).await.unwrap();

        let row = db.transactions().get_by_hash("spend").await.unwrap().unwrap();
        let deleted = db.transactions().delete(&row).await.unwrap();
        assert_eq!(deleted.unspent_outputs.len(), 1);
        assert_eq!(deleted.unspent_outputs[0].id, output_id);

        let output = db.outputs().get("fund", 0).await.unwrap().unwrap();
        assert!(!output.is_spent);
        assert!(output.spent_by_input_id.is_none());
        assert!(db.transactions().get_by_hash("spend").await.unwrap().is_none());
        assert!(db.inputs().for_transaction("spend").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_leaves_claims_to_the_caller() {
        let (_dir, db) = test_db().await;
        let row_id = db.transactions().put(&tx("update", MEMPOOL_BLOCK_HASH)).await.unwrap();
        db.claims()
            .put(&ClaimRow {
                claim_id: "c1".into(),
                name: "name".into(),
                transaction_hash: "update".into(),
                bid_state: "Accepted".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        db.supports()
            .put(&SupportRow {
                transaction_hash: "update".into(),
                vout: 1,
                supported_claim_id: "c1".into(),
                bid_state: "Accepted".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let row = db.transactions().get_by_hash("update").await.unwrap().unwrap();
        assert_eq!(row.id, row_id);
        db.transactions().delete(&row).await.unwrap();
        assert!(db.claims().get("c1").await.unwrap().is_some());
        assert!(db.supports().get("update", 1).await.unwrap().is_none());
    }
}
