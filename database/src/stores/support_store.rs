use sqlx::SqlitePool;

use crate::models::SupportRow;
use crate::DbResult;

pub struct SupportStore {
    pool: SqlitePool,
}

impl SupportStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a support. An existing row keeps its bid state.
    pub async fn put(&self, support: &SupportRow) -> DbResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO supports (transaction_hash, vout, supported_claim_id, support_amount, bid_state)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(transaction_hash, vout) DO UPDATE SET
                supported_claim_id = excluded.supported_claim_id,
                support_amount = excluded.support_amount
            RETURNING id
            "#,
        )
        .bind(&support.transaction_hash)
        .bind(support.vout)
        .bind(&support.supported_claim_id)
        .bind(support.support_amount)
        .bind(&support.bid_state)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get(&self, transaction_hash: &str, vout: i64) -> DbResult<Option<SupportRow>> {
        let support = sqlx::query_as::<_, SupportRow>("SELECT * FROM supports WHERE transaction_hash = ? AND vout = ?")
            .bind(transaction_hash)
            .bind(vout)
            .fetch_optional(&self.pool)
            .await?;
        Ok(support)
    }

    pub async fn for_claim(&self, claim_id: &str) -> DbResult<Vec<SupportRow>> {
        let supports = sqlx::query_as::<_, SupportRow>("SELECT * FROM supports WHERE supported_claim_id = ? ORDER BY id")
            .bind(claim_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(supports)
    }

    pub async fn mark_spent_at(&self, transaction_hash: &str, vout: i64) -> DbResult<u64> {
        let result = sqlx::query("UPDATE supports SET bid_state = 'Spent' WHERE transaction_hash = ? AND vout = ?")
            .bind(transaction_hash)
            .bind(vout)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn reopen_at(&self, transaction_hash: &str, vout: i64) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE supports SET bid_state = 'Accepted' WHERE transaction_hash = ? AND vout = ? AND bid_state = 'Spent'",
        )
        .bind(transaction_hash)
        .bind(vout)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
