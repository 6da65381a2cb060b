use sqlx::SqlitePool;

use crate::models::OutputRow;
use crate::DbResult;

pub struct OutputStore {
    pool: SqlitePool,
}

impl OutputStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite by `(transaction_hash, vout)`. Spent state is left
    /// alone on conflict so replaying the creating transaction cannot un-spend.
    pub async fn put(&self, output: &OutputRow) -> DbResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO outputs (
                transaction_id, transaction_hash, vout, value, script_type, script_hex,
                address_list, is_spent, spent_by_input_id, claim_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(transaction_hash, vout) DO UPDATE SET
                transaction_id = excluded.transaction_id,
                value = excluded.value,
                script_type = excluded.script_type,
                script_hex = excluded.script_hex,
                address_list = excluded.address_list,
                claim_id = excluded.claim_id
            RETURNING id
            "#,
        )
        .bind(output.transaction_id)
        .bind(&output.transaction_hash)
        .bind(output.vout)
        .bind(output.value)
        .bind(&output.script_type)
        .bind(&output.script_hex)
        .bind(&output.address_list)
        .bind(output.is_spent)
        .bind(output.spent_by_input_id)
        .bind(&output.claim_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get(&self, transaction_hash: &str, vout: i64) -> DbResult<Option<OutputRow>> {
        let output = sqlx::query_as::<_, OutputRow>("SELECT * FROM outputs WHERE transaction_hash = ? AND vout = ?")
            .bind(transaction_hash)
            .bind(vout)
            .fetch_optional(&self.pool)
            .await?;
        Ok(output)
    }

    pub async fn for_transaction(&self, transaction_hash: &str) -> DbResult<Vec<OutputRow>> {
        let outputs = sqlx::query_as::<_, OutputRow>("SELECT * FROM outputs WHERE transaction_hash = ? ORDER BY vout")
            .bind(transaction_hash)
            .fetch_all(&self.pool)
            .await?;
        Ok(outputs)
    }

    pub async fn count_for_transaction(&self, transaction_hash: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM outputs WHERE transaction_hash = ?")
            .bind(transaction_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn mark_spent(&self, output_id: i64, input_id: i64) -> DbResult<()> {
        sqlx::query("UPDATE outputs SET is_spent = TRUE, spent_by_input_id = ? WHERE id = ?")
            .bind(input_id)
            .bind(output_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Sum of unspent output values, in base units
    pub async fn unspent_total(&self) -> DbResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(value), 0) FROM outputs WHERE is_spent = FALSE")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}
