use sqlx::SqlitePool;

use crate::models::InputRow;
use crate::DbResult;

pub struct InputStore {
    pool: SqlitePool,
}

impl InputStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn put(&self, input: &InputRow) -> DbResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO inputs (
                transaction_id, transaction_hash, is_coinbase, prevout_hash, prevout_n,
                input_address_id, coinbase, script_sig_hex, sequence, value, vin
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(transaction_hash, is_coinbase, prevout_hash, prevout_n) DO UPDATE SET
                transaction_id = excluded.transaction_id,
                input_address_id = excluded.input_address_id,
                coinbase = excluded.coinbase,
                script_sig_hex = excluded.script_sig_hex,
                sequence = excluded.sequence,
                value = excluded.value,
                vin = excluded.vin
            RETURNING id
            "#,
        )
        .bind(input.transaction_id)
        .bind(&input.transaction_hash)
        .bind(input.is_coinbase)
        .bind(&input.prevout_hash)
        .bind(input.prevout_n)
        .bind(input.input_address_id)
        .bind(&input.coinbase)
        .bind(&input.script_sig_hex)
        .bind(input.sequence)
        .bind(input.value)
        .bind(input.vin)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn for_transaction(&self, transaction_hash: &str) -> DbResult<Vec<InputRow>> {
        let inputs = sqlx::query_as::<_, InputRow>("SELECT * FROM inputs WHERE transaction_hash = ? ORDER BY vin")
            .bind(transaction_hash)
            .fetch_all(&self.pool)
            .await?;
        Ok(inputs)
    }

    pub async fn count_for_transaction(&self, transaction_hash: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM inputs WHERE transaction_hash = ?")
            .bind(transaction_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
