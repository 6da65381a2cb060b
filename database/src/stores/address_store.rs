use std::sync::Arc;

use sqlx::SqlitePool;

use crate::cache::AddressCache;
use crate::models::{AddressRow, TransactionAddressRow};
use crate::DbResult;

/// Addresses and their per-transaction credit/debit links
pub struct AddressStore {
    pool: SqlitePool,
    cache: Arc<AddressCache>,
}

impl AddressStore {
    pub fn new(pool: SqlitePool, cache: Arc<AddressCache>) -> Self {
        Self { pool, cache }
    }

    /// Row id for `address`, creating the row when it is new
    pub async fn find_or_create(&self, address: &str, first_seen: Option<i64>) -> DbResult<i64> {
        if let Some(id) = self.cache.get(&address.to_string()) {
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO addresses (address, first_seen) VALUES (?, ?)
            ON CONFLICT(address) DO UPDATE SET
                first_seen = COALESCE(MIN(addresses.first_seen, excluded.first_seen), addresses.first_seen, excluded.first_seen)
            RETURNING id
            "#,
        )
        .bind(address)
        .bind(first_seen)
        .fetch_one(&self.pool)
        .await?;

        self.cache.insert(address.to_string(), id);
        Ok(id)
    }

    pub async fn get(&self, address: &str) -> DbResult<Option<AddressRow>> {
        let row = sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE address = ?")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<AddressRow>> {
        let row = sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Write the totals for one (transaction, address) pair, replacing any previous totals
    pub async fn put_transaction_address(&self, link: &TransactionAddressRow) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transaction_addresses (
                transaction_id, address_id, credit_amount, debit_amount, latest_transaction_time
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(transaction_id, address_id) DO UPDATE SET
                credit_amount = excluded.credit_amount,
                debit_amount = excluded.debit_amount,
                latest_transaction_time = excluded.latest_transaction_time
            "#,
        )
        .bind(link.transaction_id)
        .bind(link.address_id)
        .bind(link.credit_amount)
        .bind(link.debit_amount)
        .bind(link.latest_transaction_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn transaction_addresses(&self, transaction_id: i64) -> DbResult<Vec<TransactionAddressRow>> {
        let rows = sqlx::query_as::<_, TransactionAddressRow>(
            "SELECT * FROM transaction_addresses WHERE transaction_id = ? ORDER BY address_id",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Recompute the balance of the given addresses from their transaction links
    pub async fn resync_balances(&self, address_ids: &[i64]) -> DbResult<()> {
        for id in address_ids {
            sqlx::query(
                r#"
                UPDATE addresses SET balance = (
                    SELECT COALESCE(SUM(credit_amount - debit_amount), 0)
                    FROM transaction_addresses WHERE address_id = addresses.id
                ) WHERE id = ?
                "#,
            )
            .bind(id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Recompute every balance; returns the number of addresses whose balance changed
    pub async fn resync_all_balances(&self) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE addresses SET balance = (
                SELECT COALESCE(SUM(credit_amount - debit_amount), 0)
                FROM transaction_addresses WHERE address_id = addresses.id
            )
            WHERE balance <> (
                SELECT COALESCE(SUM(credit_amount - debit_amount), 0)
                FROM transaction_addresses WHERE address_id = addresses.id
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
