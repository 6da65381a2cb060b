use sqlx::SqlitePool;

use crate::models::{now_ts, AbnormalClaimRow};
use crate::DbResult;

/// Claim outputs whose payload no known schema could decode
pub struct AbnormalClaimStore {
    pool: SqlitePool,
}

impl AbnormalClaimStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn put(&self, claim: &AbnormalClaimRow) -> DbResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO abnormal_claims (
                transaction_hash, vout, name, claim_id, is_update, value_as_hex, output_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(transaction_hash, vout) DO UPDATE SET
                name = excluded.name,
                claim_id = excluded.claim_id,
                is_update = excluded.is_update,
                value_as_hex = excluded.value_as_hex,
                output_id = excluded.output_id
            RETURNING id
            "#,
        )
        .bind(&claim.transaction_hash)
        .bind(claim.vout)
        .bind(&claim.name)
        .bind(&claim.claim_id)
        .bind(claim.is_update)
        .bind(&claim.value_as_hex)
        .bind(claim.output_id)
        .bind(now_ts())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get(&self, transaction_hash: &str, vout: i64) -> DbResult<Option<AbnormalClaimRow>> {
        let claim = sqlx::query_as::<_, AbnormalClaimRow>(
            "SELECT * FROM abnormal_claims WHERE transaction_hash = ? AND vout = ?",
        )
        .bind(transaction_hash)
        .bind(vout)
        .fetch_optional(&self.pool)
        .await?;
        Ok(claim)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM abnormal_claims")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
