use sqlx::SqlitePool;

use crate::models::{now_ts, ClaimRow};
use crate::DbResult;

const SPENT: &str = "Spent";
const ACCEPTED: &str = "Accepted";
const ACTIVE: &str = "Active";
const CONTROLLING: &str = "Controlling";

pub struct ClaimStore {
    pool: SqlitePool,
}

impl ClaimStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, claim_id: &str) -> DbResult<Option<ClaimRow>> {
        let claim = sqlx::query_as::<_, ClaimRow>("SELECT * FROM claims WHERE claim_id = ?")
            .bind(claim_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(claim)
    }

    pub async fn get_by_outpoint(&self, transaction_hash: &str, vout: i64) -> DbResult<Option<ClaimRow>> {
        let claim = sqlx::query_as::<_, ClaimRow>("SELECT * FROM claims WHERE transaction_hash = ? AND vout = ?")
            .bind(transaction_hash)
            .bind(vout)
            .fetch_optional(&self.pool)
            .await?;
        Ok(claim)
    }

    /// Insert or overwrite every column by claim id. `modified_at` is stamped here.
    pub async fn put(&self, claim: &ClaimRow) -> DbResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO claims (
                claim_id, name, transaction_hash, vout, height, valid_at_height,
                effective_amount, amount, bid_state, claim_type, claim_address,
                publisher_id, publisher_sig, certificate, is_cert_valid, is_cert_processed,
                title, description, author, language, license, license_url, thumbnail_url,
                preview, is_nsfw, fee_currency, fee, fee_address, sd_hash, content_type,
                version, value_as_hex, value_as_json, transaction_time, modified_at
            ) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            )
            ON CONFLICT(claim_id) DO UPDATE SET
                name = excluded.name,
                transaction_hash = excluded.transaction_hash,
                vout = excluded.vout,
                height = excluded.height,
                valid_at_height = excluded.valid_at_height,
                effective_amount = excluded.effective_amount,
                amount = excluded.amount,
                bid_state = excluded.bid_state,
                claim_type = excluded.claim_type,
                claim_address = excluded.claim_address,
                publisher_id = excluded.publisher_id,
                publisher_sig = excluded.publisher_sig,
                certificate = excluded.certificate,
                is_cert_valid = excluded.is_cert_valid,
                is_cert_processed = excluded.is_cert_processed,
                title = excluded.title,
                description = excluded.description,
                author = excluded.author,
                language = excluded.language,
                license = excluded.license,
                license_url = excluded.license_url,
                thumbnail_url = excluded.thumbnail_url,
                preview = excluded.preview,
                is_nsfw = excluded.is_nsfw,
                fee_currency = excluded.fee_currency,
                fee = excluded.fee,
                fee_address = excluded.fee_address,
                sd_hash = excluded.sd_hash,
                content_type = excluded.content_type,
                version = excluded.version,
                value_as_hex = excluded.value_as_hex,
                value_as_json = excluded.value_as_json,
                transaction_time = excluded.transaction_time,
                modified_at = excluded.modified_at
            RETURNING id
            "#,
        )
        .bind(&claim.claim_id)
        .bind(&claim.name)
        .bind(&claim.transaction_hash)
        .bind(claim.vout)
        .bind(claim.height)
        .bind(claim.valid_at_height)
        .bind(claim.effective_amount)
        .bind(claim.amount)
        .bind(&claim.bid_state)
        .bind(&claim.claim_type)
        .bind(&claim.claim_address)
        .bind(&claim.publisher_id)
        .bind(&claim.publisher_sig)
        .bind(&claim.certificate)
        .bind(claim.is_cert_valid)
        .bind(claim.is_cert_processed)
        .bind(&claim.title)
        .bind(&claim.description)
        .bind(&claim.author)
        .bind(&claim.language)
        .bind(&claim.license)
        .bind(&claim.license_url)
        .bind(&claim.thumbnail_url)
        .bind(&claim.preview)
        .bind(claim.is_nsfw)
        .bind(&claim.fee_currency)
        .bind(claim.fee)
        .bind(&claim.fee_address)
        .bind(&claim.sd_hash)
        .bind(&claim.content_type)
        .bind(&claim.version)
        .bind(&claim.value_as_hex)
        .bind(&claim.value_as_json)
        .bind(claim.transaction_time)
        .bind(now_ts())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn delete(&self, claim_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM claims WHERE claim_id = ?")
            .bind(claim_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Mark the claim whose current outpoint is `transaction_hash:vout` as spent
    pub async fn mark_spent_at(&self, transaction_hash: &str, vout: i64) -> DbResult<u64> {
        let result = sqlx::query("UPDATE claims SET bid_state = ?, modified_at = ? WHERE transaction_hash = ? AND vout = ?")
            .bind(SPENT)
            .bind(now_ts())
            .bind(transaction_hash)
            .bind(vout)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Undo [`mark_spent_at`](Self::mark_spent_at) after the spending transaction disappears
    pub async fn reopen_at(&self, transaction_hash: &str, vout: i64) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE claims SET bid_state = ?, modified_at = ? WHERE transaction_hash = ? AND vout = ? AND bid_state = ?",
        )
        .bind(ACCEPTED)
        .bind(now_ts())
        .bind(transaction_hash)
        .bind(vout)
        .bind(SPENT)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_trie_fields(
        &self,
        claim_id: &str,
        valid_at_height: i64,
        effective_amount: i64,
        bid_state: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE claims SET valid_at_height = ?, effective_amount = ?, bid_state = ?, modified_at = ?
            WHERE claim_id = ?
            "#,
        )
        .bind(valid_at_height)
        .bind(effective_amount)
        .bind(bid_state)
        .bind(now_ts())
        .bind(claim_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Make `claim_id` the only controlling claim of `name`; demoted claims fall back to Active
    pub async fn set_controlling(&self, name: &str, claim_id: Option<&str>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = now_ts();
        sqlx::query(
            "UPDATE claims SET bid_state = ?, modified_at = ? WHERE name = ? AND bid_state = ? AND claim_id <> COALESCE(?, '')",
        )
        .bind(ACTIVE)
        .bind(now)
        .bind(name)
        .bind(CONTROLLING)
        .bind(claim_id)
        .execute(&mut *tx)
        .await?;
        if let Some(claim_id) = claim_id {
            sqlx::query("UPDATE claims SET bid_state = ?, modified_at = ? WHERE claim_id = ? AND bid_state <> ?")
                .bind(CONTROLLING)
                .bind(now)
                .bind(claim_id)
                .bind(CONTROLLING)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn by_name(&self, name: &str) -> DbResult<Vec<ClaimRow>> {
        let claims = sqlx::query_as::<_, ClaimRow>("SELECT * FROM claims WHERE name = ? ORDER BY id")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        Ok(claims)
    }

    /// Distinct names with a claim modified at or after `since` (unix seconds)
    pub async fn names_modified_since(&self, since: i64) -> DbResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT name FROM claims WHERE modified_at >= ? ORDER BY name",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Names with an accepted claim whose activation height has been reached
    pub async fn names_activating_by(&self, height: i64) -> DbResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT name FROM claims WHERE bid_state = ? AND valid_at_height <= ? ORDER BY name",
        )
        .bind(ACCEPTED)
        .bind(height)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Names with a live claim created between `from` and `to` inclusive
    pub async fn names_with_live_claims_between(&self, from: i64, to: i64) -> DbResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT name FROM claims
            WHERE bid_state IN (?, ?, ?) AND height BETWEEN ? AND ?
            ORDER BY name
            "#,
        )
        .bind(ACCEPTED)
        .bind(ACTIVE)
        .bind(CONTROLLING)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Channel-signed claims with row id above `after_id` whose signature has not been checked yet
    pub async fn pending_certificates(&self, after_id: i64, limit: i64) -> DbResult<Vec<ClaimRow>> {
        let claims = sqlx::query_as::<_, ClaimRow>(
            r#"
            SELECT * FROM claims
            WHERE publisher_id IS NOT NULL AND is_cert_processed = FALSE AND id > ?
            ORDER BY id LIMIT ?
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(claims)
    }

    pub async fn set_certificate_result(&self, claim_id: &str, is_valid: bool) -> DbResult<()> {
        sqlx::query("UPDATE claims SET is_cert_valid = ?, is_cert_processed = TRUE, modified_at = ? WHERE claim_id = ?")
            .bind(is_valid)
            .bind(now_ts())
            .bind(claim_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Hex public key of a channel claim
    pub async fn channel_key(&self, channel_claim_id: &str) -> DbResult<Option<String>> {
        let key = sqlx::query_scalar::<_, Option<String>>(
            "SELECT certificate FROM claims WHERE claim_id = ? AND claim_type = 'channel'",
        )
        .bind(channel_claim_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key.flatten())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM claims")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
