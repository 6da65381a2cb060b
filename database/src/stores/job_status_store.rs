use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::models::{now_ts, JobStatusRow};
use crate::DbResult;

/// Per-job status and opaque state blob
pub struct JobStatusStore {
    pool: SqlitePool,
}

impl JobStatusStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, job_name: &str) -> DbResult<Option<JobStatusRow>> {
        let row = sqlx::query_as::<_, JobStatusRow>("SELECT * FROM job_status WHERE job_name = ?")
            .bind(job_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Decode the stored state of `job_name`, `None` when the job never saved any
    pub async fn load_state<T: DeserializeOwned>(&self, job_name: &str) -> DbResult<Option<T>> {
        match self.get(job_name).await?.and_then(|row| row.state) {
            Some(state) => Ok(Some(serde_json::from_str(&state)?)),
            None => Ok(None),
        }
    }

    /// Record the outcome of a run, stamping `last_sync` with the current time
    pub async fn save<T: Serialize>(
        &self,
        job_name: &str,
        is_success: bool,
        state: Option<&T>,
        error_message: Option<String>,
    ) -> DbResult<()> {
        let state = state.map(serde_json::to_string).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO job_status (job_name, last_sync, is_success, state, error_message)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(job_name) DO UPDATE SET
                last_sync = excluded.last_sync,
                is_success = excluded.is_success,
                state = COALESCE(excluded.state, job_status.state),
                error_message = excluded.error_message
            "#,
        )
        .bind(job_name)
        .bind(now_ts())
        .bind(is_success)
        .bind(state)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
