pub mod abnormal_claim_store;
pub mod address_store;
pub mod block_store;
pub mod claim_store;
pub mod input_store;
pub mod job_status_store;
pub mod output_store;
pub mod support_store;
pub mod transaction_store;

pub use abnormal_claim_store::AbnormalClaimStore;
pub use address_store::AddressStore;
pub use block_store::BlockStore;
pub use claim_store::ClaimStore;
pub use input_store::InputStore;
pub use job_status_store::JobStatusStore;
pub use output_store::OutputStore;
pub use support_store::SupportStore;
pub use transaction_store::{DeletedTransaction, TransactionStore};

use sqlx::SqlitePool;

use crate::models::FieldValue;
use crate::DbResult;

/// `UPDATE <table> SET <col> = ?, ... WHERE id = ?` touching only the given columns.
/// Column names are compile-time strings owned by the callers.
pub(crate) async fn update_fields(
    pool: &SqlitePool,
    table: &'static str,
    id: i64,
    fields: &[(&'static str, FieldValue)],
) -> DbResult<u64> {
    if fields.is_empty() {
        return Ok(0);
    }

    let assignments: Vec<String> = fields.iter().map(|(column, _)| format!("{} = ?", column)).collect();
    let sql = format!("UPDATE {} SET {} WHERE id = ?", table, assignments.join(", "));

    let mut query = sqlx::query(&sql);
    for (_, value) in fields {
        query = match value {
            FieldValue::Int(v) => query.bind(*v),
            FieldValue::Real(v) => query.bind(*v),
            FieldValue::Text(v) => query.bind(v.clone()),
        };
    }
    let result = query.bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}
