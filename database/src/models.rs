//! Row types, one per table

use serde::{Deserialize, Serialize};

/// Hash of the sentinel block that parents every unconfirmed transaction
pub const MEMPOOL_BLOCK_HASH: &str = "MEMPOOL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlockRow {
    pub id: i64,
    pub height: i64,
    pub hash: String,
    pub confirmations: i64,
    pub time: i64,
    pub bits: String,
    pub size: i64,
    pub chainwork: String,
    pub difficulty: f64,
    pub merkle_root: String,
    pub name_claim_root: String,
    pub nonce: i64,
    pub version: i64,
    pub previous_block_hash: Option<String>,
    pub next_block_hash: Option<String>,
    /// Comma separated transaction ids in block order
    pub tx_hashes: String,
    pub created_at: i64,
}

impl BlockRow {
    pub fn transaction_hashes(&self) -> Vec<&str> {
        self.tx_hashes.split(',').filter(|h| !h.is_empty()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub hash: String,
    pub block_hash: Option<String>,
    pub version: i64,
    pub lock_time: i64,
    pub raw: String,
    pub input_count: i64,
    pub output_count: i64,
    pub value: i64,
    pub fee: i64,
    pub transaction_time: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutputRow {
    pub id: i64,
    pub transaction_id: i64,
    pub transaction_hash: String,
    pub vout: i64,
    pub value: i64,
    pub script_type: String,
    pub script_hex: String,
    /// JSON array of addresses
    pub address_list: String,
    pub is_spent: bool,
    pub spent_by_input_id: Option<i64>,
    pub claim_id: Option<String>,
}

impl OutputRow {
    pub fn addresses(&self) -> Vec<String> {
        serde_json::from_str(&self.address_list).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InputRow {
    pub id: i64,
    pub transaction_id: i64,
    pub transaction_hash: String,
    pub is_coinbase: bool,
    pub prevout_hash: String,
    pub prevout_n: i64,
    pub input_address_id: Option<i64>,
    pub coinbase: Option<String>,
    pub script_sig_hex: String,
    pub sequence: i64,
    pub value: i64,
    pub vin: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AddressRow {
    pub id: i64,
    pub address: String,
    pub first_seen: Option<i64>,
    pub balance: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionAddressRow {
    pub transaction_id: i64,
    pub address_id: i64,
    pub credit_amount: i64,
    pub debit_amount: i64,
    pub latest_transaction_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClaimRow {
    pub id: i64,
    pub claim_id: String,
    pub name: String,
    pub transaction_hash: String,
    pub vout: i64,
    pub height: i64,
    pub valid_at_height: i64,
    pub effective_amount: i64,
    pub amount: i64,
    pub bid_state: String,
    pub claim_type: String,
    pub claim_address: String,
    pub publisher_id: Option<String>,
    pub publisher_sig: Option<String>,
    /// Channel public key (hex) for channel claims
    pub certificate: Option<String>,
    pub is_cert_valid: bool,
    pub is_cert_processed: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub license: Option<String>,
    pub license_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub preview: Option<String>,
    pub is_nsfw: bool,
    pub fee_currency: Option<String>,
    pub fee: f64,
    pub fee_address: Option<String>,
    pub sd_hash: Option<String>,
    pub content_type: Option<String>,
    pub version: String,
    pub value_as_hex: String,
    pub value_as_json: Option<String>,
    pub transaction_time: Option<i64>,
    pub modified_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupportRow {
    pub id: i64,
    pub transaction_hash: String,
    pub vout: i64,
    pub supported_claim_id: String,
    pub support_amount: i64,
    pub bid_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AbnormalClaimRow {
    pub id: i64,
    pub transaction_hash: String,
    pub vout: i64,
    pub name: String,
    pub claim_id: String,
    pub is_update: bool,
    pub value_as_hex: String,
    pub output_id: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobStatusRow {
    pub job_name: String,
    pub last_sync: i64,
    pub is_success: bool,
    /// Job-defined JSON blob
    pub state: Option<String>,
    pub error_message: Option<String>,
}

/// Value for a single-column update
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Real(f64),
    Text(Option<String>),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(Some(v))
    }
}

impl From<Option<String>> for FieldValue {
    fn from(v: Option<String>) -> Self {
        FieldValue::Text(v)
    }
}

pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
