//! Error types for the indexer

use thiserror::Error;

use claim_hashes::HashParseError;
use claims_core::ScriptError;
use database::DbError;
use rpc_core::RpcError;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Invalid hash: {0}")]
    Hash(#[from] HashParseError),

    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A regular input references an output the index never stored
    #[error("input {vin} of {spender} spends {txid}:{vout}, which is not indexed")]
    MissingOutput { txid: String, vout: u32, spender: String, vin: usize },

    /// An output carries value but no address could be derived from its script
    #[error("no address for output {txid}:{vout} ({script_type})")]
    UnresolvedAddress { txid: String, vout: u32, script_type: String },

    #[error("block {height} requested while the index ends at {max_indexed}")]
    HeightOutOfOrder { height: u64, max_indexed: i64 },

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { operation: String, attempts: u32, last_error: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexerError {
    /// Integrity violations after which indexing must stop rather than write
    /// inconsistent balances or claim ownership
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IndexerError::MissingOutput { .. }
                | IndexerError::UnresolvedAddress { .. }
                | IndexerError::HeightOutOfOrder { .. }
                | IndexerError::RetriesExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let missing = IndexerError::MissingOutput { txid: "aa".into(), vout: 1, spender: "bb".into(), vin: 0 };
        assert!(missing.is_fatal());
        assert!(IndexerError::HeightOutOfOrder { height: 5, max_indexed: 3 }.is_fatal());
        assert!(!IndexerError::Rpc(RpcError::Network("down".into())).is_fatal());
        assert!(!IndexerError::Config("bad".into()).is_fatal());
    }
}
