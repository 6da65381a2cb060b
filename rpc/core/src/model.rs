//! RPC data models and types
//!
//! Field names follow the full node's verbose JSON output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use claim_hashes::Hash;

/// Error code the node returns for unknown blocks and transactions
pub const RPC_NOT_FOUND: i32 = -5;

/// RPC error type
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum RpcError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl RpcError {
    pub fn not_found(what: impl Into<String>) -> Self {
        RpcError::Rpc { code: RPC_NOT_FOUND, message: what.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RpcError::Rpc { code, .. } if *code == RPC_NOT_FOUND)
    }
}

/// Verbose block (`getblock <hash>`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockResponse {
    pub hash: Hash,
    pub height: u64,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub version: i64,
    #[serde(rename = "merkleroot", default)]
    pub merkle_root: String,
    #[serde(rename = "nameclaimroot", default)]
    pub name_claim_root: String,
    #[serde(default)]
    pub tx: Vec<Hash>,
    pub time: i64,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub bits: String,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub chainwork: String,
    #[serde(rename = "previousblockhash", default)]
    pub previous_block_hash: Option<Hash>,
    #[serde(rename = "nextblockhash", default)]
    pub next_block_hash: Option<Hash>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSig {
    #[serde(default)]
    pub asm: String,
    pub hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vin {
    /// Present only on coinbase inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vout: Option<u32>,
    #[serde(rename = "scriptSig", default, skip_serializing_if = "Option::is_none")]
    pub script_sig: Option<ScriptSig>,
    pub sequence: u64,
}

impl Vin {
    pub fn coinbase(data: &[u8]) -> Self {
        Self {
            coinbase: Some(hex::encode(data)),
            txid: None,
            vout: None,
            script_sig: None,
            sequence: u32::MAX as u64,
        }
    }

    pub fn spending(txid: Hash, vout: u32) -> Self {
        Self {
            coinbase: None,
            txid: Some(txid),
            vout: Some(vout),
            script_sig: Some(ScriptSig::default()),
            sequence: u32::MAX as u64,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.coinbase.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub asm: String,
    pub hex: String,
    #[serde(rename = "type", default)]
    pub script_type: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vout {
    /// Coins, as a decimal float
    pub value: f64,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

impl Vout {
    pub fn new(n: u32, value: f64, script: &[u8], script_type: &str, addresses: Vec<String>) -> Self {
        Self {
            value,
            n,
            script_pub_key: ScriptPubKey {
                asm: String::new(),
                hex: hex::encode(script),
                script_type: script_type.to_string(),
                addresses,
            },
        }
    }
}

/// Verbose transaction (`getrawtransaction <txid> 1`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: Hash,
    #[serde(default)]
    pub hex: String,
    #[serde(default)]
    pub version: i64,
    #[serde(rename = "locktime", default)]
    pub lock_time: u64,
    #[serde(default)]
    pub size: u64,
    pub vin: Vec<Vin>,
    pub vout: Vec<Vout>,
    #[serde(rename = "blockhash", default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(rename = "blocktime", default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
}

impl RawTransaction {
    /// Unconfirmed transaction with the given id; the node fills in the rest on confirmation
    pub fn new(txid: Hash, vin: Vec<Vin>, vout: Vec<Vout>) -> Self {
        Self {
            txid,
            hex: String::new(),
            version: 1,
            lock_time: 0,
            size: 0,
            vin,
            vout,
            block_hash: None,
            confirmations: None,
            time: None,
            block_time: None,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.first().map_or(false, Vin::is_coinbase)
    }
}

/// Entry of the verbose raw mempool map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MempoolEntry {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub fee: f64,
    /// Unix time the node accepted the transaction
    pub time: i64,
    /// Chain height when the transaction entered the pool
    pub height: u64,
    #[serde(default)]
    pub depends: Vec<Hash>,
}

/// Claim as listed by `getclaimsintrie`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrieClaim {
    #[serde(rename = "claimId")]
    pub claim_id: String,
    pub txid: Hash,
    pub n: u32,
    /// Base units
    pub amount: i64,
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimNameEntry {
    pub name: String,
    #[serde(default)]
    pub claims: Vec<TrieClaim>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportEntry {
    pub txid: Hash,
    pub n: u32,
    #[serde(rename = "nHeight")]
    pub height: u64,
    #[serde(rename = "nValidAtHeight")]
    pub valid_at_height: u64,
    #[serde(rename = "nAmount")]
    pub amount: i64,
}

/// Claim as listed by `getclaimsforname`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimEntry {
    #[serde(rename = "claimId")]
    pub claim_id: String,
    pub txid: Hash,
    pub n: u32,
    #[serde(rename = "nHeight")]
    pub height: u64,
    #[serde(rename = "nValidAtHeight")]
    pub valid_at_height: u64,
    #[serde(rename = "nAmount")]
    pub amount: i64,
    #[serde(rename = "nEffectiveAmount")]
    pub effective_amount: i64,
    #[serde(default)]
    pub supports: Vec<SupportEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimsForName {
    #[serde(rename = "nLastTakeoverHeight", default)]
    pub last_takeover_height: u64,
    #[serde(default)]
    pub claims: Vec<ClaimEntry>,
    #[serde(rename = "supportsWithoutClaims", default)]
    pub supports_without_claims: Vec<SupportEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_json() {
        let json = r#"{
            "hash": "00000000000000000000000000000000000000000000000000000000000000aa",
            "confirmations": 3,
            "size": 250,
            "height": 12,
            "version": 536870912,
            "merkleroot": "ff",
            "nameclaimroot": "ee",
            "tx": ["0000000000000000000000000000000000000000000000000000000000000001"],
            "time": 1500000000,
            "nonce": 42,
            "bits": "1d00ffff",
            "difficulty": 1.5,
            "chainwork": "0a",
            "previousblockhash": "00000000000000000000000000000000000000000000000000000000000000a9"
        }"#;
        let block: BlockResponse = serde_json::from_str(json).unwrap();
        assert_eq!(block.height, 12);
        assert_eq!(block.tx.len(), 1);
        assert_eq!(block.name_claim_root, "ee");
        assert!(block.next_block_hash.is_none());
    }

    #[test]
    fn test_transaction_json() {
        let json = r#"{
            "txid": "0000000000000000000000000000000000000000000000000000000000000001",
            "hex": "00",
            "version": 1,
            "locktime": 0,
            "vin": [
                {"coinbase": "03abcd", "sequence": 4294967295},
                {"txid": "0000000000000000000000000000000000000000000000000000000000000002", "vout": 1,
                 "scriptSig": {"asm": "", "hex": "48"}, "sequence": 4294967295}
            ],
            "vout": [
                {"value": 1.25, "n": 0, "scriptPubKey": {"asm": "", "hex": "76a9", "type": "pubkeyhash", "addresses": ["bX"]}}
            ]
        }"#;
        let tx: RawTransaction = serde_json::from_str(json).unwrap();
        assert!(tx.vin[0].is_coinbase());
        assert_eq!(tx.vin[1].vout, Some(1));
        assert_eq!(tx.vout[0].script_pub_key.script_type, "pubkeyhash");
        assert!(tx.block_hash.is_none());
    }

    #[test]
    fn test_claims_for_name_json() {
        let json = r#"{
            "nLastTakeoverHeight": 100,
            "claims": [{
                "claimId": "d41b657af07d61d46fa26c2c26afee2ce75c0549",
                "txid": "0000000000000000000000000000000000000000000000000000000000000001",
                "n": 0, "nHeight": 90, "nValidAtHeight": 100, "nAmount": 1000, "nEffectiveAmount": 1500,
                "supports": []
            }]
        }"#;
        let claims: ClaimsForName = serde_json::from_str(json).unwrap();
        assert_eq!(claims.claims[0].effective_amount, 1500);
        assert!(claims.supports_without_claims.is_empty());
    }

    #[test]
    fn test_not_found() {
        assert!(RpcError::not_found("block").is_not_found());
        assert!(!RpcError::Network("down".into()).is_not_found());
    }
}
