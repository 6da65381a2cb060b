//! Address derivation for standard pay scripts.

use claim_hashes::{double_sha256, hash160};

use crate::errors::AddressError;
use crate::network::Network;
use crate::opcodes::*;
use crate::script::ClaimScript;

/// Standard pay script shapes recognised by opcode position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayScript {
    /// `<pubkey> OP_CHECKSIG`
    PubKey(Vec<u8>),
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
    PubKeyHash([u8; 20]),
    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    ScriptHash([u8; 20]),
    NonStandard,
}

impl PayScript {
    /// Script type label as reported by full nodes
    pub fn type_name(&self) -> &'static str {
        match self {
            PayScript::PubKey(_) => "pubkey",
            PayScript::PubKeyHash(_) => "pubkeyhash",
            PayScript::ScriptHash(_) => "scripthash",
            PayScript::NonStandard => "nonstandard",
        }
    }
}

pub fn classify_pay_script(script: &[u8]) -> PayScript {
    if script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[3..23]);
        return PayScript::PubKeyHash(hash);
    }

    if script.len() == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[2..22]);
        return PayScript::ScriptHash(hash);
    }

    match script.first().copied() {
        Some(key_len @ (33 | 65))
            if script.len() == key_len as usize + 2 && script[script.len() - 1] == OP_CHECKSIG =>
        {
            PayScript::PubKey(script[1..script.len() - 1].to_vec())
        }
        _ => PayScript::NonStandard,
    }
}

/// Derive the address a standard pay script pays to
pub fn address_from_pay_script(script: &[u8], network: Network) -> Option<String> {
    match classify_pay_script(script) {
        PayScript::PubKeyHash(hash) => Some(encode_address(network.pubkey_hash_version(), &hash)),
        PayScript::ScriptHash(hash) => Some(encode_address(network.script_hash_version(), &hash)),
        PayScript::PubKey(key) => Some(encode_address(network.pubkey_hash_version(), &hash160(&key))),
        PayScript::NonStandard => None,
    }
}

/// Derive the address paid by the script embedded after a claim prefix
pub fn address_from_claim_script(script: &[u8], network: Network) -> Result<String, AddressError> {
    let parsed = ClaimScript::parse(script)?;
    address_from_pay_script(parsed.pay_script(), network).ok_or(AddressError::NonStandard)
}

/// Base58check encoding of `version || payload`
pub fn encode_address(version: u8, payload: &[u8]) -> String {
    let mut versioned_payload = Vec::with_capacity(1 + payload.len() + 4);
    versioned_payload.push(version);
    versioned_payload.extend_from_slice(payload);

    let checksum = double_sha256(&versioned_payload);
    versioned_payload.extend_from_slice(&checksum[0..4]);

    bs58::encode(&versioned_payload).into_string()
}

/// Decode a base58check address into `version || payload`, verifying the checksum
pub fn decode_address(address: &str) -> Result<Vec<u8>, AddressError> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;
    if decoded.len() < 5 {
        return Err(AddressError::InvalidBase58(format!("too short: {} bytes", decoded.len())));
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - 4);
    if checksum != &double_sha256(payload)[..4] {
        return Err(AddressError::InvalidChecksum);
    }
    Ok(payload.to_vec())
}

/// Build the P2PKH pay script for a 20-byte pubkey hash
pub fn p2pkh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(0x14);
    script.extend_from_slice(hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Build the P2SH pay script for a 20-byte script hash
pub fn p2sh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.push(OP_HASH160);
    script.push(0x14);
    script.extend_from_slice(hash);
    script.push(OP_EQUAL);
    script
}
