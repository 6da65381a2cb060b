use claim_hashes::{hash160, Hash, HashParseError};

/// Claim id of the claim created at `tx_hash:vout`.
///
/// hash160 over the internal txid bytes followed by the big-endian output
/// index, rendered as hex of the reversed digest.
pub fn claim_id_from_outpoint(tx_hash: &Hash, vout: u32) -> String {
    let mut preimage = Vec::with_capacity(36);
    preimage.extend_from_slice(tx_hash.as_bytes());
    preimage.extend_from_slice(&vout.to_be_bytes());

    let mut digest = hash160(&preimage);
    digest.reverse();
    hex::encode(digest)
}

/// Same as [`claim_id_from_outpoint`] for a display-order txid string
pub fn claim_id_from_txid(txid: &str, vout: u32) -> Result<String, HashParseError> {
    let hash = Hash::from_hex(txid)?;
    Ok(claim_id_from_outpoint(&hash, vout))
}

/// Raw 20 bytes of a claim id as they appear inside scripts and signed payloads
pub fn claim_id_to_bytes(claim_id: &str) -> Option<[u8; 20]> {
    let raw = hex::decode(claim_id).ok()?;
    let mut bytes: [u8; 20] = raw.try_into().ok()?;
    bytes.reverse();
    Some(bytes)
}

/// Inverse of [`claim_id_to_bytes`]
pub fn claim_id_from_bytes(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 20 {
        return None;
    }
    let mut reversed = bytes.to_vec();
    reversed.reverse();
    Some(hex::encode(reversed))
}
