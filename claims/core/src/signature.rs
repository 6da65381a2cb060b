//! Channel signature checks for signed claims.
//!
//! A signed claim commits to the channel it is published under. The digest is
//! `sha256(first input txid || vout LE || channel id || claim bytes)`; when the
//! spending outpoint is not known the claim address stands in for the outpoint.

use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1};
use sha2::{Digest, Sha256};

use claim_hashes::Hash;

use crate::claim::structured::{CHANNEL_ID_LEN, SIGNATURE_LEN, SIGNED};
use crate::claim_id::claim_id_from_bytes;
use crate::errors::{AddressError, SignatureError};

/// What the signature commits to besides the channel and the claim bytes
#[derive(Debug, Clone, Copy)]
pub enum SigningContext<'a> {
    /// First input of the transaction carrying the claim
    Outpoint { txid: &'a Hash, vout: u32 },
    /// Address the claim pays to
    Address(&'a str),
}

/// Pieces of a signed structured claim value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload<'a> {
    pub channel_id: String,
    pub channel_id_bytes: &'a [u8],
    pub signature: &'a [u8],
    pub payload: &'a [u8],
}

/// Split a signed claim value. Returns `None` for unsigned or non-structured values.
pub fn signed_payload(value: &[u8]) -> Option<SignedPayload<'_>> {
    if value.first() != Some(&SIGNED) || value.len() < 1 + CHANNEL_ID_LEN + SIGNATURE_LEN {
        return None;
    }
    let channel_id_bytes = &value[1..1 + CHANNEL_ID_LEN];
    Some(SignedPayload {
        channel_id: claim_id_from_bytes(channel_id_bytes)?,
        channel_id_bytes,
        signature: &value[1 + CHANNEL_ID_LEN..1 + CHANNEL_ID_LEN + SIGNATURE_LEN],
        payload: &value[1 + CHANNEL_ID_LEN + SIGNATURE_LEN..],
    })
}

pub fn signature_digest(
    context: SigningContext<'_>,
    channel_id_bytes: &[u8],
    payload: &[u8],
) -> Result<[u8; 32], SignatureError> {
    let mut hasher = Sha256::new();
    match context {
        SigningContext::Outpoint { txid, vout } => {
            hasher.update(txid.as_bytes());
            hasher.update(vout.to_le_bytes());
        }
        SigningContext::Address(address) => {
            let raw = bs58::decode(address)
                .into_vec()
                .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;
            hasher.update(raw);
        }
    }
    hasher.update(channel_id_bytes);
    hasher.update(payload);
    Ok(hasher.finalize().into())
}

/// Parse a channel key given either as a raw SEC1 point or DER SubjectPublicKeyInfo
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, SignatureError> {
    let raw_point = matches!(
        (bytes.len(), bytes.first()),
        (33, Some(0x02 | 0x03)) | (65, Some(0x04))
    );
    if raw_point {
        return PublicKey::from_slice(bytes).map_err(|e| SignatureError::InvalidPublicKey(e.to_string()));
    }

    // SPKI ends with the bit string holding the point
    for tail in [65usize, 33] {
        if bytes.len() > tail {
            if let Ok(key) = PublicKey::from_slice(&bytes[bytes.len() - tail..]) {
                return Ok(key);
            }
        }
    }
    Err(SignatureError::InvalidPublicKey(format!("unrecognised key of {} bytes", bytes.len())))
}

fn parse_signature(bytes: &[u8]) -> Result<Signature, SignatureError> {
    Signature::from_compact(bytes)
        .or_else(|_| Signature::from_der(bytes))
        .map_err(|e| SignatureError::InvalidSignature(e.to_string()))
}

/// Verify an ECDSA signature over a 32-byte digest
pub fn verify_digest(public_key: &[u8], signature: &[u8], digest: &[u8; 32]) -> Result<bool, SignatureError> {
    let key = parse_public_key(public_key)?;
    let mut sig = parse_signature(signature)?;
    sig.normalize_s();
    let message = Message::from_slice(digest).map_err(|e| SignatureError::InvalidSignature(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    Ok(secp.verify_ecdsa(&message, &sig, &key).is_ok())
}

/// Check a signed claim value against its channel's public key.
///
/// `Ok(false)` means the value parsed but the signature does not match.
pub fn validate_signed_claim(
    value: &[u8],
    channel_public_key: &[u8],
    context: SigningContext<'_>,
) -> Result<bool, SignatureError> {
    let signed = signed_payload(value).ok_or_else(|| SignatureError::InvalidSignature("claim value is not signed".into()))?;
    let digest = signature_digest(context, signed.channel_id_bytes, signed.payload)?;
    verify_digest(channel_public_key, signed.signature, &digest)
}
