use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Compute SHA256(SHA256(data))
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Compute RIPEMD160(SHA256(data)), the digest behind pubkey-hash and
/// script-hash addresses and claim ids.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}
