pub mod hasher;

// Re-export commonly used types
pub use hasher::{double_sha256, hash160};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const HASH_SIZE: usize = 32;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HashParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("expected {HASH_SIZE} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 32-byte block or transaction hash.
///
/// Bytes are kept in internal (wire) order. `Display`/`FromStr` and serde use
/// the byte-reversed hex form that full nodes print and accept over RPC.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Create a hash from a 32-byte array in internal order
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns raw bytes in internal order
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Creates a zeroed hash
    pub const fn zeroed() -> Self {
        Self([0u8; HASH_SIZE])
    }

    /// Tries to create a Hash from a slice of bytes in internal order
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, HashParseError> {
        let array: [u8; HASH_SIZE] = slice
            .try_into()
            .map_err(|_| HashParseError::InvalidLength(slice.len()))?;
        Ok(Self(array))
    }

    /// Parses the display (byte-reversed) hex form
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        let mut bytes = hex::decode(s)?;
        if bytes.len() != HASH_SIZE {
            return Err(HashParseError::InvalidLength(bytes.len()));
        }
        bytes.reverse();
        Self::try_from_slice(&bytes)
    }

    /// Display-order hex
    pub fn to_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }

    /// Hash of the given data under SHA256(SHA256(.)), as transaction ids are computed
    pub fn of(data: &[u8]) -> Self {
        Self(double_sha256(data))
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for [u8; HASH_SIZE] {
    fn from(h: Hash) -> Self {
        h.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
