//! Claim value decoding.
//!
//! Claim payloads come in four generations. Each generation has its own
//! decoder; [`decode_claim_value`] tries them in a fixed order and the first
//! success wins. All generations migrate into the same [`ClaimValue`].

pub mod legacy;
pub mod structured;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ClaimDecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimVersion {
    #[serde(rename = "structured")]
    Structured,
    #[serde(rename = "0.0.1")]
    LegacyV1,
    #[serde(rename = "0.0.2")]
    LegacyV2,
    #[serde(rename = "0.0.3")]
    LegacyV3,
}

impl ClaimVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimVersion::Structured => "structured",
            ClaimVersion::LegacyV1 => "0.0.1",
            ClaimVersion::LegacyV2 => "0.0.2",
            ClaimVersion::LegacyV3 => "0.0.3",
        }
    }
}

impl fmt::Display for ClaimVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    Stream,
    Channel,
    Repost,
    Collection,
    #[default]
    Unknown,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Stream => "stream",
            ClaimType::Channel => "channel",
            ClaimType::Repost => "repost",
            ClaimType::Collection => "collection",
            ClaimType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub currency: String,
    pub amount: f64,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Hex of the stream descriptor hash
    pub hash: String,
    pub content_type: String,
}

/// Channel signature attached to a structured claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSignature {
    pub channel_id: String,
    /// Hex of the 64-byte compact signature
    pub signature: String,
}

/// Canonical claim value every payload generation migrates into
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimValue {
    pub claim_type: ClaimType,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub license: Option<String>,
    pub license_url: Option<String>,
    pub thumbnail: Option<String>,
    pub preview: Option<String>,
    pub nsfw: bool,
    pub fee: Option<Fee>,
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Hex of the channel public key, channels only
    pub public_key: Option<String>,
    pub signature: Option<ClaimSignature>,
    /// Claim ids a repost or collection points at
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

impl ClaimValue {
    pub fn to_json(&self) -> String {
        // A struct of strings, numbers and bools always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClaim {
    pub version: ClaimVersion,
    pub value: ClaimValue,
}

type Decoder = fn(&[u8]) -> Result<DecodedClaim, ClaimDecodeError>;

const DECODERS: [(ClaimVersion, Decoder); 4] = [
    (ClaimVersion::Structured, structured::decode),
    (ClaimVersion::LegacyV1, legacy::decode_v1),
    (ClaimVersion::LegacyV2, legacy::decode_v2),
    (ClaimVersion::LegacyV3, legacy::decode_v3),
];

/// Decode a claim payload under the first generation that accepts it
pub fn decode_claim_value(bytes: &[u8]) -> Result<DecodedClaim, ClaimDecodeError> {
    if bytes.is_empty() {
        return Err(ClaimDecodeError::Empty);
    }

    let mut failures = Vec::with_capacity(DECODERS.len());
    for (version, decoder) in DECODERS {
        match decoder(bytes) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => failures.push(format!("{}: {}", version, e)),
        }
    }
    Err(ClaimDecodeError::Unrecognized(failures))
}
