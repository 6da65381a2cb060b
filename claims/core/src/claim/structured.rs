//! Protobuf claim format.
//!
//! The payload is a one byte envelope followed by a serialized [`Claim`]:
//!
//! ```text
//! 0x00 <claim>
//! 0x01 <20-byte channel claim id> <64-byte signature> <claim>
//! ```

use prost::Message;

use super::{ClaimSignature, ClaimType, ClaimValue, ClaimVersion, DecodedClaim, Fee, Source};
use crate::claim_id::claim_id_from_bytes;
use crate::errors::ClaimDecodeError;

pub const UNSIGNED: u8 = 0x00;
pub const SIGNED: u8 = 0x01;
pub const CHANNEL_ID_LEN: usize = 20;
pub const SIGNATURE_LEN: usize = 64;
const SIGNED_HEADER_LEN: usize = 1 + CHANNEL_ID_LEN + SIGNATURE_LEN;

#[derive(Clone, PartialEq, Message)]
pub struct Claim {
    #[prost(oneof = "ClaimKind", tags = "1, 2, 3, 4")]
    pub kind: Option<ClaimKind>,
    #[prost(string, tag = "8")]
    pub title: String,
    #[prost(string, tag = "9")]
    pub description: String,
    #[prost(message, optional, tag = "10")]
    pub thumbnail: Option<SourceMessage>,
    #[prost(string, repeated, tag = "11")]
    pub tags: Vec<String>,
    #[prost(message, repeated, tag = "12")]
    pub languages: Vec<Language>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ClaimKind {
    #[prost(message, tag = "1")]
    Stream(Stream),
    #[prost(message, tag = "2")]
    Channel(Channel),
    #[prost(message, tag = "3")]
    Collection(ClaimList),
    #[prost(message, tag = "4")]
    Repost(ClaimReference),
}

#[derive(Clone, PartialEq, Message)]
pub struct Stream {
    #[prost(message, optional, tag = "1")]
    pub source: Option<SourceMessage>,
    #[prost(string, tag = "2")]
    pub author: String,
    #[prost(string, tag = "3")]
    pub license: String,
    #[prost(string, tag = "4")]
    pub license_url: String,
    #[prost(int64, tag = "5")]
    pub release_time: i64,
    #[prost(message, optional, tag = "6")]
    pub fee: Option<FeeMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Channel {
    #[prost(bytes = "vec", tag = "1")]
    pub public_key: Vec<u8>,
    #[prost(string, tag = "2")]
    pub email: String,
    #[prost(string, tag = "3")]
    pub website_url: String,
    #[prost(message, optional, tag = "4")]
    pub cover: Option<SourceMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClaimReference {
    /// Raw 20-byte claim id, script byte order
    #[prost(bytes = "vec", tag = "1")]
    pub claim_hash: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClaimList {
    #[prost(int32, tag = "1")]
    pub list_type: i32,
    #[prost(message, repeated, tag = "2")]
    pub claim_references: Vec<ClaimReference>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Currency {
    Unknown = 0,
    Lbc = 1,
    Btc = 2,
    Usd = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct FeeMessage {
    #[prost(enumeration = "Currency", tag = "1")]
    pub currency: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub address: Vec<u8>,
    /// Deweys for LBC and BTC, cents for USD
    #[prost(uint64, tag = "3")]
    pub amount: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct SourceMessage {
    #[prost(bytes = "vec", tag = "1")]
    pub hash: Vec<u8>,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(uint64, tag = "3")]
    pub size: u64,
    #[prost(string, tag = "4")]
    pub media_type: String,
    #[prost(string, tag = "5")]
    pub url: String,
    #[prost(bytes = "vec", tag = "6")]
    pub sd_hash: Vec<u8>,
}

/// Language, script and region are all enumerations on the wire
#[derive(Clone, PartialEq, Message)]
pub struct Language {
    #[prost(int32, tag = "1")]
    pub language: i32,
    #[prost(int32, tag = "2")]
    pub script: i32,
    #[prost(int32, tag = "3")]
    pub region: i32,
}

/// ISO 639-1 codes by enumeration value; 0 is unknown and `en` comes first
const LANGUAGE_CODES: [&str; 185] = [
    "", "en", "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg", "bh", "bi",
    "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv", "cy", "da", "de", "dv", "dz", "ee",
    "el", "eo", "es", "et", "eu", "fa", "ff", "fi", "fj", "fo", "fr", "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha",
    "he", "hi", "ho", "hr", "ht", "hu", "hy", "hz", "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja",
    "jv", "ka", "kg", "ki", "kj", "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw", "ky", "la", "lb", "lg",
    "li", "ln", "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml", "mn", "mr", "ms", "mt", "my", "na", "nb", "nd",
    "ne", "ng", "nl", "nn", "no", "nr", "nv", "ny", "oc", "oj", "om", "or", "os", "pa", "pi", "pl", "ps", "pt", "qu",
    "rm", "rn", "ro", "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr", "ss",
    "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti", "tk", "tl", "tn", "to", "tr", "ts", "tt", "tw", "ty", "ug",
    "uk", "ur", "uz", "ve", "vi", "vo", "wa", "wo", "xh", "yi", "yo", "za", "zh", "zu",
];

fn language_code(language: &Language) -> Option<String> {
    let index = usize::try_from(language.language).ok()?;
    LANGUAGE_CODES.get(index).filter(|code| !code.is_empty()).map(|code| code.to_string())
}

/// Language enumeration value for an ISO 639-1 code
pub fn language_from_code(code: &str) -> Option<i32> {
    LANGUAGE_CODES
        .iter()
        .skip(1)
        .position(|c| *c == code)
        .map(|index| index as i32 + 1)
}

/// Split a structured payload into its optional signature header and the claim bytes
pub fn split_envelope(bytes: &[u8]) -> Result<(Option<ClaimSignature>, &[u8]), ClaimDecodeError> {
    match bytes.first().copied() {
        Some(UNSIGNED) => Ok((None, &bytes[1..])),
        Some(SIGNED) => {
            if bytes.len() < SIGNED_HEADER_LEN {
                return Err(ClaimDecodeError::Structured(format!(
                    "signed envelope needs {} header bytes, got {}",
                    SIGNED_HEADER_LEN,
                    bytes.len()
                )));
            }
            let channel_id = claim_id_from_bytes(&bytes[1..1 + CHANNEL_ID_LEN])
                .ok_or_else(|| ClaimDecodeError::Structured("bad channel id".into()))?;
            let signature = hex::encode(&bytes[1 + CHANNEL_ID_LEN..SIGNED_HEADER_LEN]);
            Ok((Some(ClaimSignature { channel_id, signature }), &bytes[SIGNED_HEADER_LEN..]))
        }
        Some(other) => Err(ClaimDecodeError::Structured(format!("unknown envelope {:#04x}", other))),
        None => Err(ClaimDecodeError::Empty),
    }
}

/// Wrap an encoded claim in an unsigned or signed envelope
pub fn encode_envelope(claim: &Claim, signature: Option<(&[u8; CHANNEL_ID_LEN], &[u8; SIGNATURE_LEN])>) -> Vec<u8> {
    let body = claim.encode_to_vec();
    let mut out = Vec::with_capacity(SIGNED_HEADER_LEN + body.len());
    match signature {
        Some((channel_id, sig)) => {
            out.push(SIGNED);
            out.extend_from_slice(channel_id);
            out.extend_from_slice(sig);
        }
        None => out.push(UNSIGNED),
    }
    out.extend_from_slice(&body);
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn fee_value(fee: FeeMessage) -> Fee {
    let currency = Currency::try_from(fee.currency).unwrap_or(Currency::Unknown);
    let (name, amount) = match currency {
        Currency::Lbc => ("LBC", fee.amount as f64 / 1e8),
        Currency::Btc => ("BTC", fee.amount as f64 / 1e8),
        Currency::Usd => ("USD", fee.amount as f64 / 100.0),
        Currency::Unknown => ("UNKNOWN", fee.amount as f64),
    };
    Fee {
        currency: name.to_string(),
        amount,
        address: bs58::encode(&fee.address).into_string(),
    }
}

fn source_value(source: SourceMessage) -> Source {
    let hash = if source.sd_hash.is_empty() { source.hash } else { source.sd_hash };
    Source {
        hash: hex::encode(hash),
        content_type: source.media_type,
    }
}

pub fn decode(bytes: &[u8]) -> Result<DecodedClaim, ClaimDecodeError> {
    let (signature, body) = split_envelope(bytes)?;
    let claim = Claim::decode(body).map_err(|e| ClaimDecodeError::Structured(e.to_string()))?;

    let mut value = ClaimValue {
        title: non_empty(claim.title),
        description: non_empty(claim.description),
        thumbnail: claim.thumbnail.and_then(|t| non_empty(t.url)),
        language: claim.languages.iter().find_map(language_code),
        nsfw: claim.tags.iter().any(|t| t.eq_ignore_ascii_case("mature")),
        tags: claim.tags,
        signature,
        ..Default::default()
    };

    match claim.kind {
        Some(ClaimKind::Stream(stream)) => {
            value.claim_type = ClaimType::Stream;
            value.author = non_empty(stream.author);
            value.license = non_empty(stream.license);
            value.license_url = non_empty(stream.license_url);
            value.fee = stream.fee.map(fee_value);
            value.source = stream.source.map(source_value);
        }
        Some(ClaimKind::Channel(channel)) => {
            value.claim_type = ClaimType::Channel;
            if !channel.public_key.is_empty() {
                value.public_key = Some(hex::encode(channel.public_key));
            }
        }
        Some(ClaimKind::Repost(reference)) => {
            value.claim_type = ClaimType::Repost;
            value.references = claim_id_from_bytes(&reference.claim_hash).into_iter().collect();
        }
        Some(ClaimKind::Collection(list)) => {
            value.claim_type = ClaimType::Collection;
            value.references =
                list.claim_references.iter().filter_map(|r| claim_id_from_bytes(&r.claim_hash)).collect();
        }
        None => return Err(ClaimDecodeError::Structured("claim has no type".into())),
    }

    Ok(DecodedClaim { version: ClaimVersion::Structured, value })
}
