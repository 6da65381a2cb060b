//! JSON claim metadata, versions 0.0.1 through 0.0.3.
//!
//! The three versions share most keys. Version 0.0.1 may omit its `ver` tag;
//! the later ones must carry their exact tag or the decoder refuses them.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{ClaimType, ClaimValue, ClaimVersion, DecodedClaim, Fee, Source};
use crate::errors::ClaimDecodeError;

#[derive(Debug, Deserialize)]
struct Sources {
    lbry_sd_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyedFee {
    address: String,
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct V1 {
    ver: Option<String>,
    title: String,
    description: Option<String>,
    author: Option<String>,
    language: Option<String>,
    license: Option<String>,
    #[serde(rename = "content-type")]
    content_type: Option<String>,
    sources: Option<Sources>,
    thumbnail: Option<String>,
    fee: Option<BTreeMap<String, KeyedFee>>,
}

#[derive(Debug, Deserialize)]
struct V2 {
    ver: Option<String>,
    title: Option<String>,
    description: Option<String>,
    author: Option<String>,
    language: Option<String>,
    license: Option<String>,
    license_url: Option<String>,
    content_type: Option<String>,
    sources: Option<Sources>,
    thumbnail: Option<String>,
    preview: Option<String>,
    #[serde(default)]
    nsfw: bool,
    fee: Option<BTreeMap<String, KeyedFee>>,
}

#[derive(Debug, Deserialize)]
struct TaggedFee {
    currency: String,
    address: String,
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct V3 {
    ver: Option<String>,
    title: Option<String>,
    description: Option<String>,
    author: Option<String>,
    language: Option<String>,
    license: Option<String>,
    license_url: Option<String>,
    content_type: Option<String>,
    sources: Option<Sources>,
    thumbnail: Option<String>,
    preview: Option<String>,
    #[serde(default)]
    nsfw: bool,
    fee: Option<TaggedFee>,
}

fn parse<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, ClaimDecodeError> {
    serde_json::from_slice(bytes).map_err(|e| ClaimDecodeError::Json(e.to_string()))
}

fn check_tag(found: &Option<String>, expected: &'static str) -> Result<(), ClaimDecodeError> {
    match found {
        Some(tag) if tag == expected => Ok(()),
        _ => Err(ClaimDecodeError::VersionMismatch { expected, found: found.clone() }),
    }
}

fn keyed_fee(fee: Option<BTreeMap<String, KeyedFee>>) -> Option<Fee> {
    fee?.into_iter().next().map(|(currency, fee)| Fee {
        currency,
        amount: fee.amount,
        address: fee.address,
    })
}

fn source(sources: Option<Sources>, content_type: Option<String>) -> Option<Source> {
    let hash = sources.and_then(|s| s.lbry_sd_hash);
    if hash.is_none() && content_type.is_none() {
        return None;
    }
    Some(Source {
        hash: hash.unwrap_or_default(),
        content_type: content_type.unwrap_or_default(),
    })
}

pub fn decode_v1(bytes: &[u8]) -> Result<DecodedClaim, ClaimDecodeError> {
    let meta: V1 = parse(bytes)?;
    if !matches!(meta.ver.as_deref(), None | Some("") | Some("0.0.1")) {
        return Err(ClaimDecodeError::VersionMismatch { expected: "0.0.1", found: meta.ver });
    }

    Ok(DecodedClaim {
        version: ClaimVersion::LegacyV1,
        value: ClaimValue {
            claim_type: ClaimType::Stream,
            title: Some(meta.title),
            description: meta.description,
            author: meta.author,
            language: meta.language,
            license: meta.license,
            thumbnail: meta.thumbnail,
            fee: keyed_fee(meta.fee),
            source: source(meta.sources, meta.content_type),
            ..Default::default()
        },
    })
}

pub fn decode_v2(bytes: &[u8]) -> Result<DecodedClaim, ClaimDecodeError> {
    let meta: V2 = parse(bytes)?;
    check_tag(&meta.ver, "0.0.2")?;

    Ok(DecodedClaim {
        version: ClaimVersion::LegacyV2,
        value: ClaimValue {
            claim_type: ClaimType::Stream,
            title: meta.title,
            description: meta.description,
            author: meta.author,
            language: meta.language,
            license: meta.license,
            license_url: meta.license_url,
            thumbnail: meta.thumbnail,
            preview: meta.preview,
            nsfw: meta.nsfw,
            fee: keyed_fee(meta.fee),
            source: source(meta.sources, meta.content_type),
            ..Default::default()
        },
    })
}

pub fn decode_v3(bytes: &[u8]) -> Result<DecodedClaim, ClaimDecodeError> {
    let meta: V3 = parse(bytes)?;
    check_tag(&meta.ver, "0.0.3")?;

    Ok(DecodedClaim {
        version: ClaimVersion::LegacyV3,
        value: ClaimValue {
            claim_type: ClaimType::Stream,
            title: meta.title,
            description: meta.description,
            author: meta.author,
            language: meta.language,
            license: meta.license,
            license_url: meta.license_url,
            thumbnail: meta.thumbnail,
            preview: meta.preview,
            nsfw: meta.nsfw,
            fee: meta.fee.map(|fee| Fee {
                currency: fee.currency,
                amount: fee.amount,
                address: fee.address,
            }),
            source: source(meta.sources, meta.content_type),
            ..Default::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_full() {
        let json = br#"{
            "title": "Ep 1",
            "description": "first",
            "author": "me",
            "language": "en",
            "license": "CC",
            "content-type": "video/mp4",
            "sources": {"lbry_sd_hash": "abcd"},
            "fee": {"LBC": {"address": "bAddr", "amount": 2.0}}
        }"#;
        let decoded = decode_v1(json).unwrap();
        let value = decoded.value;
        assert_eq!(value.author.as_deref(), Some("me"));
        assert_eq!(
            value.source,
            Some(Source { hash: "abcd".into(), content_type: "video/mp4".into() })
        );
        let fee = value.fee.unwrap();
        assert_eq!(fee.currency, "LBC");
        assert_eq!(fee.address, "bAddr");
    }

    #[test]
    fn test_v1_requires_title() {
        assert!(matches!(decode_v1(br#"{"ver":"0.0.1"}"#), Err(ClaimDecodeError::Json(_))));
    }

    #[test]
    fn test_v1_blank_tag() {
        assert!(decode_v1(br#"{"ver":"","title":"t"}"#).is_ok());
    }

    #[test]
    fn test_tag_mismatch_is_hard_failure() {
        assert_eq!(
            decode_v2(br#"{"ver":"0.0.3","title":"t"}"#).unwrap_err(),
            ClaimDecodeError::VersionMismatch { expected: "0.0.2", found: Some("0.0.3".into()) }
        );
        assert_eq!(
            decode_v3(br#"{"title":"t"}"#).unwrap_err(),
            ClaimDecodeError::VersionMismatch { expected: "0.0.3", found: None }
        );
        assert!(matches!(
            decode_v1(br#"{"ver":"0.0.2","title":"t"}"#),
            Err(ClaimDecodeError::VersionMismatch { expected: "0.0.1", .. })
        ));
    }

    #[test]
    fn test_v2_fields() {
        let decoded = decode_v2(
            br#"{"ver":"0.0.2","title":"t","license_url":"http://l","preview":"p","content_type":"audio/mpeg"}"#,
        )
        .unwrap();
        assert_eq!(decoded.value.license_url.as_deref(), Some("http://l"));
        assert_eq!(decoded.value.preview.as_deref(), Some("p"));
        assert_eq!(decoded.value.source.unwrap().content_type, "audio/mpeg");
    }

    #[test]
    fn test_v3_fee_shape() {
        let decoded = decode_v3(
            br#"{"ver":"0.0.3","title":"t","fee":{"currency":"USD","address":"bAddr","amount":0.99}}"#,
        )
        .unwrap();
        let fee = decoded.value.fee.unwrap();
        assert_eq!(fee.currency, "USD");
        assert_eq!(fee.amount, 0.99);
    }
}
