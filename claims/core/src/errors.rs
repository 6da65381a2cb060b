use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Script is not a claim script (leading opcode {0:#04x})")]
    NotClaimScript(u8),

    #[error("Script truncated at offset {offset}: needed {needed} bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("Name length byte {0:#04x} is not a direct push")]
    NameLengthUnsupported(u8),

    #[error("Name of {0} bytes does not fit a direct push")]
    NameTooLong(usize),

    #[error("Opcode {opcode:#04x} at offset {offset} is not a data push")]
    InvalidPush { offset: usize, opcode: u8 },

    #[error("Claim id must be 20 bytes, got {0}")]
    InvalidClaimId(usize),

    #[error("Expected drop marker at offset {offset}, found {found:02x?}")]
    MissingDropMarker { offset: usize, found: Vec<u8> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Non-standard pay script")]
    NonStandard,

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Invalid base58: {0}")]
    InvalidBase58(String),

    #[error("Invalid address checksum")]
    InvalidChecksum,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaimDecodeError {
    #[error("Empty claim value")]
    Empty,

    #[error("Structured decode failed: {0}")]
    Structured(String),

    #[error("JSON decode failed: {0}")]
    Json(String),

    #[error("Version tag mismatch: expected {expected}, found {found:?}")]
    VersionMismatch { expected: &'static str, found: Option<String> },

    #[error("Claim value not decodable under any known schema: {0:?}")]
    Unrecognized(Vec<String>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("Invalid channel id: {0}")]
    InvalidChannelId(String),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),
}
