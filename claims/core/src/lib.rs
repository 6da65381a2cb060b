//! Claim chain core types
//!
//! Stateless decoding of claim-bearing scripts and claim payloads, address
//! derivation for the pay scripts they wrap, and the claim bid-state rules.

pub mod address;
pub mod claim;
pub mod claim_id;
pub mod errors;
pub mod network;
pub mod opcodes;
pub mod script;
pub mod signature;
pub mod state;

pub use address::{address_from_claim_script, address_from_pay_script, classify_pay_script, PayScript};
pub use claim::{decode_claim_value, ClaimType, ClaimValue, ClaimVersion, DecodedClaim};
pub use claim_id::{claim_id_from_outpoint, claim_id_from_txid};
pub use errors::{AddressError, ClaimDecodeError, ScriptError, SignatureError};
pub use network::Network;
pub use script::{ClaimScript, ScriptKind};
pub use signature::{validate_signed_claim, SigningContext};
pub use state::{derive_bid_state, expiring_claim_heights, is_expired, select_controlling, BidState, Contender};

pub use claim_hashes::Hash;
