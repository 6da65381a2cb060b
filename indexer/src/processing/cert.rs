//! Channel certificate checks for signed claims

use tracing::debug;

use claim_hashes::Hash;
use claims_core::{validate_signed_claim, SigningContext};
use database::ClaimRow;

use crate::error::Result;
use crate::processing::Pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateCheck {
    Valid,
    Invalid,
    /// The channel is not indexed yet; the claim stays pending
    ChannelUnknown,
}

impl Pipeline {
    /// Verify the channel signature of `claim` and record the outcome.
    ///
    /// The digest commits to the first input spent by the claim's
    /// transaction; without one the claim address stands in.
    pub async fn check_certificate(&self, claim: &ClaimRow) -> Result<CertificateCheck> {
        let claims = self.db().claims();
        let Some(channel_id) = claim.publisher_id.as_deref() else {
            claims.set_certificate_result(&claim.claim_id, false).await?;
            return Ok(CertificateCheck::Invalid);
        };
        let Some(channel_key) = claims.channel_key(channel_id).await? else {
            return Ok(CertificateCheck::ChannelUnknown);
        };

        let first_input = self
            .db()
            .inputs()
            .for_transaction(&claim.transaction_hash)
            .await?
            .into_iter()
            .find(|input| input.vin == 0 && !input.is_coinbase);
        let prevout = match first_input {
            Some(input) => Some((Hash::from_hex(&input.prevout_hash)?, input.prevout_n as u32)),
            None => None,
        };
        let context = match &prevout {
            Some((txid, vout)) => SigningContext::Outpoint { txid, vout: *vout },
            None => SigningContext::Address(&claim.claim_address),
        };

        let value = hex::decode(&claim.value_as_hex)?;
        let valid = match hex::decode(&channel_key) {
            Ok(key) => validate_signed_claim(&value, &key, context).unwrap_or_else(|e| {
                debug!("Signature of claim {} unusable: {}", claim.claim_id, e);
                false
            }),
            Err(_) => false,
        };

        claims.set_certificate_result(&claim.claim_id, valid).await?;
        Ok(if valid { CertificateCheck::Valid } else { CertificateCheck::Invalid })
    }
}
