//! Claim and support mutation driven by claim scripts

use tracing::{debug, warn};

use claim_hashes::Hash;
use claims_core::{claim_id_from_outpoint, decode_claim_value, BidState, ClaimScript, ClaimType, DecodedClaim};
use database::{AbnormalClaimRow, ClaimRow, OutputRow, SupportRow, MEMPOOL_BLOCK_HASH};

use crate::error::Result;
use crate::processing::cert::CertificateCheck;
use crate::processing::transaction::TxContext;
use crate::processing::Pipeline;

/// The output a claim script was found in
#[derive(Debug, Clone)]
pub(crate) struct ClaimOutput<'a> {
    pub vout: u32,
    pub output_id: i64,
    /// Output value, base units
    pub amount: i64,
    pub address: &'a str,
}

/// Why a claim script is being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimWrite {
    Name,
    Update,
    /// Back onto an earlier outpoint after the transaction that moved the claim was dropped
    Restore,
}

impl Pipeline {
    pub(crate) async fn apply_claim_script(
        &self,
        ctx: &TxContext,
        output: &ClaimOutput<'_>,
        script: ClaimScript,
    ) -> Result<()> {
        match script {
            ClaimScript::Name { name, value, .. } => {
                let claim_id = claim_id_from_outpoint(&ctx.txid, output.vout);
                self.save_claim(ctx, output, &name, &claim_id, &value, ClaimWrite::Name).await
            }
            ClaimScript::Update { name, claim_id, value, .. } => {
                self.save_claim(ctx, output, &name, &claim_id, &value, ClaimWrite::Update).await
            }
            ClaimScript::Support { claim_id, .. } => {
                self.db()
                    .supports()
                    .put(&SupportRow {
                        transaction_hash: ctx.txid_hex.clone(),
                        vout: output.vout as i64,
                        supported_claim_id: claim_id,
                        support_amount: output.amount,
                        bid_state: BidState::Accepted.to_string(),
                        ..Default::default()
                    })
                    .await?;
                Ok(())
            }
        }
    }

    /// Point a claim back at `output`, one of its own earlier outpoints, once
    /// the transaction that moved it is gone. The claim re-enters as Accepted
    /// and trie reconciliation settles the rest. Returns false when the output
    /// holds no claim to restore.
    pub(crate) async fn restore_claim(&self, output: &OutputRow) -> Result<bool> {
        let Some(claim_id) = output.claim_id.as_deref() else { return Ok(false) };
        let (name, value) = match ClaimScript::parse(&hex::decode(&output.script_hex)?) {
            Ok(ClaimScript::Name { name, value, .. }) | Ok(ClaimScript::Update { name, value, .. }) => (name, value),
            _ => return Ok(false),
        };
        let db = self.db();
        let Some(tx) = db.transactions().get_by_hash(&output.transaction_hash).await? else { return Ok(false) };
        let Some(current) = db.claims().get(claim_id).await? else { return Ok(false) };

        let height = match tx.block_hash.as_deref() {
            Some(hash) if hash != MEMPOOL_BLOCK_HASH => db.blocks().get_by_hash(hash).await?.map(|b| b.height),
            _ => None,
        };
        let ctx = TxContext {
            txid: Hash::from_hex(&output.transaction_hash)?,
            txid_hex: output.transaction_hash.clone(),
            transaction_id: tx.id,
            height: height.unwrap_or(current.height),
            time: tx.transaction_time.unwrap_or(tx.created_at),
            confirmed: height.is_some(),
        };
        let addresses = output.addresses();
        let claim_output = ClaimOutput {
            vout: output.vout as u32,
            output_id: output.id,
            amount: output.value,
            address: addresses.first().map(String::as_str).unwrap_or_default(),
        };
        self.save_claim(&ctx, &claim_output, &name, claim_id, &value, ClaimWrite::Restore).await?;
        Ok(true)
    }

    /// Create or move a claim. Replaying the same outpoint keeps the stored
    /// bid state and certificate flags; an update moving the claim applies
    /// [`BidState::on_update`]. A replayed script never pulls a claim back
    /// from a later outpoint. Undecodable values are quarantined while the
    /// claim itself is still tracked.
    async fn save_claim(
        &self,
        ctx: &TxContext,
        output: &ClaimOutput<'_>,
        name: &str,
        claim_id: &str,
        value: &[u8],
        write: ClaimWrite,
    ) -> Result<()> {
        let is_update = write == ClaimWrite::Update;
        let decoded = match decode_claim_value(value) {
            Ok(decoded) => Some(decoded),
            Err(_) if write == ClaimWrite::Restore => None,
            Err(e) => {
                warn!("Quarantining claim {} at {}:{}: {}", claim_id, ctx.txid_hex, output.vout, e);
                self.db()
                    .abnormal_claims()
                    .put(&AbnormalClaimRow {
                        transaction_hash: ctx.txid_hex.clone(),
                        vout: output.vout as i64,
                        name: name.to_string(),
                        claim_id: claim_id.to_string(),
                        is_update,
                        value_as_hex: hex::encode(value),
                        output_id: Some(output.output_id),
                        ..Default::default()
                    })
                    .await?;
                None
            }
        };

        let claims = self.db().claims();
        let existing = claims.get(claim_id).await?;
        let same_outpoint = existing
            .as_ref()
            .map_or(false, |c| c.transaction_hash == ctx.txid_hex && c.vout == output.vout as i64);

        if is_update && existing.is_none() {
            warn!("Update at {}:{} for unknown claim {}", ctx.txid_hex, output.vout, claim_id);
        }

        if let Some(current) = existing.as_ref().filter(|_| !same_outpoint && write != ClaimWrite::Restore) {
            let spent = self
                .db()
                .outputs()
                .get(&ctx.txid_hex, output.vout as i64)
                .await?
                .map_or(false, |o| o.is_spent);
            // Mempool heights are entry heights and may trail a confirmed parent
            if spent || (ctx.confirmed && ctx.height < current.height) {
                debug!(
                    "Claim {} already moved on to {}:{}; leaving it there",
                    claim_id, current.transaction_hash, current.vout
                );
                return Ok(());
            }
        }

        let mut row = existing.clone().unwrap_or_default();
        row.bid_state = match &existing {
            Some(current) if same_outpoint => current.bid_state.clone(),
            Some(current) if is_update => current
                .bid_state
                .parse::<BidState>()
                .map(BidState::on_update)
                .unwrap_or(BidState::Accepted)
                .to_string(),
            _ => BidState::Accepted.to_string(),
        };

        if !same_outpoint {
            row.transaction_hash = ctx.txid_hex.clone();
            row.vout = output.vout as i64;
            row.height = ctx.height;
            row.valid_at_height = ctx.height;
            row.effective_amount = output.amount;
            row.is_cert_valid = false;
            row.is_cert_processed = false;
        }
        row.claim_id = claim_id.to_string();
        row.name = name.to_string();
        row.amount = output.amount;
        row.claim_address = output.address.to_string();
        row.value_as_hex = hex::encode(value);
        row.transaction_time = Some(ctx.time);
        match &decoded {
            Some(decoded) => apply_value(&mut row, decoded),
            None if existing.is_none() => row.claim_type = ClaimType::Unknown.to_string(),
            None => {}
        }

        claims.put(&row).await?;
        debug!("Claim {} '{}' now at {}:{} ({})", claim_id, name, ctx.txid_hex, output.vout, row.bid_state);

        if row.publisher_id.is_some() && !row.is_cert_processed {
            if let CertificateCheck::ChannelUnknown = self.check_certificate(&row).await? {
                debug!("Channel of claim {} not indexed yet", claim_id);
            }
        }
        Ok(())
    }
}

/// Copy every metadata column of a decoded value onto `row`
fn apply_value(row: &mut ClaimRow, decoded: &DecodedClaim) {
    let value = &decoded.value;
    row.claim_type = value.claim_type.to_string();
    row.version = decoded.version.to_string();
    row.value_as_json = Some(value.to_json());
    row.title = value.title.clone();
    row.description = value.description.clone();
    row.author = value.author.clone();
    row.language = value.language.clone();
    row.license = value.license.clone();
    row.license_url = value.license_url.clone();
    row.thumbnail_url = value.thumbnail.clone();
    row.preview = value.preview.clone();
    row.is_nsfw = value.nsfw;
    row.fee_currency = value.fee.as_ref().map(|f| f.currency.clone());
    row.fee = value.fee.as_ref().map_or(0.0, |f| f.amount);
    row.fee_address = value.fee.as_ref().map(|f| f.address.clone());
    row.sd_hash = value.source.as_ref().map(|s| s.hash.clone());
    row.content_type = value.source.as_ref().map(|s| s.content_type.clone());
    row.certificate = value.public_key.clone();
    row.publisher_id = value.signature.as_ref().map(|s| s.channel_id.clone());
    row.publisher_sig = value.signature.as_ref().map(|s| s.signature.clone());
}
