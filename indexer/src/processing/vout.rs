//! Output worker and output address resolution

use tracing::warn;

use claims_core::opcodes::OP_RETURN;
use claims_core::script::is_claim_script;
use claims_core::{
    address_from_claim_script, address_from_pay_script, claim_id_from_outpoint, classify_pay_script, AddressError,
    ClaimScript, Network,
};
use database::{AbnormalClaimRow, OutputRow};
use rpc_core::Vout;

use crate::error::{IndexerError, Result};
use crate::processing::claim::ClaimOutput;
use crate::processing::ledger::{to_base_units, Ledger};
use crate::processing::transaction::TxContext;
use crate::processing::Pipeline;

/// Addresses an output pays to.
///
/// Standard scripts carry them in the node's answer; claim scripts have them
/// derived from the embedded pay script. Data carriers and malformed claim
/// scripts have none. Any other script without an address is an integrity
/// error.
pub fn output_addresses(txid: &str, vout: &Vout, network: Network) -> Result<Vec<String>> {
    let script_pub_key = &vout.script_pub_key;
    if !script_pub_key.addresses.is_empty() {
        return Ok(script_pub_key.addresses.clone());
    }

    let script = hex::decode(&script_pub_key.hex)?;
    if script.is_empty() || script[0] == OP_RETURN || script_pub_key.script_type == "nulldata" {
        return Ok(Vec::new());
    }

    let unresolved = || IndexerError::UnresolvedAddress {
        txid: txid.to_string(),
        vout: vout.n,
        script_type: script_pub_key.script_type.clone(),
    };

    if is_claim_script(&script) {
        return match address_from_claim_script(&script, network) {
            Ok(address) => Ok(vec![address]),
            Err(AddressError::Script(_)) => Ok(Vec::new()),
            Err(_) => Err(unresolved()),
        };
    }

    address_from_pay_script(&script, network).map(|a| vec![a]).ok_or_else(unresolved)
}

impl Pipeline {
    /// Persist one output, credit its address and apply any claim script it
    /// carries. Returns the output value.
    pub(crate) async fn process_vout(&self, ctx: &TxContext, vout: Vout, ledger: &Ledger) -> Result<i64> {
        let script = hex::decode(&vout.script_pub_key.hex)?;
        let addresses = output_addresses(&ctx.txid_hex, &vout, self.network())?;
        let value = to_base_units(vout.value);

        let claim_script = is_claim_script(&script).then(|| ClaimScript::parse(&script));

        let claim_id = match &claim_script {
            Some(Ok(parsed)) => Some(match parsed.claim_id() {
                Some(id) => id.to_string(),
                None => claim_id_from_outpoint(&ctx.txid, vout.n),
            }),
            _ => None,
        };

        let script_type = if vout.script_pub_key.script_type.is_empty() {
            classify_pay_script(&script).type_name().to_string()
        } else {
            vout.script_pub_key.script_type.clone()
        };

        let output_id = self
            .db()
            .outputs()
            .put(&OutputRow {
                transaction_id: ctx.transaction_id,
                transaction_hash: ctx.txid_hex.clone(),
                vout: vout.n as i64,
                value,
                script_type,
                script_hex: vout.script_pub_key.hex.clone(),
                address_list: serde_json::to_string(&addresses)?,
                is_spent: false,
                spent_by_input_id: None,
                claim_id,
                ..Default::default()
            })
            .await?;

        if let Some(address) = addresses.first() {
            ledger.credit(address, value);
        }

        match claim_script {
            Some(Ok(parsed)) => {
                let output = ClaimOutput {
                    vout: vout.n,
                    output_id,
                    amount: value,
                    address: addresses.first().map(String::as_str).unwrap_or_default(),
                };
                self.apply_claim_script(ctx, &output, parsed).await?;
            }
            Some(Err(e)) => {
                warn!("Malformed claim script at {}:{}: {}", ctx.txid_hex, vout.n, e);
                self.db()
                    .abnormal_claims()
                    .put(&AbnormalClaimRow {
                        transaction_hash: ctx.txid_hex.clone(),
                        vout: vout.n as i64,
                        value_as_hex: vout.script_pub_key.hex.clone(),
                        output_id: Some(output_id),
                        ..Default::default()
                    })
                    .await?;
            }
            None => {}
        }

        Ok(value)
    }
}
