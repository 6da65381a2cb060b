//! Input worker

use tracing::debug;

use database::{InputRow, OutputRow};
use rpc_core::Vin;

use crate::error::{IndexerError, Result};
use crate::processing::ledger::Ledger;
use crate::processing::transaction::TxContext;
use crate::processing::Pipeline;

impl Pipeline {
    /// Persist one input and settle the output it spends. Returns the value
    /// taken from that output (0 for coin generation).
    pub(crate) async fn process_vin(&self, ctx: &TxContext, index: usize, vin: Vin, ledger: &Ledger) -> Result<i64> {
        let inputs = self.db().inputs();

        if vin.is_coinbase() {
            inputs
                .put(&InputRow {
                    transaction_id: ctx.transaction_id,
                    transaction_hash: ctx.txid_hex.clone(),
                    is_coinbase: true,
                    coinbase: vin.coinbase,
                    sequence: vin.sequence as i64,
                    vin: index as i64,
                    ..Default::default()
                })
                .await?;
            return Ok(0);
        }

        let (prev_txid, prev_n) = match (vin.txid, vin.vout) {
            (Some(txid), Some(n)) => (txid, n),
            _ => {
                return Err(IndexerError::Internal(format!(
                    "input {} of {} has neither coinbase data nor an outpoint",
                    index, ctx.txid_hex
                )))
            }
        };
        let prev_hash = prev_txid.to_hex();
        let output = self.resolve_output(ctx, index, &prev_hash, prev_n).await?;

        let address_id = match output.addresses().first() {
            Some(address) => {
                ledger.debit(address, output.value);
                Some(self.db().addresses().find_or_create(address, Some(ctx.time)).await?)
            }
            None => None,
        };

        let input_id = inputs
            .put(&InputRow {
                transaction_id: ctx.transaction_id,
                transaction_hash: ctx.txid_hex.clone(),
                is_coinbase: false,
                prevout_hash: prev_hash.clone(),
                prevout_n: prev_n as i64,
                input_address_id: address_id,
                coinbase: None,
                script_sig_hex: vin.script_sig.map(|s| s.hex).unwrap_or_default(),
                sequence: vin.sequence as i64,
                value: output.value,
                vin: index as i64,
                ..Default::default()
            })
            .await?;
        self.db().outputs().mark_spent(output.id, input_id).await?;

        let claims = self.db().claims().mark_spent_at(&prev_hash, prev_n as i64).await?;
        let supports = self.db().supports().mark_spent_at(&prev_hash, prev_n as i64).await?;
        if claims + supports > 0 {
            debug!("{}:{} spent by {} ({} claims, {} supports)", prev_hash, prev_n, ctx.txid_hex, claims, supports);
        }

        Ok(output.value)
    }

    /// Find the spent output, waiting a little for a same-block commit to
    /// become visible before declaring it missing
    async fn resolve_output(&self, ctx: &TxContext, index: usize, prev_hash: &str, prev_n: u32) -> Result<OutputRow> {
        let outputs = self.db().outputs();
        let retry = self.retry();
        for attempt in 1..=retry.attempts {
            if let Some(output) = outputs.get(prev_hash, prev_n as i64).await? {
                return Ok(output);
            }
            if attempt < retry.attempts {
                debug!("{}:{} not visible yet (attempt {}/{})", prev_hash, prev_n, attempt, retry.attempts);
                tokio::time::sleep(retry.delay(attempt)).await;
            }
        }
        Err(IndexerError::MissingOutput {
            txid: prev_hash.to_string(),
            vout: prev_n,
            spender: ctx.txid_hex.clone(),
            vin: index,
        })
    }
}
