//! Transaction level ingestion

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use claim_hashes::Hash;
use database::{TransactionAddressRow, TransactionRow, MEMPOOL_BLOCK_HASH};
use rpc_core::{RawTransaction, Vin};

use crate::error::{IndexerError, Result};
use crate::pool::run_bounded;
use crate::processing::ledger::{to_base_units, Ledger};
use crate::processing::vout::output_addresses;
use crate::processing::Pipeline;

/// Where an indexed transaction lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Block { hash: Hash, height: u64, time: i64 },
    /// Unconfirmed; `height` is the chain height when the node accepted it
    Mempool { height: u64, time: i64 },
}

impl Placement {
    pub fn block_hash(&self) -> String {
        match self {
            Placement::Block { hash, .. } => hash.to_hex(),
            Placement::Mempool { .. } => MEMPOOL_BLOCK_HASH.to_string(),
        }
    }

    pub fn height(&self) -> u64 {
        match self {
            Placement::Block { height, .. } | Placement::Mempool { height, .. } => *height,
        }
    }

    pub fn time(&self) -> i64 {
        match self {
            Placement::Block { time, .. } | Placement::Mempool { time, .. } => *time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub transaction_id: i64,
    pub inputs: usize,
    pub outputs: usize,
    /// Sum of resolved input values, base units
    pub input_total: i64,
    /// Sum of output values, base units
    pub output_total: i64,
}

/// What the input and output workers of one transaction share
#[derive(Debug)]
pub(crate) struct TxContext {
    pub txid: Hash,
    pub txid_hex: String,
    pub transaction_id: i64,
    pub height: i64,
    pub time: i64,
    /// In a block rather than the mempool
    pub confirmed: bool,
}

impl Pipeline {
    /// Index one transaction under the block lock
    pub async fn process_transaction(&self, txid: &Hash, placement: Placement) -> Result<TransactionOutcome> {
        let _guard = self.block_lock().acquire().await;
        self.index_transaction(txid, placement).await
    }

    /// Index one transaction. The caller holds the block lock.
    ///
    /// Inputs are settled before outputs so that an update spending its own
    /// claim leaves the claim re-opened at the new outpoint.
    pub(crate) async fn index_transaction(&self, txid: &Hash, placement: Placement) -> Result<TransactionOutcome> {
        let rpc = self.rpc();
        let raw = self.retry().run("getrawtransaction", || rpc.get_raw_transaction(txid)).await?;

        if matches!(placement, Placement::Mempool { .. }) {
            self.db().blocks().ensure_mempool_block().await?;
        }

        let output_total: i64 = raw.vout.iter().map(|v| to_base_units(v.value)).sum();
        let transaction_id = self
            .db()
            .transactions()
            .put(&TransactionRow {
                hash: raw.txid.to_hex(),
                block_hash: Some(placement.block_hash()),
                version: raw.version,
                lock_time: raw.lock_time as i64,
                raw: raw.hex.clone(),
                input_count: raw.vin.len() as i64,
                output_count: raw.vout.len() as i64,
                value: output_total,
                fee: 0,
                transaction_time: Some(placement.time()),
                ..Default::default()
            })
            .await?;

        let ctx = Arc::new(TxContext {
            txid: raw.txid,
            txid_hex: raw.txid.to_hex(),
            transaction_id,
            height: placement.height() as i64,
            time: placement.time(),
            confirmed: !matches!(placement, Placement::Mempool { .. }),
        });
        self.prepare_addresses(&raw, &ctx).await?;

        let ledger = Arc::new(Ledger::new());

        let vins: Vec<(usize, Vin)> = raw.vin.iter().cloned().enumerate().collect();
        let (pipeline, shared_ctx, shared_ledger) = (self.clone(), ctx.clone(), ledger.clone());
        let input_values = run_bounded(vins, self.workers(), move |(index, vin)| {
            let (pipeline, ctx, ledger) = (pipeline.clone(), shared_ctx.clone(), shared_ledger.clone());
            async move { pipeline.process_vin(&ctx, index, vin, &ledger).await }
        })
        .await
        .into_result_preferring(IndexerError::is_fatal)?;

        let vouts = raw.vout.clone();
        let (pipeline, shared_ctx, shared_ledger) = (self.clone(), ctx.clone(), ledger.clone());
        run_bounded(vouts, self.workers(), move |vout| {
            let (pipeline, ctx, ledger) = (pipeline.clone(), shared_ctx.clone(), shared_ledger.clone());
            async move { pipeline.process_vout(&ctx, vout, &ledger).await }
        })
        .await
        .into_result_preferring(IndexerError::is_fatal)?;

        self.flush_ledger(&ctx, &ledger).await?;

        let input_total: i64 = input_values.iter().sum();
        if !raw.is_coinbase() {
            self.db().transactions().set_fee(transaction_id, input_total - output_total).await?;
        }

        debug!("Indexed transaction {} ({} in, {} out)", ctx.txid_hex, raw.vin.len(), raw.vout.len());
        Ok(TransactionOutcome {
            transaction_id,
            inputs: raw.vin.len(),
            outputs: raw.vout.len(),
            input_total,
            output_total,
        })
    }

    /// Create the address rows the workers will touch before they run, so
    /// concurrent workers only ever find them
    async fn prepare_addresses(&self, raw: &RawTransaction, ctx: &TxContext) -> Result<()> {
        let mut found = BTreeSet::new();
        for vout in &raw.vout {
            found.extend(output_addresses(&ctx.txid_hex, vout, self.network())?);
        }

        let outputs = self.db().outputs();
        for vin in raw.vin.iter().filter(|v| !v.is_coinbase()) {
            if let (Some(txid), Some(n)) = (vin.txid, vin.vout) {
                if let Some(output) = outputs.get(&txid.to_hex(), n as i64).await? {
                    found.extend(output.addresses());
                }
            }
        }

        let addresses = self.db().addresses();
        for address in found {
            addresses.find_or_create(&address, Some(ctx.time)).await?;
        }
        Ok(())
    }

    /// Write one TransactionAddress row per touched address and refresh
    /// those balances. Totals are overwritten, never added to.
    async fn flush_ledger(&self, ctx: &TxContext, ledger: &Ledger) -> Result<()> {
        let addresses = self.db().addresses();
        let mut address_ids = Vec::new();
        for (address, entry) in ledger.entries() {
            let address_id = addresses.find_or_create(&address, Some(ctx.time)).await?;
            addresses
                .put_transaction_address(&TransactionAddressRow {
                    transaction_id: ctx.transaction_id,
                    address_id,
                    credit_amount: entry.credit,
                    debit_amount: entry.debit,
                    latest_transaction_time: Some(ctx.time),
                })
                .await?;
            address_ids.push(address_id);
        }
        addresses.resync_balances(&address_ids).await?;
        Ok(())
    }
}
