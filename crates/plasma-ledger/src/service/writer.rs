//! # Block Writer
//!
//! Makes the outputs of an assembled block spendable and records which
//! transaction spent each input.
//!
//! The block is written in batches of `batch_size` transactions, one store
//! transaction each. Every batch advances the `txNumber` high-water mark, so
//! a writer that stopped half way resumes at the first unwritten batch. The
//! `blockNumber` key moves only after the last batch.

use super::LedgerStore;
use crate::domain::errors::{LedgerError, Result};
use crate::domain::indexer::{
    key_for_output, short_key_for_input, pack_short_key, ShortKey, UtxoKey,
};
use crate::domain::keys::{self, UTXO_SPENDABLE};
use crate::domain::{Block, TransactionType};
use crate::ports::outbound::TransactionalStore;
use plasma_telemetry::metrics::{BLOCKS_WRITTEN, BLOCK_WRITE_DURATION, LAST_WRITTEN_BLOCK};
use plasma_telemetry::{log_block_event, time_histogram};
use std::collections::HashSet;
use tracing::debug;

/// Store writes derived from one transaction of the block.
struct PreparedTransaction {
    number: u32,
    outputs: Vec<UtxoKey>,
    history: Vec<(ShortKey, ShortKey)>,
}

impl<S: TransactionalStore> LedgerStore<S> {
    /// Persist `block`.
    ///
    /// Writing a block at or below the last written block is a no-op.
    ///
    /// # Errors
    /// - `InvalidBlockNumber` for block 0
    /// - `OutOfOrderBlock` if an earlier block is missing
    /// - `DuplicateInput`/`DuplicateOutput` if the block reuses coordinates
    /// - `BatchOutOfOrder` if the high-water mark does not fit the batch
    pub fn write_block(&self, block: &Block) -> Result<()> {
        let block_number = block.block_number();
        if block_number == 0 {
            return Err(LedgerError::InvalidBlockNumber);
        }
        let last_written = self.last_written_block()?;
        if last_written >= block_number {
            log_block_event!(debug, "writer", "Block already written", block_number, last_written);
            return Ok(());
        }
        if u64::from(block_number) > u64::from(last_written) + 1 {
            return Err(LedgerError::OutOfOrderBlock {
                block: block_number,
                last_written,
            });
        }

        let _timer = time_histogram!(BLOCK_WRITE_DURATION);
        let prepared = prepare(block)?;
        let mut written = 0usize;
        for batch in prepared.chunks(self.batch_size) {
            if self.write_batch(block_number, batch)? {
                written += 1;
            }
        }

        let _permit = self.writers.acquire();
        let key = keys::block_number_key();
        let value = block_number.to_be_bytes();
        self.store.transact(|tx| {
            tx.set(&key, &value);
            if tx.get(&key)?.as_deref() != Some(value.as_slice()) {
                return Err(LedgerError::ReadBackMismatch("last written block"));
            }
            Ok(())
        })?;

        BLOCKS_WRITTEN.inc();
        LAST_WRITTEN_BLOCK.set(f64::from(block_number));
        log_block_event!(
            info,
            "writer",
            "Block written",
            block_number,
            transactions = prepared.len(),
            batches_written = written
        );
        Ok(())
    }

    /// Write one batch. Returns `false` when the high-water mark shows it was
    /// already written.
    fn write_batch(&self, block_number: u32, batch: &[PreparedTransaction]) -> Result<bool> {
        let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
            return Ok(false);
        };
        let (min_tx, max_tx) = (first.number, last.number);
        let hwm_key = keys::tx_number_key();
        let hwm_value = keys::encode_tx_number(block_number, max_tx);

        let _permit = self.writers.acquire();
        let applied = self.store.transact(|tx| {
            let (hwm_block, hwm_tx) = match tx.get(&hwm_key)? {
                None => (0, 0),
                Some(value) => keys::parse_tx_number(&value)
                    .ok_or_else(|| LedgerError::CorruptData("transaction high-water mark".into()))?,
            };
            let out_of_order = || LedgerError::BatchOutOfOrder {
                block: block_number,
                min_tx,
                max_tx,
                hwm_block,
                hwm_tx,
            };
            let same_block = hwm_block == block_number;
            let next_block = u64::from(hwm_block) + 1 == u64::from(block_number);
            if !same_block && !next_block {
                return Err(out_of_order());
            }
            if same_block && max_tx <= hwm_tx {
                return Ok(false);
            }
            let continues = (min_tx == 0 && next_block)
                || (same_block && u64::from(min_tx) == u64::from(hwm_tx) + 1);
            if !continues {
                return Err(out_of_order());
            }

            for prepared in batch {
                for key in &prepared.outputs {
                    tx.set(&keys::utxo_key(key), &[UTXO_SPENDABLE]);
                }
                for (origin, spender) in &prepared.history {
                    tx.set(&keys::spend_key(origin), spender);
                }
            }
            tx.set(&hwm_key, &hwm_value);
            if tx.get(&hwm_key)?.as_deref() != Some(hwm_value.as_slice()) {
                return Err(LedgerError::ReadBackMismatch("transaction high-water mark"));
            }
            Ok(true)
        })?;

        if applied {
            debug!(block_number, min_tx, max_tx, "Batch written");
        } else {
            debug!(block_number, min_tx, max_tx, "Batch already written, skipping");
        }
        Ok(applied)
    }
}

/// Derive every write of the block and reject reused coordinates.
fn prepare(block: &Block) -> Result<Vec<PreparedTransaction>> {
    let block_number = block.block_number();
    let mut spent: HashSet<ShortKey> = HashSet::new();
    let mut created: HashSet<UtxoKey> = HashSet::new();
    let mut prepared = Vec::with_capacity(block.transactions().len());

    for (index, tx) in block.transactions().iter().enumerate() {
        let number = u32::try_from(index)
            .map_err(|_| LedgerError::InvalidBlock("too many transactions in block".into()))?;

        let mut history = Vec::new();
        if tx.tx_type() != TransactionType::Fund {
            for input in 0..tx.inputs().len() {
                let origin = short_key_for_input(tx, input)?;
                if !spent.insert(origin) {
                    return Err(LedgerError::DuplicateInput);
                }
                history.push((origin, pack_short_key(block_number, number, input as u8)));
            }
        }

        let mut outputs = Vec::with_capacity(tx.outputs().len());
        for output in 0..tx.outputs().len() {
            let key = key_for_output(tx, block_number, number, output)?;
            if !created.insert(key) {
                return Err(LedgerError::DuplicateOutput);
            }
            outputs.push(key);
        }

        prepared.push(PreparedTransaction {
            number,
            outputs,
            history,
        });
    }
    Ok(prepared)
}
