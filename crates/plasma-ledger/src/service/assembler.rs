//! # Block Assembly
//!
//! Seals the counter window of a block and builds an unsigned `Block` from the
//! records stored in it.
//!
//! Block `n` owns counters `[n << 32, (n + 1) << 32)`. Assembly moves the
//! counter source to the last counter of the window, so every later spend
//! lands in block `n + 1` or above.

use super::LedgerStore;
use crate::domain::errors::{LedgerError, Result};
use crate::domain::indexer::UtxoKey;
use crate::domain::{Block, SpendingRecord};
use crate::ports::outbound::{CounterSource, TransactionalStore};
use plasma_crypto::Hash;
use plasma_telemetry::metrics::{BLOCKS_ASSEMBLED, BLOCK_ASSEMBLY_DURATION};
use plasma_telemetry::{log_block_event, time_histogram};
use std::collections::HashSet;

impl<S: TransactionalStore> LedgerStore<S> {
    /// Assemble block `block_number` on top of `previous_hash`.
    ///
    /// Without `start_next` an empty window is left open and `None` is
    /// returned. With `start_next` the window is sealed regardless, and `None`
    /// still means the block holds no records.
    ///
    /// # Errors
    /// - `InvalidBlockNumber` for block 0
    /// - `CounterRegression` if the counter source did not advance
    /// - `DuplicateInput` if two records consume the same UTXO
    pub fn assemble<C>(
        &self,
        counter: &C,
        block_number: u32,
        previous_hash: Hash,
        start_next: bool,
    ) -> Result<Option<Block>>
    where
        C: CounterSource + ?Sized,
    {
        if block_number == 0 {
            return Err(LedgerError::InvalidBlockNumber);
        }
        let _timer = time_histogram!(BLOCK_ASSEMBLY_DURATION);

        if !start_next {
            let pending = self
                .store
                .read_transact(|tx| Self::records_in_block(tx, block_number, Some(1)))?;
            if pending.is_empty() {
                log_block_event!(debug, "assembler", "No records to assemble", block_number);
                return Ok(None);
            }
        }

        let window_end = (u64::from(block_number) << 32) | 0xffff_ffff;
        counter.reserve_up_to(window_end)?;
        let current = counter.current()?;
        if current < window_end {
            return Err(LedgerError::CounterRegression {
                expected: window_end,
                actual: current,
            });
        }

        let records = self
            .store
            .read_transact(|tx| Self::records_in_block(tx, block_number, None))?;
        if records.is_empty() {
            log_block_event!(info, "assembler", "Sealed empty block window", block_number);
            return Ok(None);
        }

        let mut consumed: HashSet<UtxoKey> = HashSet::new();
        let mut transactions = Vec::with_capacity(records.len());
        for (record_counter, bytes) in records {
            let record = SpendingRecord::decode(&bytes).map_err(|e| {
                LedgerError::CorruptData(format!("record at counter {}: {}", record_counter, e))
            })?;
            for key in &record.consumed {
                if !consumed.insert(*key) {
                    return Err(LedgerError::DuplicateInput);
                }
            }
            transactions.push(record.transaction);
        }

        let block = Block::new(block_number, transactions, previous_hash)?;
        BLOCKS_ASSEMBLED.inc();
        log_block_event!(
            info,
            "assembler",
            "Block assembled",
            block_number,
            transactions = block.transactions().len()
        );
        Ok(Some(block))
    }
}
