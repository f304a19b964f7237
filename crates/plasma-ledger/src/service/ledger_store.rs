//! # Spending, Funding and Lookups
//!
//! Each write is a single serializable transaction. Double spends surface as
//! `DoubleSpend` when the loser reads after the winner committed, or as
//! `StoreConflict` when both read before either committed. Neither is retried.

use super::LedgerStore;
use crate::domain::errors::{LedgerError, Result};
use crate::domain::indexer::{
    keys_for_inputs, pack_short_key, pack_utxo_key, parse_short_key, UtxoDetails, UtxoKey,
};
use crate::domain::keys::{self, KeyPrefix, COUNTER_KEY_LENGTH, UTXO_SPENDABLE};
use crate::domain::transaction::{
    SignedTransaction, TransactionInput, TransactionOutput, TransactionType, UnsignedTransaction,
};
use crate::domain::{codec, SpendingRecord};
use crate::ports::inbound::UtxoQuery;
use crate::ports::outbound::{KvTransaction, TransactionalStore};
use plasma_crypto::{Address, SecretKey};
use plasma_telemetry::metrics::FUNDING_TRANSACTIONS;
use primitive_types::U256;
use tracing::debug;

impl<S: TransactionalStore> LedgerStore<S> {
    /// Atomically consume the record's inputs and store it under `counter`.
    ///
    /// Fails with `DoubleSpend` if any consumed key is not ready for spending
    /// and with `CounterReused` if the slot is taken. Nothing is written on
    /// failure.
    pub fn write_spending(&self, record: &SpendingRecord, counter: u64) -> Result<()> {
        let record_key = keys::counter_key(counter);
        let encoded = record.encode();
        let utxo_keys: Vec<Vec<u8>> = record.consumed.iter().map(keys::utxo_key).collect();

        let _permit = self.writers.acquire();
        self.store.transact(|tx| {
            for (key, consumed) in utxo_keys.iter().zip(&record.consumed) {
                ensure_spendable(tx, key, consumed)?;
            }
            if tx.get(&record_key)?.is_some() {
                return Err(LedgerError::CounterReused(counter));
            }
            for key in &utxo_keys {
                tx.clear(key);
            }
            tx.set(&record_key, &encoded);
            if tx.get(&record_key)?.as_deref() != Some(encoded.as_slice()) {
                return Err(LedgerError::ReadBackMismatch("spending record"));
            }
            Ok(())
        })?;

        debug!(counter, inputs = record.consumed.len(), "Spending record written");
        Ok(())
    }

    /// Check, without writing, that every input of `tx` is ready for spending.
    ///
    /// Funding transactions have no spendable inputs and always pass.
    pub fn check_utxos_exist(&self, tx: &SignedTransaction) -> Result<()> {
        if tx.tx_type() == TransactionType::Fund {
            return Ok(());
        }
        let consumed = keys_for_inputs(tx, &self.pool)?;
        self.store.read_transact(|txn| {
            for key in &consumed {
                ensure_spendable(txn, &keys::utxo_key(key), key)?;
            }
            Ok(())
        })
    }

    /// Sign a Fund transaction crediting `value` to `to` and store it under
    /// `counter`, marking `deposit_index` as processed.
    pub fn create_funding_tx(
        &self,
        to: Address,
        value: U256,
        counter: u64,
        deposit_index: U256,
        funding_key: &SecretKey,
    ) -> Result<SignedTransaction> {
        let unsigned = UnsignedTransaction::new(
            TransactionType::Fund,
            vec![TransactionInput::new(0, 0, 0, U256::zero())],
            vec![TransactionOutput::new(0, to, value)],
        );
        let signed = unsigned.sign(funding_key.as_bytes(), &self.pool)?;
        codec::validate(&signed)?;

        let record = SpendingRecord::for_funding(signed);
        let encoded = record.encode();
        let deposit_key = keys::deposit_key(&deposit_index);
        let record_key = keys::counter_key(counter);
        let counter_bytes = counter.to_be_bytes();

        let _permit = self.writers.acquire();
        self.store.transact(|tx| {
            if tx.get(&deposit_key)?.is_some() {
                return Err(LedgerError::DuplicateFunding(deposit_index.to_string()));
            }
            if tx.get(&record_key)?.is_some() {
                return Err(LedgerError::CounterReused(counter));
            }
            tx.set(&deposit_key, &counter_bytes);
            tx.set(&record_key, &encoded);
            if tx.get(&record_key)?.as_deref() != Some(encoded.as_slice()) {
                return Err(LedgerError::ReadBackMismatch("funding record"));
            }
            if tx.get(&deposit_key)?.as_deref() != Some(counter_bytes.as_slice()) {
                return Err(LedgerError::ReadBackMismatch("deposit index"));
            }
            Ok(())
        })?;

        FUNDING_TRANSACTIONS.inc();
        debug!(counter, deposit = %deposit_index, "Funding transaction written");
        Ok(record.transaction)
    }

    /// `(block, position)` of the funding record of `deposit_index`.
    ///
    /// The position is the number of records stored before it in its block
    /// window, which is where the block writer places it. Counters burned by
    /// failed writes leave no record and do not count.
    pub fn lookup_deposit_index(&self, deposit_index: &U256) -> Result<(u32, u32)> {
        let key = keys::deposit_key(deposit_index);
        self.store.read_transact(|tx| {
            let value = tx.get(&key)?.ok_or(LedgerError::NotYetProcessed)?;
            let counter = keys::parse_counter_value(&value).ok_or_else(|| {
                LedgerError::CorruptData(format!("deposit {} counter", deposit_index))
            })?;
            let block_number = (counter >> 32) as u32;
            let (begin, _) = block_window(block_number);
            let preceding = tx
                .get_range(&begin, &keys::counter_key(counter), None, false)?
                .iter()
                .filter(|(key, _)| key.len() == COUNTER_KEY_LENGTH)
                .count();
            let position = u32::try_from(preceding)
                .map_err(|_| LedgerError::CorruptData(format!("block {} record count", block_number)))?;
            Ok((block_number, position))
        })
    }

    /// `(block, tx, input)` that spent output `(block, tx, out)`.
    pub fn lookup_spending_index(
        &self,
        block_number: u32,
        transaction_number: u32,
        output_number: u8,
    ) -> Result<(u32, u32, u8)> {
        let key = keys::spend_key(&pack_short_key(block_number, transaction_number, output_number));
        let value = self
            .store
            .read_transact(|tx| Ok::<_, LedgerError>(tx.get(&key)?))?
            .ok_or(LedgerError::NotYetProcessed)?;
        parse_short_key(&value).ok_or_else(|| {
            LedgerError::CorruptData(format!(
                "spend history of {}/{}/{}",
                block_number, transaction_number, output_number
            ))
        })
    }

    /// Spendable outputs of `query.owner` strictly after `query.after`, in
    /// key order.
    pub fn list_utxos(&self, query: &UtxoQuery) -> Result<Vec<UtxoDetails>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }
        let (block, tx, out) = query.after;
        // Past every value at the `after` coordinates.
        let mut begin = keys::utxo_key(&pack_utxo_key(&query.owner, block, tx, out, &U256::MAX));
        begin.push(0);
        let end = keys::utxo_owner_upper_bound(&query.owner);

        self.store.read_transact(|txn| {
            let mut found = Vec::new();
            let mut cursor = begin;
            while found.len() < query.limit {
                let wanted = query.limit - found.len();
                let page = txn.get_range(&cursor, &end, Some(wanted), false)?;
                let exhausted = page.len() < wanted;
                if let Some((last, _)) = page.last() {
                    cursor = last.clone();
                    cursor.push(0);
                }
                found.extend(page.iter().filter_map(|(key, value)| spendable_details(key, value)));
                if exhausted {
                    break;
                }
            }
            Ok(found)
        })
    }

    /// Highest counter holding a record, if any.
    pub fn max_counter(&self) -> Result<Option<u64>> {
        let begin = keys::counter_key(0);
        let mut end = keys::counter_key(u64::MAX);
        end.push(0);
        self.store.read_transact(|tx| {
            let last = tx.get_range(&begin, &end, Some(1), true)?;
            match last.first() {
                None => Ok(None),
                Some((key, _)) => keys::parse_counter_key(key)
                    .map(Some)
                    .ok_or_else(|| LedgerError::CorruptData(format!("counter key {}", hex::encode(key)))),
            }
        })
    }

    /// Number of the last fully written block, 0 when none.
    pub fn last_written_block(&self) -> Result<u32> {
        let key = keys::block_number_key();
        self.store
            .read_transact(|tx| Ok::<_, LedgerError>(tx.get(&key)?))?
            .map(|value| {
                keys::parse_block_number(&value)
                    .ok_or_else(|| LedgerError::CorruptData("last written block".into()))
            })
            .transpose()
            .map(Option::unwrap_or_default)
    }

    /// Records stored for `block_number`, in counter order.
    pub(crate) fn records_in_block(
        tx: &mut dyn KvTransaction,
        block_number: u32,
        limit: Option<usize>,
    ) -> Result<Vec<(u64, Vec<u8>)>> {
        let (begin, end) = block_window(block_number);
        Ok(tx
            .get_range(&begin, &end, limit, false)?
            .into_iter()
            .filter(|(key, _)| key.len() == COUNTER_KEY_LENGTH)
            .filter_map(|(key, value)| keys::parse_counter_key(&key).map(|counter| (counter, value)))
            .collect())
    }
}

/// `[ctr(block << 32), ctr((block << 32) | 0xffffffff)]` as a half-open range.
fn block_window(block_number: u32) -> (Vec<u8>, Vec<u8>) {
    let first = u64::from(block_number) << 32;
    let mut end = keys::counter_key(first | 0xffff_ffff);
    end.push(0);
    (keys::counter_key(first), end)
}

fn ensure_spendable(tx: &mut dyn KvTransaction, key: &[u8], consumed: &UtxoKey) -> Result<()> {
    match tx.get(key)? {
        Some(value) if value == [UTXO_SPENDABLE] => Ok(()),
        _ => Err(LedgerError::DoubleSpend {
            key: hex::encode(consumed),
        }),
    }
}

fn spendable_details(key: &[u8], value: &[u8]) -> Option<UtxoDetails> {
    if value != [UTXO_SPENDABLE] {
        return None;
    }
    let raw: UtxoKey = key.strip_prefix(KeyPrefix::Utxo.as_bytes())?.try_into().ok()?;
    Some(UtxoDetails::from_key(&raw))
}
