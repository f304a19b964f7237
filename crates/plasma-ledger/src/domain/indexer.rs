//! # UTXO Indexer
//!
//! Derives the store keys a transaction consumes and produces.
//!
//! ```text
//! UTXO key (61)  = owner(20) ‖ block(4 BE) ‖ tx(4 BE) ‖ out(1) ‖ value(32 BE)
//! short key (9)  = block(4 BE) ‖ tx(4 BE) ‖ out-or-input(1)
//! ```
//!
//! The value is part of the UTXO key, so an existence check also proves the
//! amount.

use super::errors::{LedgerError, Result};
use super::transaction::{
    u256_to_bytes, SignedTransaction, ADDRESS_LENGTH, BLOCK_NUMBER_LENGTH, OUTPUT_NUMBER_LENGTH,
    TRANSACTION_NUMBER_LENGTH, VALUE_LENGTH,
};
use plasma_crypto::{Address, CryptoWorkerPool};
use primitive_types::U256;

/// Full UTXO key length
pub const UTXO_KEY_LENGTH: usize =
    ADDRESS_LENGTH + BLOCK_NUMBER_LENGTH + TRANSACTION_NUMBER_LENGTH + OUTPUT_NUMBER_LENGTH + VALUE_LENGTH;

/// Short (coordinates only) key length
pub const SHORT_KEY_LENGTH: usize =
    BLOCK_NUMBER_LENGTH + TRANSACTION_NUMBER_LENGTH + OUTPUT_NUMBER_LENGTH;

/// 61-byte UTXO key
pub type UtxoKey = [u8; UTXO_KEY_LENGTH];

/// 9-byte coordinates key
pub type ShortKey = [u8; SHORT_KEY_LENGTH];

/// Key of the UTXO consumed by input `index`, owned by the recovered sender.
pub fn key_for_input(
    tx: &SignedTransaction,
    index: usize,
    pool: &CryptoWorkerPool,
) -> Result<UtxoKey> {
    let input = tx.inputs().get(index).ok_or(LedgerError::IndexOutOfRange {
        kind: "input",
        index,
        len: tx.inputs().len(),
    })?;
    let sender = tx.sender(pool)?;
    Ok(pack_utxo_key(
        &sender,
        input.block_number,
        input.transaction_number,
        input.output_number,
        &input.value,
    ))
}

/// Keys of every input, in input order.
pub fn keys_for_inputs(tx: &SignedTransaction, pool: &CryptoWorkerPool) -> Result<Vec<UtxoKey>> {
    (0..tx.inputs().len())
        .map(|i| key_for_input(tx, i, pool))
        .collect()
}

/// Key of output `index` once `tx` sits at (`block_number`, `transaction_number`).
pub fn key_for_output(
    tx: &SignedTransaction,
    block_number: u32,
    transaction_number: u32,
    index: usize,
) -> Result<UtxoKey> {
    let output = tx.outputs().get(index).ok_or(LedgerError::IndexOutOfRange {
        kind: "output",
        index,
        len: tx.outputs().len(),
    })?;
    Ok(pack_utxo_key(
        &output.to,
        block_number,
        transaction_number,
        output.output_number,
        &output.value,
    ))
}

/// Coordinates of the output referenced by input `index`.
pub fn short_key_for_input(tx: &SignedTransaction, index: usize) -> Result<ShortKey> {
    let input = tx.inputs().get(index).ok_or(LedgerError::IndexOutOfRange {
        kind: "input",
        index,
        len: tx.inputs().len(),
    })?;
    Ok(pack_short_key(
        input.block_number,
        input.transaction_number,
        input.output_number,
    ))
}

/// Coordinates of output `index` once `tx` sits at (`block_number`, `transaction_number`).
pub fn short_key_for_output(
    tx: &SignedTransaction,
    block_number: u32,
    transaction_number: u32,
    index: usize,
) -> Result<ShortKey> {
    let output = tx.outputs().get(index).ok_or(LedgerError::IndexOutOfRange {
        kind: "output",
        index,
        len: tx.outputs().len(),
    })?;
    Ok(pack_short_key(
        block_number,
        transaction_number,
        output.output_number,
    ))
}

/// Assemble a UTXO key from its parts.
pub fn pack_utxo_key(
    owner: &Address,
    block_number: u32,
    transaction_number: u32,
    output_number: u8,
    value: &U256,
) -> UtxoKey {
    let mut key = [0u8; UTXO_KEY_LENGTH];
    key[..20].copy_from_slice(owner);
    key[20..24].copy_from_slice(&block_number.to_be_bytes());
    key[24..28].copy_from_slice(&transaction_number.to_be_bytes());
    key[28] = output_number;
    key[29..].copy_from_slice(&u256_to_bytes(value));
    key
}

/// Assemble a short key.
pub fn pack_short_key(block_number: u32, transaction_number: u32, number: u8) -> ShortKey {
    let mut key = [0u8; SHORT_KEY_LENGTH];
    key[..4].copy_from_slice(&block_number.to_be_bytes());
    key[4..8].copy_from_slice(&transaction_number.to_be_bytes());
    key[8] = number;
    key
}

/// Split a short key into (block, tx, number).
pub fn parse_short_key(bytes: &[u8]) -> Option<(u32, u32, u8)> {
    if bytes.len() != SHORT_KEY_LENGTH {
        return None;
    }
    let block = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let tx = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Some((block, tx, bytes[8]))
}

/// Decoded parts of a UTXO key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtxoDetails {
    /// Owner address
    pub owner: Address,
    /// Creating block
    pub block_number: u32,
    /// Creating transaction position
    pub transaction_number: u32,
    /// Output index
    pub output_number: u8,
    /// Amount
    pub value: U256,
}

impl UtxoDetails {
    /// Parse a 61-byte key.
    pub fn from_key(key: &UtxoKey) -> Self {
        let mut owner = [0u8; 20];
        owner.copy_from_slice(&key[..20]);
        Self {
            owner,
            block_number: u32::from_be_bytes([key[20], key[21], key[22], key[23]]),
            transaction_number: u32::from_be_bytes([key[24], key[25], key[26], key[27]]),
            output_number: key[28],
            value: U256::from_big_endian(&key[29..]),
        }
    }

    /// Re-encode as a key.
    pub fn to_key(&self) -> UtxoKey {
        pack_utxo_key(
            &self.owner,
            self.block_number,
            self.transaction_number,
            self.output_number,
            &self.value,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{split_tx, TestKey};

    #[test]
    fn test_input_key_layout() {
        let pool = CryptoWorkerPool::new(1);
        let alice = TestKey::new(1);
        let tx = split_tx(&alice, &pool, (0x0102_0304, 0x0a0b_0c0d, 2), 500, &[([9; 20], 500)]);

        let key = key_for_input(&tx, 0, &pool).unwrap();
        assert_eq!(&key[..20], &alice.address);
        assert_eq!(&key[20..24], &[1, 2, 3, 4]);
        assert_eq!(&key[24..28], &[0x0a, 0x0b, 0x0c, 0x0d]);
        assert_eq!(key[28], 2);
        assert_eq!(U256::from_big_endian(&key[29..]), U256::from(500u64));
    }

    #[test]
    fn test_output_key_layout() {
        let pool = CryptoWorkerPool::new(1);
        let tx = split_tx(
            &TestKey::new(1),
            &pool,
            (1, 0, 0),
            30,
            &[([7; 20], 10), ([8; 20], 20)],
        );
        let key = key_for_output(&tx, 12, 34, 1).unwrap();
        let details = UtxoDetails::from_key(&key);
        assert_eq!(details.owner, [8; 20]);
        assert_eq!(details.block_number, 12);
        assert_eq!(details.transaction_number, 34);
        assert_eq!(details.output_number, 1);
        assert_eq!(details.value, U256::from(20u64));
        assert_eq!(details.to_key(), key);
    }

    #[test]
    fn test_index_out_of_range() {
        let pool = CryptoWorkerPool::new(1);
        let tx = split_tx(&TestKey::new(1), &pool, (1, 0, 0), 5, &[([7; 20], 5)]);
        assert_eq!(
            key_for_output(&tx, 1, 0, 1),
            Err(LedgerError::IndexOutOfRange {
                kind: "output",
                index: 1,
                len: 1
            })
        );
        assert!(matches!(
            key_for_input(&tx, 3, &pool),
            Err(LedgerError::IndexOutOfRange { kind: "input", .. })
        ));
        assert!(short_key_for_input(&tx, 1).is_err());
    }

    #[test]
    fn test_short_keys() {
        let pool = CryptoWorkerPool::new(1);
        let tx = split_tx(&TestKey::new(1), &pool, (3, 4, 5), 5, &[([7; 20], 5)]);
        assert_eq!(short_key_for_input(&tx, 0).unwrap(), pack_short_key(3, 4, 5));
        assert_eq!(
            short_key_for_output(&tx, 9, 8, 0).unwrap(),
            [0, 0, 0, 9, 0, 0, 0, 8, 0]
        );
        assert_eq!(parse_short_key(&pack_short_key(3, 4, 5)), Some((3, 4, 5)));
        assert_eq!(parse_short_key(&[0; 8]), None);
    }
}
