//! # Store Key Layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `utxo` ‖ utxo_key(61) | `[0x01]` spendable, `[0x00]` known but not spendable |
//! | `ctr` ‖ counter(8 BE) | spending record |
//! | `spend` ‖ short_key(9) | short key of the spending input |
//! | `deposit` ‖ index(32 BE) | counter(8 BE) of the funding record |
//! | `blockNumber` | last fully written block (4 BE) |
//! | `txNumber` | batch high-water mark: block(4 BE) ‖ tx(4 BE) |

use super::indexer::{ShortKey, UtxoKey};
use super::transaction::u256_to_bytes;
use primitive_types::U256;

/// Marker stored under a spendable UTXO key.
pub const UTXO_SPENDABLE: u8 = 0x01;

/// Marker for a UTXO key that exists but may not be spent.
pub const UTXO_NOT_SPENDABLE: u8 = 0x00;

/// Counter slot width.
pub const COUNTER_LENGTH: usize = 8;

/// Length of a `ctr` key.
pub const COUNTER_KEY_LENGTH: usize = 3 + COUNTER_LENGTH;

/// Key families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    /// UTXO existence
    Utxo,
    /// Spending record by counter
    Counter,
    /// Spending history by output coordinates
    Spend,
    /// Funding counter by deposit index
    Deposit,
    /// Last written block
    BlockNumber,
    /// Writer batch high-water mark
    TxNumber,
}

impl KeyPrefix {
    /// Byte prefix.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Utxo => b"utxo",
            KeyPrefix::Counter => b"ctr",
            KeyPrefix::Spend => b"spend",
            KeyPrefix::Deposit => b"deposit",
            KeyPrefix::BlockNumber => b"blockNumber",
            KeyPrefix::TxNumber => b"txNumber",
        }
    }

    /// Prefix followed by `suffix`.
    pub fn key(&self, suffix: &[u8]) -> Vec<u8> {
        let prefix = self.as_bytes();
        let mut key = Vec::with_capacity(prefix.len() + suffix.len());
        key.extend_from_slice(prefix);
        key.extend_from_slice(suffix);
        key
    }
}

/// `utxo` ‖ key
pub fn utxo_key(key: &UtxoKey) -> Vec<u8> {
    KeyPrefix::Utxo.key(key)
}

/// `ctr` ‖ counter
pub fn counter_key(counter: u64) -> Vec<u8> {
    KeyPrefix::Counter.key(&counter.to_be_bytes())
}

/// `spend` ‖ short key
pub fn spend_key(short: &ShortKey) -> Vec<u8> {
    KeyPrefix::Spend.key(short)
}

/// `deposit` ‖ index
pub fn deposit_key(deposit_index: &U256) -> Vec<u8> {
    KeyPrefix::Deposit.key(&u256_to_bytes(deposit_index))
}

/// `blockNumber`
pub fn block_number_key() -> Vec<u8> {
    KeyPrefix::BlockNumber.as_bytes().to_vec()
}

/// `txNumber`
pub fn tx_number_key() -> Vec<u8> {
    KeyPrefix::TxNumber.as_bytes().to_vec()
}

/// Counter encoded in a `ctr` key, if the key has the right shape.
pub fn parse_counter_key(key: &[u8]) -> Option<u64> {
    let suffix = key.strip_prefix(KeyPrefix::Counter.as_bytes())?;
    let bytes: [u8; COUNTER_LENGTH] = suffix.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Decode an 8-byte big-endian counter value.
pub fn parse_counter_value(value: &[u8]) -> Option<u64> {
    let bytes: [u8; COUNTER_LENGTH] = value.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Encode the `txNumber` high-water mark.
pub fn encode_tx_number(block_number: u32, transaction_number: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&block_number.to_be_bytes());
    out[4..].copy_from_slice(&transaction_number.to_be_bytes());
    out
}

/// Decode the `txNumber` high-water mark.
pub fn parse_tx_number(value: &[u8]) -> Option<(u32, u32)> {
    if value.len() != 8 {
        return None;
    }
    Some((
        u32::from_be_bytes([value[0], value[1], value[2], value[3]]),
        u32::from_be_bytes([value[4], value[5], value[6], value[7]]),
    ))
}

/// Decode the `blockNumber` value.
pub fn parse_block_number(value: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = value.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Smallest key strictly above every `utxo` key owned by `owner`.
///
/// The address is incremented as a 20-byte big-endian integer; the all-`ff`
/// address maps to the first key past the `utxo` family.
pub fn utxo_owner_upper_bound(owner: &[u8; 20]) -> Vec<u8> {
    let mut next = *owner;
    for byte in next.iter_mut().rev() {
        let (value, overflow) = byte.overflowing_add(1);
        *byte = value;
        if !overflow {
            let mut key = KeyPrefix::Utxo.key(&next);
            key.extend_from_slice(&[0u8; 41]);
            return key;
        }
    }
    // "utxo" + 1 on the last byte
    let mut key = KeyPrefix::Utxo.as_bytes().to_vec();
    if let Some(last) = key.last_mut() {
        *last += 1;
    }
    key
}
