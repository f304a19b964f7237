//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the ledger service requires from its host.
//!
//! The store contract is an ordered key-value space with serializable
//! multi-key transactions. A transaction that read a key (or range) changed
//! by a concurrent commit fails with [`StoreError::Conflict`] at commit time;
//! the ledger never retries it.
//!
//! Production: `RocksDbStore` (feature `rocksdb`)
//! Testing: `InMemoryKvStore`

use crate::domain::errors::{PolicyViolation, StoreError};
use crate::domain::transaction::SignedTransaction;

/// Operations available inside one store transaction.
///
/// Reads observe the transaction's own buffered writes. Writes become visible
/// to others only when the enclosing `transact` commits.
pub trait KvTransaction {
    /// Read a key.
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Buffer a write.
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Buffer a delete.
    fn clear(&mut self, key: &[u8]);

    /// Read `[begin, end)` in key order (descending when `reverse`), at most
    /// `limit` entries when given.
    fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        limit: Option<usize>,
        reverse: bool,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

/// Ordered key-value store with serializable transactions.
pub trait TransactionalStore: Send + Sync {
    /// Run `f` in a read-write transaction and commit it when `f` succeeds.
    ///
    /// An error from `f` discards every buffered write.
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError>;

    /// Run `f` against a consistent snapshot. Writes made by `f` are dropped.
    fn read_transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError>;
}

/// Process-wide monotonically increasing record counter.
///
/// The upper 32 bits are the block a record belongs to, the lower 32 bits its
/// position inside that block.
pub trait CounterSource: Send + Sync {
    /// Allocate the next counter.
    fn next_counter(&self) -> Result<u64, StoreError>;

    /// Raise the counter to at least `value`. Never lowers it.
    fn reserve_up_to(&self, value: u64) -> Result<(), StoreError>;

    /// Last allocated or reserved value.
    fn current(&self) -> Result<u64, StoreError>;
}

/// Operator acceptance rules applied after structural validation.
pub trait PolicyChecker: Send + Sync {
    /// Accept or reject a transaction.
    fn check(&self, tx: &SignedTransaction) -> Result<(), PolicyViolation>;
}
