//! # Adapters
//!
//! - `memory` - In-memory optimistic store (tests, single process)
//! - `counter` - Atomic in-process counter source
//! - `rocksdb_store` - Persistent store on RocksDB optimistic transactions (feature `rocksdb`)

pub mod counter;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

pub use counter::AtomicCounter;
pub use memory::InMemoryKvStore;
#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbConfig, RocksDbStore};

use std::collections::BTreeMap;
use std::ops::Bound;

/// Buffered writes of one transaction; `None` marks a delete.
pub(crate) type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Number of buffered writes falling in `[begin, end)`.
#[cfg(feature = "rocksdb")]
pub(crate) fn writes_in_range(writes: &WriteSet, begin: &[u8], end: &[u8]) -> usize {
    if begin >= end {
        return 0;
    }
    writes
        .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
        .count()
}

/// Merge committed entries of `[begin, end)` with the transaction's own writes.
pub(crate) fn overlay_range(
    committed: Vec<(Vec<u8>, Vec<u8>)>,
    writes: &WriteSet,
    begin: &[u8],
    end: &[u8],
    limit: Option<usize>,
    reverse: bool,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = committed.into_iter().collect();
    if begin < end {
        for (key, value) in writes.range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end))) {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
    }
    let limit = limit.unwrap_or(usize::MAX);
    if reverse {
        merged.into_iter().rev().take(limit).collect()
    } else {
        merged.into_iter().take(limit).collect()
    }
}
