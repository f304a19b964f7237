//! # In-Memory Transactional Store
//!
//! Optimistic serializable isolation over a `BTreeMap`.
//!
//! Every committed write bumps a global version and stamps the written keys
//! (deletes leave a stamp too). A read-write transaction records the keys and
//! ranges it read; at commit it aborts with `StoreError::Conflict` if any of
//! them carries a stamp newer than the version it started at.
//!
//! Stamps are kept only while an open read-write transaction started before
//! them; closing a transaction drops every stamp at or below the oldest
//! remaining start version.
//!
//! Read-only transactions hold the read lock for their whole duration and so
//! see one consistent state.

use super::{overlay_range, WriteSet};
use crate::domain::errors::StoreError;
use crate::ports::outbound::{KvTransaction, TransactionalStore};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Default)]
struct Inner {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    stamps: BTreeMap<Vec<u8>, u64>,
    version: u64,
    /// Start versions of open read-write transactions, with their count.
    readers: BTreeMap<u64, usize>,
}

impl Inner {
    fn open_reader(&mut self) -> u64 {
        *self.readers.entry(self.version).or_insert(0) += 1;
        self.version
    }

    fn close_reader(&mut self, read_version: u64) {
        if let Some(count) = self.readers.get_mut(&read_version) {
            *count -= 1;
            if *count == 0 {
                self.readers.remove(&read_version);
            }
        }
        let floor = self.readers.keys().next().copied().unwrap_or(self.version);
        self.stamps.retain(|_, stamp| *stamp > floor);
    }

    fn range(&self, begin: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        if begin >= end {
            return Vec::new();
        }
        self.data
            .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn changed_since(&self, key: &[u8], version: u64) -> bool {
        self.stamps.get(key).is_some_and(|stamp| *stamp > version)
    }

    fn range_changed_since(&self, begin: &[u8], end: &[u8], version: u64) -> bool {
        if begin >= end {
            return false;
        }
        self.stamps
            .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            .any(|(_, stamp)| *stamp > version)
    }
}

/// In-memory ordered store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryKvStore {
    inner: RwLock<Inner>,
}

impl InMemoryKvStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    /// True when no key is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Committed version counter.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }
}

impl TransactionalStore for InMemoryKvStore {
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let read_version = self.inner.write().open_reader();
        let mut txn = OptimisticTransaction {
            store: self,
            read_version,
            _open: OpenReader {
                store: self,
                read_version,
            },
            read_keys: Vec::new(),
            read_ranges: Vec::new(),
            writes: BTreeMap::new(),
        };
        let value = f(&mut txn)?;
        txn.commit()?;
        Ok(value)
    }

    fn read_transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut txn = SnapshotTransaction {
            inner: self.inner.read(),
            writes: BTreeMap::new(),
        };
        f(&mut txn)
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Registration of an open read-write transaction, released on drop.
struct OpenReader<'a> {
    store: &'a InMemoryKvStore,
    read_version: u64,
}

impl Drop for OpenReader<'_> {
    fn drop(&mut self) {
        self.store.inner.write().close_reader(self.read_version);
    }
}

struct OptimisticTransaction<'a> {
    store: &'a InMemoryKvStore,
    read_version: u64,
    _open: OpenReader<'a>,
    read_keys: Vec<Vec<u8>>,
    read_ranges: Vec<(Vec<u8>, Vec<u8>)>,
    writes: WriteSet,
}

impl OptimisticTransaction<'_> {
    fn commit(self) -> Result<(), StoreError> {
        let mut inner = self.store.inner.write();
        let conflicted = self
            .read_keys
            .iter()
            .any(|key| inner.changed_since(key, self.read_version))
            || self
                .read_ranges
                .iter()
                .any(|(begin, end)| inner.range_changed_since(begin, end, self.read_version));
        if conflicted {
            return Err(StoreError::Conflict);
        }
        if self.writes.is_empty() {
            return Ok(());
        }

        inner.version += 1;
        let version = inner.version;
        for (key, value) in self.writes {
            match value {
                Some(v) => {
                    inner.data.insert(key.clone(), v);
                }
                None => {
                    inner.data.remove(&key);
                }
            }
            inner.stamps.insert(key, version);
        }
        Ok(())
    }
}

impl KvTransaction for OptimisticTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.writes.get(key) {
            return Ok(value.clone());
        }
        self.read_keys.push(key.to_vec());
        Ok(self.store.inner.read().data.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn clear(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        limit: Option<usize>,
        reverse: bool,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.read_ranges.push((begin.to_vec(), end.to_vec()));
        let committed = self.store.inner.read().range(begin, end);
        Ok(overlay_range(committed, &self.writes, begin, end, limit, reverse))
    }
}

struct SnapshotTransaction<'a> {
    inner: RwLockReadGuard<'a, Inner>,
    writes: WriteSet,
}

impl KvTransaction for SnapshotTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.writes.get(key) {
            return Ok(value.clone());
        }
        Ok(self.inner.data.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn clear(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        limit: Option<usize>,
        reverse: bool,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let committed = self.inner.range(begin, end);
        Ok(overlay_range(committed, &self.writes, begin, end, limit, reverse))
    }
}
