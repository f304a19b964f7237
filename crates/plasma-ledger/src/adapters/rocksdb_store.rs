//! # RocksDB Store Adapter
//!
//! Persistent [`TransactionalStore`] on RocksDB optimistic transactions.
//!
//! - Point reads inside `transact` use `get_for_update`, so a concurrent
//!   commit to a read key fails this commit with `StoreError::Conflict`
//! - Writes are buffered and applied just before commit
//! - `read_transact` reads from a DB snapshot
//!
//! RocksDB does not track range reads for conflicts. The ledger only scans
//! ranges in read-only paths.

use super::{overlay_range, writes_in_range, WriteSet};
use crate::domain::errors::StoreError;
use crate::ports::outbound::{KvTransaction, TransactionalStore};
use rocksdb::{
    Direction, ErrorKind, IteratorMode, OptimisticTransactionDB, OptimisticTransactionOptions,
    Options, SnapshotWithThreadMode, Transaction, WriteOptions,
};
use std::collections::BTreeMap;
use tracing::info;

/// RocksDB settings.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Database directory
    pub path: String,
    /// Block cache size in bytes (default: 256MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 64MB)
    pub write_buffer_size: usize,
    /// fsync on every commit (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/plasma".to_string(),
            block_cache_size: 256 * 1024 * 1024,
            write_buffer_size: 64 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed transactional store.
pub struct RocksDbStore {
    db: OptimisticTransactionDB,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create the database at `config.path`.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = OptimisticTransactionDB::open(&opts, &config.path)
            .map_err(|e| StoreError::Backend(format!("Failed to open RocksDB: {}", e)))?;
        info!(path = %config.path, "Opened RocksDB ledger store");
        Ok(Self { db, config })
    }

    /// Settings used to open the store.
    pub fn config(&self) -> &RocksDbConfig {
        &self.config
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

fn map_error(err: rocksdb::Error) -> StoreError {
    match err.kind() {
        ErrorKind::Busy | ErrorKind::TryAgain => StoreError::Conflict,
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Scan `[begin, end)` from a RocksDB iterator source.
fn scan<I>(
    iter: I,
    begin: &[u8],
    end: &[u8],
    limit: usize,
    reverse: bool,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>
where
    I: Iterator<Item = Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>>,
{
    let mut out = Vec::new();
    if begin >= end {
        return Ok(out);
    }
    for item in iter {
        if out.len() >= limit {
            break;
        }
        let (key, value) = item.map_err(map_error)?;
        if reverse {
            if &*key >= end {
                continue;
            }
            if &*key < begin {
                break;
            }
        } else if &*key >= end {
            break;
        }
        out.push((key.into_vec(), value.into_vec()));
    }
    Ok(out)
}

fn scan_mode<'k>(begin: &'k [u8], end: &'k [u8], reverse: bool) -> IteratorMode<'k> {
    if reverse {
        IteratorMode::From(end, Direction::Reverse)
    } else {
        IteratorMode::From(begin, Direction::Forward)
    }
}

fn fetch_limit(writes: &WriteSet, begin: &[u8], end: &[u8], limit: Option<usize>) -> usize {
    limit
        .map(|l| l.saturating_add(writes_in_range(writes, begin, end)))
        .unwrap_or(usize::MAX)
}

impl TransactionalStore for RocksDbStore {
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut txn_opts = OptimisticTransactionOptions::new();
        txn_opts.set_snapshot(true);
        let mut txn = RocksTransaction {
            txn: self.db.transaction_opt(&self.write_options(), &txn_opts),
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
        let mut txn = RocksSnapshot {
            snapshot: self.db.snapshot(),
            writes: BTreeMap::new(),
        };
        f(&mut txn)
    }
}

struct RocksTransaction<'db> {
    txn: Transaction<'db, OptimisticTransactionDB>,
    writes: WriteSet,
}

impl RocksTransaction<'_> {
    fn commit(self) -> Result<(), StoreError> {
        for (key, value) in &self.writes {
            match value {
                Some(v) => self.txn.put(key, v).map_err(map_error)?,
                None => self.txn.delete(key).map_err(map_error)?,
            }
        }
        self.txn.commit().map_err(map_error)
    }
}

impl KvTransaction for RocksTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.writes.get(key) {
            return Ok(value.clone());
        }
        self.txn.get_for_update(key, true).map_err(map_error)
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
        let fetch = fetch_limit(&self.writes, begin, end, limit);
        let iter = self.txn.iterator(scan_mode(begin, end, reverse));
        let committed = scan(iter, begin, end, fetch, reverse)?;
        Ok(overlay_range(committed, &self.writes, begin, end, limit, reverse))
    }
}

struct RocksSnapshot<'db> {
    snapshot: SnapshotWithThreadMode<'db, OptimisticTransactionDB>,
    writes: WriteSet,
}

impl KvTransaction for RocksSnapshot<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(value) = self.writes.get(key) {
            return Ok(value.clone());
        }
        self.snapshot.get(key).map_err(map_error)
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
        let fetch = fetch_limit(&self.writes, begin, end, limit);
        let iter = self.snapshot.iterator(scan_mode(begin, end, reverse));
        let committed = scan(iter, begin, end, fetch, reverse)?;
        Ok(overlay_range(committed, &self.writes, begin, end, limit, reverse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RocksDbStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let store = RocksDbStore::open(RocksDbConfig::for_testing(path)).unwrap();
        (dir, store)
    }

    #[test]
    fn test_commit_and_read() {
        let (_dir, store) = open_temp();
        store
            .transact(|tx| {
                tx.set(b"ctr1", b"a");
                tx.set(b"ctr2", b"b");
                tx.set(b"ctr3", b"c");
                Ok::<_, StoreError>(())
            })
            .unwrap();
        let value = store.read_transact(|tx| tx.get(b"ctr2")).unwrap();
        assert_eq!(value, Some(b"b".to_vec()));

        let last = store
            .read_transact(|tx| tx.get_range(b"ctr", b"cts", Some(1), true))
            .unwrap();
        assert_eq!(last, vec![(b"ctr3".to_vec(), b"c".to_vec())]);

        let forward = store
            .read_transact(|tx| tx.get_range(b"ctr1", b"ctr3", None, false))
            .unwrap();
        assert_eq!(forward.len(), 2);
    }

    #[test]
    fn test_conflicting_commit() {
        let (_dir, store) = open_temp();
        store
            .transact(|tx| {
                tx.set(b"coin", &[1]);
                Ok::<_, StoreError>(())
            })
            .unwrap();
        let result = store.transact(|tx| {
            let _ = tx.get(b"coin")?;
            store
                .transact(|inner| {
                    inner.clear(b"coin");
                    Ok::<_, StoreError>(())
                })
                .unwrap();
            tx.clear(b"coin");
            Ok::<_, StoreError>(())
        });
        assert_eq!(result, Err(StoreError::Conflict));
    }
}
