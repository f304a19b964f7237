//! # Shard Router
//!
//! Partitions the key space over several stores by a one-byte routing key.
//!
//! The layout is a `:`-separated list of `start-end->shard` ranges, for
//! example `0-127->0:128-255->1`. Together the ranges must assign each of the
//! 256 prefixes exactly once. Every distinct shard number gets one store and
//! its own permit pool bounding concurrent transactions on that store.

use crate::domain::errors::{ConfigError, LedgerError, StoreError};
use crate::ports::outbound::{KvTransaction, TransactionalStore};
use plasma_crypto::BoundedPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Number of routing prefixes
pub const PREFIX_COUNT: usize = 256;

/// Prefix-to-shard assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardTable {
    assignments: Vec<u64>,
}

impl ShardTable {
    /// Parse a layout string.
    pub fn parse(layout: &str) -> Result<Self, ConfigError> {
        let mut slots: Vec<Option<u64>> = vec![None; PREFIX_COUNT];
        for range in layout.split(':') {
            let (start, end, shard) = parse_range(range)?;
            if start > end {
                return Err(ConfigError::InvalidShardRange(range.to_string()));
            }
            for prefix in start..=end {
                let slot = &mut slots[prefix as usize];
                if slot.is_some() {
                    return Err(ConfigError::DuplicatePrefix(prefix));
                }
                *slot = Some(shard);
            }
        }

        let covered = slots.iter().filter(|s| s.is_some()).count();
        let assignments: Vec<u64> = slots.into_iter().flatten().collect();
        if covered != PREFIX_COUNT || assignments.len() != PREFIX_COUNT {
            return Err(ConfigError::IncompleteCoverage(covered));
        }
        Ok(Self { assignments })
    }

    /// Shard serving `prefix`.
    pub fn shard_for(&self, prefix: u8) -> u64 {
        self.assignments[prefix as usize]
    }

    /// Distinct shard numbers, ascending.
    pub fn shards(&self) -> Vec<u64> {
        let mut shards = self.assignments.clone();
        shards.sort_unstable();
        shards.dedup();
        shards
    }
}

fn parse_range(range: &str) -> Result<(u8, u8, u64), ConfigError> {
    let invalid = || ConfigError::InvalidShardRange(range.to_string());
    let (span, shard) = range.trim().split_once("->").ok_or_else(invalid)?;
    let (start, end) = span.split_once('-').ok_or_else(invalid)?;
    let start: u8 = start.parse().map_err(|_| invalid())?;
    let end: u8 = end.parse().map_err(|_| invalid())?;
    let shard: u64 = shard.parse().map_err(|_| invalid())?;
    Ok((start, end, shard))
}

struct Shard<S> {
    number: u64,
    store: S,
    permits: BoundedPool<()>,
}

/// One shard's store behind its permit pool.
pub struct ShardHandle<S> {
    shard: Arc<Shard<S>>,
}

impl<S> Clone for ShardHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shard: Arc::clone(&self.shard),
        }
    }
}

impl<S> ShardHandle<S> {
    /// Shard number.
    pub fn number(&self) -> u64 {
        self.shard.number
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.shard.store
    }
}

impl<S: TransactionalStore> TransactionalStore for ShardHandle<S> {
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _permit = self.shard.permits.acquire();
        self.shard.store.transact(f)
    }

    fn read_transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _permit = self.shard.permits.acquire();
        self.shard.store.read_transact(f)
    }
}

/// Routes transactions to shards by a one-byte key.
pub struct ShardRouter<S> {
    table: ShardTable,
    shards: BTreeMap<u64, ShardHandle<S>>,
}

impl<S: TransactionalStore> ShardRouter<S> {
    /// Open one store per distinct shard number with `open`.
    pub fn new<F>(table: ShardTable, concurrency: usize, mut open: F) -> Result<Self, StoreError>
    where
        F: FnMut(u64) -> Result<S, StoreError>,
    {
        let mut shards = BTreeMap::new();
        for number in table.shards() {
            debug!(shard = number, concurrency, "Opening shard store");
            let shard = Shard {
                number,
                store: open(number)?,
                permits: BoundedPool::semaphore(concurrency.max(1)),
            };
            shards.insert(
                number,
                ShardHandle {
                    shard: Arc::new(shard),
                },
            );
        }
        info!(shards = shards.len(), "Shard router ready");
        Ok(Self { table, shards })
    }

    /// Parse `layout` and open the shards.
    pub fn from_layout<F>(layout: &str, concurrency: usize, open: F) -> Result<Self, LedgerError>
    where
        F: FnMut(u64) -> Result<S, StoreError>,
    {
        let table = ShardTable::parse(layout)?;
        Ok(Self::new(table, concurrency, open)?)
    }

    /// Handle for the shard owning `shard_key`.
    pub fn route(&self, shard_key: &[u8]) -> Result<ShardHandle<S>, LedgerError> {
        let [prefix] = shard_key else {
            return Err(LedgerError::InvalidShardKey(shard_key.len()));
        };
        let number = self.table.shard_for(*prefix);
        self.shards
            .get(&number)
            .cloned()
            .ok_or_else(|| LedgerError::Storage(StoreError::Backend(format!("shard {} is not open", number))))
    }

    /// Read-write transaction on the shard owning `shard_key`.
    pub fn transact<T, E, F>(&self, shard_key: &[u8], f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError> + From<LedgerError>,
    {
        self.route(shard_key)?.transact(f)
    }

    /// Read-only transaction on the shard owning `shard_key`.
    pub fn read_transact<T, E, F>(&self, shard_key: &[u8], f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError> + From<LedgerError>,
    {
        self.route(shard_key)?.read_transact(f)
    }

    /// Prefix assignment.
    pub fn table(&self) -> &ShardTable {
        &self.table
    }

    /// Number of open stores.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
