//! # Ledger Service
//!
//! Ledger operations on top of a [`TransactionalStore`].
//!
//! ## Architecture
//!
//! `LedgerStore` owns the store handle, the shared crypto pool and the writer
//! permits. Its operations are split by concern:
//!
//! - `ledger_store.rs` - spending, funding, lookups and listings
//! - `assembler.rs` - collecting a block's records into a `Block`
//! - `writer.rs` - persisting an assembled block in resumable batches
//! - `ledger.rs` - the async `Ledger` facade implementing `LedgerApi`
//!
//! Every operation is blocking. Isolation comes from the store's serializable
//! transactions; no lock here spans ledger state.

mod assembler;
mod ledger;
mod ledger_store;
mod writer;

pub use ledger::Ledger;

use crate::config::LedgerConfig;
use crate::ports::outbound::TransactionalStore;
use plasma_crypto::{BoundedPool, CryptoWorkerPool};
use std::sync::Arc;

/// Ledger operations over one transactional store.
pub struct LedgerStore<S> {
    /// Backing store.
    pub(crate) store: S,
    /// Shared EC contexts.
    pub(crate) pool: Arc<CryptoWorkerPool>,
    /// Permits bounding concurrent read-write transactions.
    pub(crate) writers: BoundedPool<()>,
    /// Transactions per block-writer batch.
    pub(crate) batch_size: usize,
}

impl<S: TransactionalStore> LedgerStore<S> {
    /// Create a ledger store.
    ///
    /// Zero values for `writer_concurrency` or `batch_size` are raised to 1.
    pub fn new(
        store: S,
        pool: Arc<CryptoWorkerPool>,
        writer_concurrency: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            pool,
            writers: BoundedPool::semaphore(writer_concurrency.max(1)),
            batch_size: batch_size.max(1),
        }
    }

    /// Create with the pool sizes of `config`.
    pub fn with_config(store: S, pool: Arc<CryptoWorkerPool>, config: &LedgerConfig) -> Self {
        Self::new(
            store,
            pool,
            config.writer_concurrency,
            config.block_batch_size,
        )
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Shared crypto pool.
    pub fn pool(&self) -> &Arc<CryptoWorkerPool> {
        &self.pool
    }

    /// Transactions per writer batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
