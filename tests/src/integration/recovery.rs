//! # Interrupted Writes and Restarts
//!
//! A block writer that dies between batches must resume where it stopped,
//! and a restarted ledger must never reissue a persisted counter.

use plasma_ledger::{InMemoryKvStore, KvTransaction, StoreError, TransactionalStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Store sharing its data with other handles that fails every read-write
/// transaction once its commit budget is spent.
pub struct FlakyStore {
    inner: Arc<InMemoryKvStore>,
    commits_left: AtomicUsize,
}

impl FlakyStore {
    /// Handle on `inner` allowing `commits` successful read-write transactions.
    pub fn new(inner: Arc<InMemoryKvStore>, commits: usize) -> Self {
        Self {
            inner,
            commits_left: AtomicUsize::new(commits),
        }
    }

    /// Handle that never fails.
    pub fn reliable(inner: Arc<InMemoryKvStore>) -> Self {
        Self::new(inner, usize::MAX)
    }
}

impl TransactionalStore for FlakyStore {
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let allowed = self
            .commits_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::Backend("simulated crash".into()).into());
        }
        self.inner.transact(f)
    }

    fn read_transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn KvTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.inner.read_transact(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasma_crypto::CryptoWorkerPool;
    use plasma_ledger::adapters::counter::FIRST_COUNTER;
    use plasma_ledger::domain::indexer::pack_utxo_key;
    use plasma_ledger::domain::keys;
    use plasma_ledger::test_utils::{test_secret, OPERATOR_SEED, ZERO_HASH};
    use plasma_ledger::{
        AtomicCounter, CounterSource, FeePolicy, Ledger, LedgerApi, LedgerError, LedgerStore,
        UtxoQuery,
    };
    use primitive_types::U256;

    const BATCH: usize = 2;

    fn ledger_on(
        store: FlakyStore,
        pool: &Arc<CryptoWorkerPool>,
        counter: AtomicCounter,
    ) -> Result<Ledger<FlakyStore, AtomicCounter>, LedgerError> {
        Ledger::new(
            LedgerStore::new(store, Arc::clone(pool), 16, BATCH),
            counter,
            Box::new(FeePolicy::permissive()),
            test_secret(OPERATOR_SEED),
            test_secret(OPERATOR_SEED),
        )
    }

    fn spendable(data: &InMemoryKvStore, owner: [u8; 20], tx: u32, value: u64) -> bool {
        let key = keys::utxo_key(&pack_utxo_key(&owner, 1, tx, 0, &U256::from(value)));
        data.read_transact(|t| t.get(&key)).unwrap() == Some(vec![keys::UTXO_SPENDABLE])
    }

    // =============================================================================
    // RESUMABLE BLOCK WRITES
    // =============================================================================

    #[tokio::test]
    async fn test_block_write_resumes_after_crash() {
        let data = Arc::new(InMemoryKvStore::new());
        let pool = Arc::new(CryptoWorkerPool::new(2));
        const DEPOSITS: u64 = 5;

        // 5 funding commits, then the first two writer batches succeed.
        let ledger = ledger_on(FlakyStore::new(Arc::clone(&data), 7), &pool, AtomicCounter::new()).unwrap();
        for deposit in 0..DEPOSITS {
            ledger
                .create_funding_transaction([0x40 + deposit as u8; 20], U256::from(10 + deposit), U256::from(deposit))
                .await
                .unwrap();
        }
        let block = ledger.assemble_block(1, ZERO_HASH, false).await.unwrap().unwrap();
        let crashed = ledger.write_block(block.clone()).await;
        assert!(matches!(crashed, Err(LedgerError::Storage(_))));
        assert_eq!(ledger.last_written_block().await.unwrap(), 0);
        assert!(spendable(&data, [0x40; 20], 0, 10));
        assert!(spendable(&data, [0x43; 20], 3, 13));
        assert!(!spendable(&data, [0x44; 20], 4, 14));

        // Restart on the same data.
        let restarted = ledger_on(
            FlakyStore::reliable(Arc::clone(&data)),
            &pool,
            AtomicCounter::starting_after((2 << 32) - 1),
        )
        .unwrap();
        let version = data.version();
        restarted.write_block(block.clone()).await.unwrap();
        assert_eq!(restarted.last_written_block().await.unwrap(), 1);
        assert!(spendable(&data, [0x44; 20], 4, 14));
        // One remaining batch plus the block number.
        assert_eq!(data.version(), version + 2);

        restarted.write_block(block).await.unwrap();
        assert_eq!(data.version(), version + 2);
    }

    #[tokio::test]
    async fn test_restart_requires_counter_past_store() {
        let data = Arc::new(InMemoryKvStore::new());
        let pool = Arc::new(CryptoWorkerPool::new(2));
        let ledger = ledger_on(FlakyStore::reliable(Arc::clone(&data)), &pool, AtomicCounter::new()).unwrap();
        let funded = ledger
            .create_funding_transaction([1; 20], U256::from(5u64), U256::zero())
            .await
            .unwrap();
        assert_eq!(funded.counter, FIRST_COUNTER);
        drop(ledger);

        let stale = ledger_on(FlakyStore::reliable(Arc::clone(&data)), &pool, AtomicCounter::new());
        assert!(matches!(
            stale,
            Err(LedgerError::CounterBehindStore { store_max, .. }) if store_max == FIRST_COUNTER
        ));

        let store_max = LedgerStore::new(FlakyStore::reliable(Arc::clone(&data)), Arc::clone(&pool), 1, 1)
            .max_counter()
            .unwrap()
            .unwrap();
        let resumed = ledger_on(
            FlakyStore::reliable(Arc::clone(&data)),
            &pool,
            AtomicCounter::starting_after(store_max),
        )
        .unwrap();
        let next = resumed
            .create_funding_transaction([2; 20], U256::from(6u64), U256::from(1u64))
            .await
            .unwrap();
        assert_eq!(next.counter, FIRST_COUNTER + 1);

        let block = resumed.assemble_block(1, ZERO_HASH, false).await.unwrap().unwrap();
        assert_eq!(block.transactions().len(), 2);
        resumed.write_block(block).await.unwrap();
        let listed = resumed.list_utxos(UtxoQuery::first_page([2; 20], 1)).await.unwrap();
        assert_eq!(listed[0].transaction_number, 1);
    }

    #[tokio::test]
    async fn test_failed_funding_leaves_nothing_behind() {
        let data = Arc::new(InMemoryKvStore::new());
        let pool = Arc::new(CryptoWorkerPool::new(2));
        let ledger = ledger_on(FlakyStore::new(Arc::clone(&data), 0), &pool, AtomicCounter::new()).unwrap();
        let result = ledger
            .create_funding_transaction([1; 20], U256::from(5u64), U256::zero())
            .await;
        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert!(data.is_empty());
        assert_eq!(
            ledger.lookup_deposit_index(U256::zero()).await,
            Err(LedgerError::NotYetProcessed)
        );
        assert!(ledger.counter().current().unwrap() >= FIRST_COUNTER);
    }
}
