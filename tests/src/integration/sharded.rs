//! # Ledgers on Shards
//!
//! Each shard handle is a complete store; ledgers running on different
//! shards share nothing but the signing pool.

#[cfg(test)]
mod tests {
    use super::super::seal_block;
    use plasma_crypto::CryptoWorkerPool;
    use plasma_ledger::domain::codec;
    use plasma_ledger::test_utils::{split_tx, test_secret, TestKey, OPERATOR_SEED, ZERO_HASH};
    use plasma_ledger::{
        AtomicCounter, FeePolicy, InMemoryKvStore, Ledger, LedgerApi, LedgerError, LedgerStore,
        ShardHandle, ShardRouter, UtxoQuery,
    };
    use primitive_types::U256;
    use std::sync::Arc;

    type ShardLedger = Ledger<ShardHandle<InMemoryKvStore>, AtomicCounter>;

    fn shard_ledger(router: &ShardRouter<InMemoryKvStore>, prefix: u8, pool: &Arc<CryptoWorkerPool>) -> ShardLedger {
        let handle = router.route(&[prefix]).unwrap();
        Ledger::new(
            LedgerStore::new(handle, Arc::clone(pool), 8, 4),
            AtomicCounter::new(),
            Box::new(FeePolicy::permissive()),
            test_secret(OPERATOR_SEED),
            test_secret(OPERATOR_SEED),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_shards_keep_independent_chains() {
        let router = ShardRouter::from_layout("0-127->0:128-255->1", 4, |_| Ok(InMemoryKvStore::new())).unwrap();
        let pool = Arc::new(CryptoWorkerPool::new(2));
        let low = shard_ledger(&router, 0, &pool);
        let high = shard_ledger(&router, 200, &pool);
        let alice = TestKey::new(1);

        low.create_funding_transaction(alice.address, U256::from(40u64), U256::zero())
            .await
            .unwrap();
        seal_block(&low, 1, ZERO_HASH).await;

        // The same deposit index is free on the other shard.
        high.create_funding_transaction(alice.address, U256::from(60u64), U256::zero())
            .await
            .unwrap();
        assert_eq!(low.last_written_block().await.unwrap(), 1);
        assert_eq!(high.last_written_block().await.unwrap(), 0);
        assert!(high
            .list_utxos(UtxoQuery::first_page(alice.address, 10))
            .await
            .unwrap()
            .is_empty());

        seal_block(&high, 1, ZERO_HASH).await;
        let on_low = low.list_utxos(UtxoQuery::first_page(alice.address, 10)).await.unwrap();
        let on_high = high.list_utxos(UtxoQuery::first_page(alice.address, 10)).await.unwrap();
        assert_eq!(on_low.len(), 1);
        assert_eq!(on_high.len(), 1);
        assert_eq!(on_low[0].value, U256::from(40u64));
        assert_eq!(on_high[0].value, U256::from(60u64));
    }

    #[tokio::test]
    async fn test_spend_is_local_to_its_shard() {
        let router = ShardRouter::from_layout("0-127->0:128-255->1", 4, |_| Ok(InMemoryKvStore::new())).unwrap();
        let pool = Arc::new(CryptoWorkerPool::new(2));
        let low = shard_ledger(&router, 1, &pool);
        let high = shard_ledger(&router, 255, &pool);
        let alice = TestKey::new(1);

        low.create_funding_transaction(alice.address, U256::from(10u64), U256::zero())
            .await
            .unwrap();
        seal_block(&low, 1, ZERO_HASH).await;

        let tx = split_tx(&alice, &pool, (1, 0, 0), 10, &[([3; 20], 10)]);
        assert!(matches!(
            high.submit_transaction(codec::encode(&tx)).await,
            Err(LedgerError::DoubleSpend { .. })
        ));
        let accepted = low.submit_transaction(codec::encode(&tx)).await.unwrap();
        assert_eq!(accepted.block_number(), 2);
    }

    #[tokio::test]
    async fn test_prefixes_sharing_a_number_share_a_ledger() {
        let router = ShardRouter::from_layout("0-99->7:100-199->8:200-255->7", 2, |_| Ok(InMemoryKvStore::new()))
            .unwrap();
        let pool = Arc::new(CryptoWorkerPool::new(2));
        let first = shard_ledger(&router, 10, &pool);
        first
            .create_funding_transaction([9; 20], U256::from(1u64), U256::from(5u64))
            .await
            .unwrap();

        let again = router.route(&[230]).unwrap();
        assert_eq!(again.number(), 7);
        let store = LedgerStore::new(again, Arc::clone(&pool), 1, 1);
        assert_eq!(store.max_counter().unwrap(), Some(1 << 32));
        assert_eq!(store.lookup_deposit_index(&U256::from(5u64)).unwrap(), (1, 0));

        let other = LedgerStore::new(router.route(&[150]).unwrap(), Arc::clone(&pool), 1, 1);
        assert_eq!(other.max_counter().unwrap(), None);
        assert!(matches!(
            other.lookup_deposit_index(&U256::from(5u64)),
            Err(LedgerError::NotYetProcessed)
        ));
    }
}
