//! # Ledger Flows
//!
//! Deposits, spends and merges across several blocks, checked through
//! listings, lookups, Merkle proofs and block serialization.

#[cfg(test)]
mod tests {
    use super::super::seal_block;
    use plasma_ledger::domain::codec;
    use plasma_ledger::domain::indexer::pack_utxo_key;
    use plasma_ledger::domain::MerkleTree;
    use plasma_ledger::test_utils::{merge_tx, split_tx, test_ledger, TestKey, ZERO_HASH};
    use plasma_ledger::{Block, LedgerApi, LedgerError, UtxoQuery};
    use primitive_types::U256;

    fn coords(utxo: &plasma_ledger::UtxoDetails) -> (u32, u32, u8) {
        (utxo.block_number, utxo.transaction_number, utxo.output_number)
    }

    // =============================================================================
    // DEPOSIT → SPLIT → MERGE
    // =============================================================================

    #[tokio::test]
    async fn test_three_block_flow() {
        let ledger = test_ledger(2);
        let pool = ledger.store().pool().clone();
        let alice = TestKey::new(1);
        let bob = TestKey::new(2);

        ledger
            .create_funding_transaction(alice.address, U256::from(1000u64), U256::from(1u64))
            .await
            .unwrap();
        ledger
            .create_funding_transaction(bob.address, U256::from(500u64), U256::from(2u64))
            .await
            .unwrap();
        let block1 = seal_block(&ledger, 1, ZERO_HASH).await;
        assert_eq!(block1.transactions().len(), 2);
        assert_eq!(ledger.lookup_deposit_index(U256::from(2u64)).await.unwrap(), (1, 1));

        let split = split_tx(&alice, &pool, (1, 0, 0), 1000, &[(bob.address, 300), (alice.address, 700)]);
        ledger.submit_transaction(codec::encode(&split)).await.unwrap();
        let block2 = seal_block(&ledger, 2, block1.header().hash()).await;
        assert_eq!(block2.header().previous_hash(), &block1.header().hash());

        let merge = merge_tx(&bob, &pool, [((1, 1, 0), 500), ((2, 0, 0), 300)], bob.address);
        ledger.submit_transaction(codec::encode(&merge)).await.unwrap();
        seal_block(&ledger, 3, block2.header().hash()).await;
        assert_eq!(ledger.last_written_block().await.unwrap(), 3);

        let bob_utxos = ledger.list_utxos(UtxoQuery::first_page(bob.address, 10)).await.unwrap();
        assert_eq!(bob_utxos.len(), 1);
        assert_eq!(coords(&bob_utxos[0]), (3, 0, 0));
        assert_eq!(bob_utxos[0].value, U256::from(800u64));

        let alice_utxos = ledger.list_utxos(UtxoQuery::first_page(alice.address, 10)).await.unwrap();
        assert_eq!(alice_utxos.len(), 1);
        assert_eq!(coords(&alice_utxos[0]), (2, 0, 1));

        assert_eq!(ledger.lookup_spending_index(1, 0, 0).await.unwrap(), (2, 0, 0));
        assert_eq!(ledger.lookup_spending_index(1, 1, 0).await.unwrap(), (3, 0, 0));
        assert_eq!(ledger.lookup_spending_index(2, 0, 0).await.unwrap(), (3, 0, 1));
        assert_eq!(
            ledger.lookup_spending_index(3, 0, 0).await,
            Err(LedgerError::NotYetProcessed)
        );
    }

    #[tokio::test]
    async fn test_spending_unwritten_output_rejected() {
        let ledger = test_ledger(4);
        let pool = ledger.store().pool().clone();
        let alice = TestKey::new(1);
        ledger
            .create_funding_transaction(alice.address, U256::from(10u64), U256::zero())
            .await
            .unwrap();

        // Block 1 is not written yet, so its outputs do not exist.
        let early = split_tx(&alice, &pool, (1, 0, 0), 10, &[([7; 20], 10)]);
        assert!(matches!(
            ledger.submit_transaction(codec::encode(&early)).await,
            Err(LedgerError::DoubleSpend { .. })
        ));

        seal_block(&ledger, 1, ZERO_HASH).await;
        ledger.submit_transaction(codec::encode(&early)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_value_is_not_spendable() {
        let ledger = test_ledger(4);
        let pool = ledger.store().pool().clone();
        let alice = TestKey::new(1);
        ledger
            .create_funding_transaction(alice.address, U256::from(10u64), U256::zero())
            .await
            .unwrap();
        seal_block(&ledger, 1, ZERO_HASH).await;

        // The value is part of the key; claiming more than the output holds misses it.
        let inflated = split_tx(&alice, &pool, (1, 0, 0), 11, &[(alice.address, 11)]);
        let missing = pack_utxo_key(&alice.address, 1, 0, 0, &U256::from(11u64));
        assert_eq!(
            ledger.submit_transaction(codec::encode(&inflated)).await,
            Err(LedgerError::DoubleSpend {
                key: hex::encode(missing)
            })
        );

        // Someone else's signature derives someone else's key.
        let mallory = TestKey::new(9);
        let stolen = split_tx(&mallory, &pool, (1, 0, 0), 10, &[(mallory.address, 10)]);
        assert!(matches!(
            ledger.submit_transaction(codec::encode(&stolen)).await,
            Err(LedgerError::DoubleSpend { .. })
        ));
    }

    // =============================================================================
    // COMMITMENTS
    // =============================================================================

    #[tokio::test]
    async fn test_block_commitments() {
        let ledger = test_ledger(4);
        for deposit in 0..5u64 {
            ledger
                .create_funding_transaction([deposit as u8 + 1; 20], U256::from(deposit + 1), U256::from(deposit))
                .await
                .unwrap();
        }
        let block = seal_block(&ledger, 1, ZERO_HASH).await;
        let pool = ledger.store().pool();
        assert_eq!(block.signer(pool).unwrap(), ledger.block_producer().unwrap());

        let root = block.header().merkle_root();
        for (index, tx) in block.transactions().iter().enumerate() {
            let proof = block.proof(index).unwrap();
            assert!(MerkleTree::verify_proof(root, &proof, &codec::encode(tx)).unwrap());
        }
        let other = codec::encode(&block.transactions()[1]);
        let proof = block.proof(0).unwrap();
        assert!(!MerkleTree::verify_proof(root, &proof, &other).unwrap());

        let parsed = Block::from_bytes(&block.serialize()).unwrap();
        assert_eq!(parsed, block);
        assert_eq!(parsed.signer(pool).unwrap(), ledger.block_producer().unwrap());
    }

    // =============================================================================
    // TELEMETRY
    // =============================================================================

    #[tokio::test]
    async fn test_flow_updates_metrics() {
        use plasma_telemetry::metrics::{
            encode_metrics, BLOCKS_WRITTEN, FUNDING_TRANSACTIONS, SPENDS_REJECTED,
        };
        use plasma_telemetry::{init_telemetry, TelemetryConfig};

        // Metric registration is process-wide; only the first call succeeds.
        let _ = init_telemetry(&TelemetryConfig::for_tests());
        let funded = FUNDING_TRANSACTIONS.get();
        let written = BLOCKS_WRITTEN.get();
        let rejected = SPENDS_REJECTED.with_label_values(&["double_spend"]).get();

        let ledger = test_ledger(4);
        let pool = ledger.store().pool().clone();
        let alice = TestKey::new(1);
        ledger
            .create_funding_transaction(alice.address, U256::from(3u64), U256::zero())
            .await
            .unwrap();
        seal_block(&ledger, 1, ZERO_HASH).await;
        let spend = split_tx(&alice, &pool, (1, 0, 0), 3, &[([5; 20], 3)]);
        ledger.submit_transaction(codec::encode(&spend)).await.unwrap();
        assert!(ledger.submit_transaction(codec::encode(&spend)).await.is_err());

        assert!(FUNDING_TRANSACTIONS.get() >= funded + 1.0);
        assert!(BLOCKS_WRITTEN.get() >= written + 1.0);
        assert!(SPENDS_REJECTED.with_label_values(&["double_spend"]).get() >= rejected + 1.0);
        assert!(encode_metrics().unwrap().contains("plasma_writer_blocks_written_total"));
    }

    // =============================================================================
    // ROCKSDB BACKEND
    // =============================================================================

    #[cfg(feature = "rocksdb")]
    #[tokio::test]
    async fn test_flow_survives_reopen_on_rocksdb() {
        use plasma_crypto::CryptoWorkerPool;
        use plasma_ledger::test_utils::{test_secret, OPERATOR_SEED};
        use plasma_ledger::{
            AtomicCounter, FeePolicy, Ledger, LedgerStore, RocksDbConfig, RocksDbStore,
        };
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let pool = Arc::new(CryptoWorkerPool::new(2));
        let open = |counter: AtomicCounter| {
            let store = RocksDbStore::open(RocksDbConfig::for_testing(path.clone())).unwrap();
            Ledger::new(
                LedgerStore::new(store, Arc::clone(&pool), 8, 2),
                counter,
                Box::new(FeePolicy::permissive()),
                test_secret(OPERATOR_SEED),
                test_secret(OPERATOR_SEED),
            )
        };

        let alice = TestKey::new(1);
        let first = open(AtomicCounter::new()).unwrap();
        for deposit in 0..3u64 {
            first
                .create_funding_transaction(alice.address, U256::from(deposit + 1), U256::from(deposit))
                .await
                .unwrap();
        }
        let block = seal_block(&first, 1, ZERO_HASH).await;
        drop(first);

        assert!(matches!(
            open(AtomicCounter::new()),
            Err(LedgerError::CounterBehindStore { .. })
        ));
        let reopened = open(AtomicCounter::starting_after((2 << 32) - 1)).unwrap();
        assert_eq!(reopened.last_written_block().await.unwrap(), 1);
        assert_eq!(reopened.lookup_deposit_index(U256::from(2u64)).await.unwrap(), (1, 2));

        let spend = split_tx(&alice, &pool, (1, 2, 0), 3, &[([6; 20], 3)]);
        let accepted = reopened.submit_transaction(codec::encode(&spend)).await.unwrap();
        assert_eq!(accepted.block_number(), 2);
        let second = seal_block(&reopened, 2, block.header().hash()).await;
        assert_eq!(second.transactions().len(), 1);
        assert_eq!(reopened.lookup_spending_index(1, 2, 0).await.unwrap(), (2, 0, 0));
    }
}
