//! # Double-Spend Races
//!
//! Many clients submit conflicting spends of one output at the same time.
//! Exactly one may win, whatever the interleaving.

#[cfg(test)]
mod tests {
    use super::super::seal_block;
    use plasma_ledger::domain::codec;
    use plasma_ledger::test_utils::{split_tx, test_ledger, TestKey, ZERO_HASH};
    use plasma_ledger::{LedgerApi, UtxoQuery};
    use primitive_types::U256;
    use std::collections::HashSet;

    const CLIENTS: u8 = 32;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_double_spend_single_winner() {
        let ledger = test_ledger(16);
        let pool = ledger.store().pool().clone();
        let alice = TestKey::new(1);
        ledger
            .create_funding_transaction(alice.address, U256::from(1_000u64), U256::zero())
            .await
            .unwrap();
        seal_block(&ledger, 1, ZERO_HASH).await;

        let mut handles = Vec::new();
        for client in 0..CLIENTS {
            let tx = split_tx(&alice, &pool, (1, 0, 0), 1_000, &[([client; 20], 1_000)]);
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.submit_transaction(codec::encode(&tx)).await
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(accepted) => winners.push(accepted),
                Err(err) => assert!(err.is_conflict(), "unexpected rejection: {err}"),
            }
        }
        assert_eq!(winners.len(), 1);

        let block = seal_block(&ledger, 2, ZERO_HASH).await;
        assert_eq!(block.transactions().len(), 1);
        assert_eq!(block.transactions()[0], winners[0].transaction);

        let owners: usize = {
            let mut total = 0;
            for client in 0..CLIENTS {
                total += ledger
                    .list_utxos(UtxoQuery::first_page([client; 20], 4))
                    .await
                    .unwrap()
                    .len();
            }
            total
        };
        assert_eq!(owners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_independent_spends_all_accepted() {
        let ledger = test_ledger(16);
        let pool = ledger.store().pool().clone();
        let owners: Vec<TestKey> = (1..=16u8).map(TestKey::new).collect();
        for (i, owner) in owners.iter().enumerate() {
            ledger
                .create_funding_transaction(owner.address, U256::from(100u64), U256::from(i as u64))
                .await
                .unwrap();
        }
        seal_block(&ledger, 1, ZERO_HASH).await;

        let mut handles = Vec::new();
        for (i, owner) in owners.iter().enumerate() {
            let tx = split_tx(owner, &pool, (1, i as u32, 0), 100, &[([0xee; 20], 100)]);
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.submit_transaction(codec::encode(&tx)).await
            }));
        }
        let mut counters = HashSet::new();
        for handle in handles {
            let accepted = handle.await.unwrap().unwrap();
            assert_eq!(accepted.block_number(), 2);
            assert!(counters.insert(accepted.counter));
        }

        let block = seal_block(&ledger, 2, ZERO_HASH).await;
        assert_eq!(block.transactions().len(), owners.len());
        let received = ledger
            .list_utxos(UtxoQuery::first_page([0xee; 20], 100))
            .await
            .unwrap();
        assert_eq!(received.len(), owners.len());
    }
}
