//! Fixture builders shared by unit tests and the `plasma-tests` crate.

use crate::adapters::{AtomicCounter, InMemoryKvStore};
use crate::domain::indexer::pack_utxo_key;
use crate::domain::keys::{utxo_key, UTXO_SPENDABLE};
use crate::domain::transaction::{
    SignedTransaction, TransactionInput, TransactionOutput, TransactionType, UnsignedTransaction,
};
use crate::domain::LedgerError;
use crate::policy::FeePolicy;
use crate::ports::outbound::TransactionalStore;
use crate::service::{Ledger, LedgerStore};
use plasma_crypto::{keccak256, Address, CryptoWorkerPool, SecretKey};
use primitive_types::U256;
use std::sync::Arc;

/// Seed of the key signing funding transactions and blocks in test ledgers.
pub const OPERATOR_SEED: u8 = 100;

/// Hash used as the parent of block 1.
pub const ZERO_HASH: [u8; 32] = [0; 32];

/// Deterministic key pair for fixtures.
#[derive(Debug)]
pub struct TestKey {
    /// Private key
    pub secret: SecretKey,
    /// Derived address
    pub address: Address,
}

impl TestKey {
    /// Key derived from `keccak256([seed])`.
    pub fn new(seed: u8) -> Self {
        let secret = test_secret(seed);
        let address = secret.address().expect("address derivation");
        Self { secret, address }
    }

    /// The operator key of test ledgers.
    pub fn operator() -> Self {
        Self::new(OPERATOR_SEED)
    }
}

/// Secret derived from `keccak256([seed])`.
pub fn test_secret(seed: u8) -> SecretKey {
    SecretKey::from_slice(&keccak256(&[seed])).expect("valid test key")
}

/// In-memory ledger store with a two-context crypto pool.
pub fn test_ledger_store(batch_size: usize) -> LedgerStore<InMemoryKvStore> {
    LedgerStore::new(
        InMemoryKvStore::new(),
        Arc::new(CryptoWorkerPool::new(2)),
        64,
        batch_size,
    )
}

/// In-memory ledger without fees, operated by [`TestKey::operator`].
pub fn test_ledger(batch_size: usize) -> Ledger<InMemoryKvStore, AtomicCounter> {
    test_ledger_with_policy(batch_size, FeePolicy::permissive())
}

/// In-memory ledger with the given policy.
pub fn test_ledger_with_policy(
    batch_size: usize,
    policy: FeePolicy,
) -> Ledger<InMemoryKvStore, AtomicCounter> {
    Ledger::new(
        test_ledger_store(batch_size),
        AtomicCounter::new(),
        Box::new(policy),
        test_secret(OPERATOR_SEED),
        test_secret(OPERATOR_SEED),
    )
    .expect("fresh ledger")
}

/// Mark output `(block, tx, out)` of `owner` worth `value` ready for spending.
pub fn seed_utxo<S: TransactionalStore>(
    store: &S,
    owner: &Address,
    (block, tx, out): (u32, u32, u8),
    value: u64,
) {
    let key = utxo_key(&pack_utxo_key(owner, block, tx, out, &U256::from(value)));
    store
        .transact(|txn| {
            txn.set(&key, &[UTXO_SPENDABLE]);
            Ok::<_, LedgerError>(())
        })
        .expect("seed utxo");
}

/// Signed Split spending the output at `(block, tx, out)` worth `in_value`.
/// Outputs are numbered in order.
pub fn split_tx(
    key: &TestKey,
    pool: &CryptoWorkerPool,
    (block, tx, out): (u32, u32, u8),
    in_value: u64,
    outputs: &[(Address, u64)],
) -> SignedTransaction {
    let input = TransactionInput::new(block, tx, out, U256::from(in_value));
    sign(key, pool, TransactionType::Split, vec![input], outputs)
}

/// Signed Merge of two outputs into one.
pub fn merge_tx(
    key: &TestKey,
    pool: &CryptoWorkerPool,
    inputs: [((u32, u32, u8), u64); 2],
    to: Address,
) -> SignedTransaction {
    let total: u64 = inputs.iter().map(|(_, value)| value).sum();
    let inputs = inputs
        .iter()
        .map(|((block, tx, out), value)| TransactionInput::new(*block, *tx, *out, U256::from(*value)))
        .collect();
    sign(key, pool, TransactionType::Merge, inputs, &[(to, total)])
}

/// Signed Fund paying `value` to `to`.
pub fn fund_tx(key: &TestKey, pool: &CryptoWorkerPool, to: Address, value: u64) -> SignedTransaction {
    let input = TransactionInput::new(0, 0, 0, U256::zero());
    sign(key, pool, TransactionType::Fund, vec![input], &[(to, value)])
}

fn sign(
    key: &TestKey,
    pool: &CryptoWorkerPool,
    tx_type: TransactionType,
    inputs: Vec<TransactionInput>,
    outputs: &[(Address, u64)],
) -> SignedTransaction {
    let outputs = outputs
        .iter()
        .enumerate()
        .map(|(i, (to, value))| TransactionOutput::new(i as u8, *to, U256::from(*value)))
        .collect();
    UnsignedTransaction::new(tx_type, inputs, outputs)
        .sign(key.secret.as_bytes(), pool)
        .expect("fixture signing")
}
