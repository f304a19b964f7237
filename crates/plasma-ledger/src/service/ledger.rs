//! # Ledger Facade
//!
//! Owns everything a running ledger needs (store, counter source, policy,
//! operator keys) and exposes it through the async [`LedgerApi`]. Each call
//! moves its blocking work onto tokio's blocking thread pool.

use super::LedgerStore;
use crate::config::LedgerConfig;
use crate::domain::errors::{ErrorKind, LedgerError, Result};
use crate::domain::{codec, Block, SpendingRecord, TransactionType, UtxoDetails};
use crate::ports::inbound::{AcceptedTransaction, LedgerApi, UtxoQuery};
use crate::ports::outbound::{CounterSource, PolicyChecker, TransactionalStore};
use async_trait::async_trait;
use plasma_crypto::{Address, CryptoWorkerPool, Hash, SecretKey};
use plasma_telemetry::metrics::{SPENDS_ACCEPTED, SPENDS_REJECTED};
use primitive_types::U256;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct LedgerInner<S, C> {
    store: LedgerStore<S>,
    counter: C,
    policy: Box<dyn PolicyChecker>,
    funding_key: SecretKey,
    block_key: SecretKey,
}

/// A running ledger.
///
/// Cheap to clone; clones share the same store and counter.
pub struct Ledger<S, C> {
    inner: Arc<LedgerInner<S, C>>,
}

impl<S, C> Clone for Ledger<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C> Ledger<S, C>
where
    S: TransactionalStore + 'static,
    C: CounterSource + 'static,
{
    /// Assemble a ledger.
    ///
    /// Refuses to start with `CounterBehindStore` when `counter` would hand
    /// out a counter that already holds a record.
    pub fn new(
        store: LedgerStore<S>,
        counter: C,
        policy: Box<dyn PolicyChecker>,
        funding_key: SecretKey,
        block_key: SecretKey,
    ) -> Result<Self> {
        if let Some(store_max) = store.max_counter()? {
            let current = counter.current()?;
            if current < store_max {
                return Err(LedgerError::CounterBehindStore {
                    counter: current,
                    store_max,
                });
            }
        }
        info!(
            batch_size = store.batch_size(),
            ec_concurrency = store.pool().concurrency(),
            "Ledger started"
        );
        Ok(Self {
            inner: Arc::new(LedgerInner {
                store,
                counter,
                policy,
                funding_key,
                block_key,
            }),
        })
    }

    /// Build a ledger over `store` from a validated configuration.
    pub fn from_config(store: S, counter: C, config: &LedgerConfig) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(CryptoWorkerPool::new(config.ec_concurrency));
        Self::new(
            LedgerStore::with_config(store, pool, config),
            counter,
            Box::new(config.fee_policy()?),
            config.funding_secret()?,
            config.block_secret()?,
        )
    }

    /// Underlying ledger store.
    pub fn store(&self) -> &LedgerStore<S> {
        &self.inner.store
    }

    /// Counter source.
    pub fn counter(&self) -> &C {
        &self.inner.counter
    }

    /// Address signing block headers.
    pub fn block_producer(&self) -> Result<Address> {
        Ok(self.inner.block_key.address()?)
    }

    /// Address signing funding transactions.
    pub fn funding_operator(&self) -> Result<Address> {
        Ok(self.inner.funding_key.address()?)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&LedgerInner<S, C>) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| LedgerError::TaskFailed(e.to_string()))?
    }
}

impl<S, C> LedgerInner<S, C>
where
    S: TransactionalStore,
    C: CounterSource,
{
    fn submit(&self, raw: &[u8]) -> Result<AcceptedTransaction> {
        let transaction = codec::decode(raw)?;
        codec::validate(&transaction)?;
        if transaction.tx_type() == TransactionType::Fund {
            return Err(LedgerError::FundingNotSpendable);
        }
        self.policy.check(&transaction)?;
        self.store.check_utxos_exist(&transaction)?;

        let counter = self.counter.next_counter()?;
        let record = SpendingRecord::for_spend(transaction, &self.store.pool)?;
        self.store.write_spending(&record, counter)?;
        Ok(AcceptedTransaction {
            counter,
            transaction: record.transaction,
        })
    }

    fn fund(&self, to: Address, value: U256, deposit_index: U256) -> Result<AcceptedTransaction> {
        let counter = self.counter.next_counter()?;
        let transaction =
            self.store
                .create_funding_tx(to, value, counter, deposit_index, &self.funding_key)?;
        Ok(AcceptedTransaction {
            counter,
            transaction,
        })
    }

    fn assemble(&self, block_number: u32, previous_hash: Hash, start_next: bool) -> Result<Option<Block>> {
        let Some(mut block) =
            self.store
                .assemble(&self.counter, block_number, previous_hash, start_next)?
        else {
            return Ok(None);
        };
        block.sign(self.block_key.as_bytes(), &self.store.pool)?;
        Ok(Some(block))
    }
}

fn rejection_reason(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::DoubleSpend { .. } => "double_spend",
        LedgerError::StoreConflict => "conflict",
        LedgerError::Policy(_) => "policy",
        LedgerError::FundingNotSpendable => "funding",
        LedgerError::Decode(_) | LedgerError::InvalidTransaction(_) => "invalid",
        other => match other.kind() {
            ErrorKind::Cryptographic => "signature",
            ErrorKind::Storage => "storage",
            _ => "other",
        },
    }
}

#[async_trait]
impl<S, C> LedgerApi for Ledger<S, C>
where
    S: TransactionalStore + 'static,
    C: CounterSource + 'static,
{
    async fn submit_transaction(&self, raw: Vec<u8>) -> Result<AcceptedTransaction> {
        let result = self.blocking(move |inner| inner.submit(&raw)).await;
        match &result {
            Ok(accepted) => {
                SPENDS_ACCEPTED.inc();
                debug!(counter = accepted.counter, "Transaction accepted");
            }
            Err(err) => {
                let reason = rejection_reason(err);
                SPENDS_REJECTED.with_label_values(&[reason]).inc();
                if err.kind() == ErrorKind::Storage {
                    warn!(error = %err, "Transaction failed on storage");
                } else {
                    debug!(error = %err, reason, "Transaction rejected");
                }
            }
        }
        result
    }

    async fn create_funding_transaction(
        &self,
        to: Address,
        value: U256,
        deposit_index: U256,
    ) -> Result<AcceptedTransaction> {
        self.blocking(move |inner| inner.fund(to, value, deposit_index))
            .await
    }

    async fn assemble_block(
        &self,
        block_number: u32,
        previous_hash: Hash,
        start_next: bool,
    ) -> Result<Option<Block>> {
        self.blocking(move |inner| inner.assemble(block_number, previous_hash, start_next))
            .await
    }

    async fn write_block(&self, block: Block) -> Result<()> {
        self.blocking(move |inner| inner.store.write_block(&block))
            .await
    }

    async fn last_written_block(&self) -> Result<u32> {
        self.blocking(|inner| inner.store.last_written_block()).await
    }

    async fn list_utxos(&self, query: UtxoQuery) -> Result<Vec<UtxoDetails>> {
        self.blocking(move |inner| inner.store.list_utxos(&query))
            .await
    }

    async fn lookup_deposit_index(&self, deposit_index: U256) -> Result<(u32, u32)> {
        self.blocking(move |inner| inner.store.lookup_deposit_index(&deposit_index))
            .await
    }

    async fn lookup_spending_index(
        &self,
        block_number: u32,
        transaction_number: u32,
        output_number: u8,
    ) -> Result<(u32, u32, u8)> {
        self.blocking(move |inner| {
            inner
                .store
                .lookup_spending_index(block_number, transaction_number, output_number)
        })
        .await
    }
}
