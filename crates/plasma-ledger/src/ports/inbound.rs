//! Inbound Ports (Driving Ports)
//!
//! The API that outer layers (RPC handlers, the block producer loop) use to
//! drive the ledger.

use async_trait::async_trait;
use plasma_crypto::{Address, Hash};
use primitive_types::U256;

use crate::domain::errors::Result;
use crate::domain::{Block, SignedTransaction, UtxoDetails};

/// A transaction the ledger accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedTransaction {
    /// Global counter the record was written under
    pub counter: u64,
    /// The accepted transaction
    pub transaction: SignedTransaction,
}

impl AcceptedTransaction {
    /// Block the transaction will be assembled into.
    pub fn block_number(&self) -> u32 {
        (self.counter >> 32) as u32
    }

    /// Position inside that block's counter window.
    pub fn position(&self) -> u32 {
        (self.counter & 0xffff_ffff) as u32
    }
}

/// Page request for the spendable outputs of one owner.
///
/// Results start strictly after the `(block, tx, output)` coordinates given in
/// `after`; `(0, 0, 0)` starts from the beginning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtxoQuery {
    /// Owner address
    pub owner: Address,
    /// Exclusive lower bound on coordinates
    pub after: (u32, u32, u8),
    /// Maximum number of entries returned
    pub limit: usize,
}

impl UtxoQuery {
    /// First page of `limit` entries for `owner`.
    pub fn first_page(owner: Address, limit: usize) -> Self {
        Self {
            owner,
            after: (0, 0, 0),
            limit,
        }
    }

    /// Page following the last entry of a previous page.
    pub fn next_page(&self, last: &UtxoDetails) -> Self {
        Self {
            after: (last.block_number, last.transaction_number, last.output_number),
            ..*self
        }
    }
}

/// Primary ledger API (Driving Port)
///
/// Every method runs its blocking store and crypto work off the async
/// executor.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Decode, validate and accept a raw RLP-encoded spending transaction.
    ///
    /// # Errors
    /// - `Decode`/`InvalidTransaction`/`Policy` for bad input
    /// - `FundingNotSpendable` for a Fund transaction
    /// - `DoubleSpend` when an input is missing or already spent
    /// - `StoreConflict` when a concurrent spend of the same input won
    async fn submit_transaction(&self, raw: Vec<u8>) -> Result<AcceptedTransaction>;

    /// Credit `value` to `to` for an on-chain deposit. Each deposit index is
    /// funded at most once.
    async fn create_funding_transaction(
        &self,
        to: Address,
        value: U256,
        deposit_index: U256,
    ) -> Result<AcceptedTransaction>;

    /// Assemble and sign block `block_number` from the accepted records.
    ///
    /// Returns `None` when there is nothing to assemble. With `start_next`
    /// the counter window of the block is sealed even if it is empty.
    async fn assemble_block(
        &self,
        block_number: u32,
        previous_hash: Hash,
        start_next: bool,
    ) -> Result<Option<Block>>;

    /// Persist the outputs and spend history of an assembled block.
    async fn write_block(&self, block: Block) -> Result<()>;

    /// Number of the last fully written block, 0 when none.
    async fn last_written_block(&self) -> Result<u32>;

    /// Spendable outputs of an owner.
    async fn list_utxos(&self, query: UtxoQuery) -> Result<Vec<UtxoDetails>>;

    /// `(block, tx)` that funded `deposit_index`.
    async fn lookup_deposit_index(&self, deposit_index: U256) -> Result<(u32, u32)>;

    /// `(block, tx, input)` of the transaction that spent an output.
    async fn lookup_spending_index(
        &self,
        block_number: u32,
        transaction_number: u32,
        output_number: u8,
    ) -> Result<(u32, u32, u8)>;
}
