//! # Integration Tests
//!
//! Whole-ledger scenarios driven through the public API only.

pub mod double_spend;
pub mod flows;
pub mod recovery;
pub mod sharded;

use plasma_ledger::{Block, Ledger, LedgerApi, TransactionalStore};
use plasma_ledger::CounterSource;

/// Assemble and write the next block, returning it. Panics if the block is empty.
pub async fn seal_block<S, C>(
    ledger: &Ledger<S, C>,
    block_number: u32,
    previous_hash: [u8; 32],
) -> Block
where
    S: TransactionalStore + 'static,
    C: CounterSource + 'static,
{
    let block = ledger
        .assemble_block(block_number, previous_hash, false)
        .await
        .expect("assemble")
        .expect("block has records");
    ledger.write_block(block.clone()).await.expect("write block");
    block
}
