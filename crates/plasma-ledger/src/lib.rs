//! # Plasma Ledger Engine
//!
//! The operator-side ledger of a Plasma-style UTXO chain: it accepts signed
//! spending transactions, stores them in global counter order, assembles them
//! into Merkle-committed signed blocks and persists each block's outputs.
//!
//! ## Flow
//!
//! ```text
//! raw tx ──decode/validate/policy──→ check inputs ──counter──→ write_spending
//!                                                                  │
//!                 ┌──────────── records in window [n<<32, (n+1)<<32)
//!                 ↓
//!             assemble(n) ──sign──→ Block ──→ write_block(n) ──→ outputs spendable
//! ```
//!
//! ## Ledger Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Single Spend | A UTXO key is cleared by at most one committed record |
//! | Slot Uniqueness | A counter slot holds at most one record |
//! | Window Sealing | After `assemble(n)` no new record lands in block `n` |
//! | Sequential Writes | Block `n` is written only after block `n - 1` |
//! | Resumable Writes | A half-written block resumes at its high-water mark |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Wire formats, validation, keys, Merkle tree, blocks
//! - `ports/` - Inbound `LedgerApi`, outbound store/counter/policy traits
//! - `adapters/` - In-memory and RocksDB stores, atomic counter
//! - `service/` - `LedgerStore` operations and the async `Ledger` facade
//! - `sharding/` - Prefix router over several stores
//! - `policy.rs` - Fee and dust policy
//! - `config.rs` - Environment configuration
//!
//! ## Usage
//!
//! ```ignore
//! use plasma_ledger::{AtomicCounter, InMemoryKvStore, Ledger, LedgerApi, LedgerConfig};
//!
//! let config = LedgerConfig::from_env()?;
//! let ledger = Ledger::from_config(InMemoryKvStore::new(), AtomicCounter::new(), &config)?;
//!
//! let accepted = ledger.submit_transaction(raw).await?;
//! if let Some(block) = ledger.assemble_block(1, [0u8; 32], true).await? {
//!     ledger.write_block(block).await?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod policy;
pub mod ports;
pub mod service;
pub mod sharding;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key types for convenience
pub use adapters::{AtomicCounter, InMemoryKvStore};
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbStore};
pub use config::LedgerConfig;
pub use domain::errors::{ErrorKind, LedgerError, Result, StoreError};
pub use domain::{
    Block, BlockHeader, SignedTransaction, SpendingRecord, TransactionInput, TransactionOutput,
    TransactionType, UnsignedTransaction, UtxoDetails,
};
pub use policy::FeePolicy;
pub use ports::inbound::{AcceptedTransaction, LedgerApi, UtxoQuery};
pub use ports::outbound::{CounterSource, KvTransaction, PolicyChecker, TransactionalStore};
pub use service::{Ledger, LedgerStore};
pub use sharding::{ShardHandle, ShardRouter, ShardTable};
