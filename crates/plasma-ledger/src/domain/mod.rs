//! # Domain Layer
//!
//! Pure ledger logic: wire formats, validation, key derivation, Merkle
//! commitments and blocks. Nothing here touches storage.

pub mod block;
pub mod codec;
pub mod errors;
pub mod indexer;
pub mod keys;
pub mod merkle;
pub mod records;
pub mod rlp;
pub mod transaction;

pub use block::{Block, BlockHeader, BLOCK_HEADER_LENGTH};
pub use errors::*;
pub use indexer::{ShortKey, UtxoDetails, UtxoKey};
pub use merkle::MerkleTree;
pub use records::SpendingRecord;
pub use transaction::{
    SignedTransaction, TransactionInput, TransactionOutput, TransactionType, UnsignedTransaction,
};
