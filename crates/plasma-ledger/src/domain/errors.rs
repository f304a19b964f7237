//! # Domain Errors
//!
//! Every failure the ledger can report, grouped by how a caller should react.
//!
//! | Kind | Meaning | Typical reaction |
//! |------|---------|------------------|
//! | Structural | Malformed or invalid input | Reject, do not retry |
//! | Conflict | Lost a race or reused a slot | Reject; retry only with new input |
//! | Sequencing | Out-of-order block or counter | Fix ordering, then retry |
//! | Cryptographic | Signature or key failure | Reject |
//! | Storage | Backend I/O or corrupt data | Retry later |
//!
//! Backpressure is not an error: pool and semaphore acquisition block.

use plasma_crypto::CryptoError;
use primitive_types::U256;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

// =============================================================================
// ERROR KIND
// =============================================================================

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or invalid input
    Structural,
    /// Double spend, reused counter, store-level conflict
    Conflict,
    /// Ordering violation between blocks or counters
    Sequencing,
    /// Signing or recovery failure
    Cryptographic,
    /// Backend failure
    Storage,
}

// =============================================================================
// RLP
// =============================================================================

/// Canonical RLP decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RlpError {
    /// Input ended before the announced payload
    #[error("Unexpected end of input")]
    UnexpectedEnd,

    /// Bytes remain after the top-level item
    #[error("Trailing bytes after item: {0}")]
    TrailingBytes(usize),

    /// Length could have been encoded in a shorter form
    #[error("Non-canonical size encoding")]
    NonCanonicalSize,

    /// Single byte below 0x80 wrapped in a string header
    #[error("Non-canonical single byte encoding")]
    NonCanonicalSingleByte,

    /// Length prefix overflows the platform word
    #[error("Length prefix overflow")]
    LengthOverflow,

    /// Lists nested deeper than the decoder follows
    #[error("Lists nested deeper than {0} levels")]
    TooDeep(usize),

    /// Found a list where a string was required
    #[error("Expected byte string, found list")]
    ExpectedBytes,

    /// Found a string where a list was required
    #[error("Expected list, found byte string")]
    ExpectedList,
}

// =============================================================================
// DECODING & VALIDATION
// =============================================================================

/// Errors turning bytes into ledger objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Underlying RLP structure is invalid
    #[error("RLP error: {0}")]
    Rlp(#[from] RlpError),

    /// Transaction type byte is not Split, Merge or Fund
    #[error("Unknown transaction type: {0:#04x}")]
    UnknownTransactionType(u8),

    /// A fixed-width field has the wrong length
    #[error("Invalid {field} length: expected {expected}, got {actual}")]
    FieldLength {
        /// Field name
        field: &'static str,
        /// Required width
        expected: usize,
        /// Width found
        actual: usize,
    },

    /// A list has the wrong number of items
    #[error("Invalid {what} item count: expected {expected}, got {actual}")]
    ItemCount {
        /// List being decoded
        what: &'static str,
        /// Required count
        expected: usize,
        /// Count found
        actual: usize,
    },
}

/// Stateless transaction validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No inputs or no outputs
    #[error("Empty inputs or outputs")]
    Empty,

    /// Input/output count not allowed for the transaction type
    #[error("Invalid number of inputs ({inputs}) or outputs ({outputs}) for {tx_type}")]
    Arity {
        /// Transaction type name
        tx_type: &'static str,
        /// Inputs present
        inputs: usize,
        /// Outputs present
        outputs: usize,
    },

    /// Output at position `index` carries another output number
    #[error("Invalid output numbering at {index}: found {found}")]
    OutputNumbering {
        /// Position in the output list
        index: usize,
        /// Output number carried
        found: u8,
    },

    /// Funding input is not (0, 0, 0) with value 0
    #[error("Invalid funding transaction input")]
    FundingInput,

    /// Inputs and outputs do not balance
    #[error("Inputs value {inputs} is not equal to outputs value {outputs}")]
    ValueMismatch {
        /// Sum of inputs
        inputs: U256,
        /// Sum of outputs
        outputs: U256,
    },

    /// Sum exceeds 256 bits
    #[error("Value overflow")]
    ValueOverflow,
}

/// Operator policy violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    /// Output below the minimum UTXO size
    #[error("Output {index} is too small: {value} < {minimum}")]
    OutputTooSmall {
        /// Output position
        index: usize,
        /// Output value
        value: U256,
        /// Configured minimum
        minimum: U256,
    },

    /// Merge does not reduce the branching factor
    #[error("Merging transaction does not reduce the branching factor")]
    MergeBranching,

    /// Split pays no fee output
    #[error("Split transaction with less than 2 outputs and non-zero fee policy")]
    SplitWithoutFee,

    /// Last output is not addressed to the fee beneficiary
    #[error("Invalid fee recipient")]
    FeeRecipient,

    /// Fee output below `fee_per_branch * (outputs - 1)`
    #[error("Fee is too small: required {required}, paid {paid}")]
    FeeTooSmall {
        /// Required fee
        required: U256,
        /// Fee paid
        paid: U256,
    },
}

/// Merkle tree construction and proof errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    /// Tree built from zero leaves
    #[error("Cannot construct tree with no content")]
    Empty,

    /// Leaf index past the end
    #[error("Invalid leaf index {index}, tree has {leaves} leaves")]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Number of leaves
        leaves: usize,
    },

    /// Proof length is not a multiple of 33
    #[error("Invalid proof length: {0}")]
    InvalidProofLength(usize),

    /// Proof chunk side byte is neither 0x00 nor 0x01
    #[error("Invalid proof side marker: {0:#04x}")]
    InvalidProofSide(u8),
}

// =============================================================================
// STORE & CONFIG
// =============================================================================

/// Errors reported by a transactional key-value backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Serializable isolation detected a concurrent write to a key this
    /// transaction read; nothing was committed
    #[error("Transaction conflict")]
    Conflict,

    /// Backend I/O failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Environment value could not be parsed
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        /// Setting name
        name: &'static str,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Shard range does not match `start-end->shard`
    #[error("Invalid shard range: {0:?}")]
    InvalidShardRange(String),

    /// Prefix assigned to two shards
    #[error("Prefix {0} assigned more than once")]
    DuplicatePrefix(u8),

    /// Ranges do not cover every prefix
    #[error("Shard ranges cover {0} of 256 prefixes")]
    IncompleteCoverage(usize),
}

// =============================================================================
// LEDGER ERROR
// =============================================================================

/// Errors surfaced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ----- Structural -----
    /// Bytes are not a valid encoding
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Transaction violates its structural invariants
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] ValidationError),

    /// Transaction violates operator policy
    #[error("Policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    /// Merkle construction or proof failure
    #[error("Merkle error: {0}")]
    Merkle(#[from] MerkleError),

    /// Input or output index out of range
    #[error("Invalid {kind} index {index}, transaction has {len}")]
    IndexOutOfRange {
        /// "input" or "output"
        kind: &'static str,
        /// Requested index
        index: usize,
        /// Number available
        len: usize,
    },

    /// Serialized block is malformed
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Funding transactions are created by the operator only
    #[error("Funding transactions are not valid as spending transactions")]
    FundingNotSpendable,

    /// Startup configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Shard routing key must be exactly one byte
    #[error("Shard key must be 1 byte, got {0}")]
    InvalidShardKey(usize),

    // ----- Conflict -----
    /// Consumed UTXO is missing or not ready for spending
    #[error("UTXO doesn't exist or was already spent: {key}")]
    DoubleSpend {
        /// Hex of the 61-byte UTXO key
        key: String,
    },

    /// Record slot already holds a spending record
    #[error("Counter is reused: {0}")]
    CounterReused(u64),

    /// Deposit index was already funded
    #[error("Duplicate funding transaction for deposit {0}")]
    DuplicateFunding(String),

    /// Two transactions in one block consume the same UTXO
    #[error("Potential doublespend in block")]
    DuplicateInput,

    /// Two outputs in one block share coordinates
    #[error("Transaction numbering is incorrect")]
    DuplicateOutput,

    /// Store aborted the transaction
    #[error("Store conflict")]
    StoreConflict,

    // ----- Sequencing -----
    /// Block number 0 is reserved
    #[error("Invalid block number: 0")]
    InvalidBlockNumber,

    /// Block is more than one past the last written block
    #[error("Writing out of order: block {block}, last written {last_written}")]
    OutOfOrderBlock {
        /// Block being written
        block: u32,
        /// Last written block
        last_written: u32,
    },

    /// High-water mark does not allow this batch
    #[error("Can not write batch {min_tx}..={max_tx} of block {block}: high-water mark ({hwm_block}, {hwm_tx})")]
    BatchOutOfOrder {
        /// Block being written
        block: u32,
        /// First tx of the batch
        min_tx: u32,
        /// Last tx of the batch
        max_tx: u32,
        /// Recorded block
        hwm_block: u32,
        /// Recorded tx
        hwm_tx: u32,
    },

    /// Counter read back lower than the value reserved
    #[error("New counter {actual} is less than expected {expected}")]
    CounterRegression {
        /// Value requested
        expected: u64,
        /// Value read back
        actual: u64,
    },

    /// Counter source would reissue persisted counters
    #[error("Counter source at {counter} is behind store maximum {store_max}")]
    CounterBehindStore {
        /// Counter source value
        counter: u64,
        /// Highest record in the store
        store_max: u64,
    },

    /// Deposit has not been funded yet
    #[error("Not yet processed")]
    NotYetProcessed,

    // ----- Cryptographic -----
    /// Signing or sender recovery failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    // ----- Storage -----
    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(StoreError),

    /// Value written was not read back
    #[error("Read-back mismatch for {0}")]
    ReadBackMismatch(&'static str),

    /// Persisted bytes could not be parsed
    #[error("Corrupt stored data: {0}")]
    CorruptData(String),

    /// Blocking task panicked or was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => LedgerError::StoreConflict,
            other => LedgerError::Storage(other),
        }
    }
}

impl From<RlpError> for LedgerError {
    fn from(err: RlpError) -> Self {
        LedgerError::Decode(DecodeError::Rlp(err))
    }
}

impl LedgerError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_)
            | Self::InvalidTransaction(_)
            | Self::Policy(_)
            | Self::Merkle(_)
            | Self::IndexOutOfRange { .. }
            | Self::InvalidBlock(_)
            | Self::FundingNotSpendable
            | Self::Config(_)
            | Self::InvalidShardKey(_) => ErrorKind::Structural,

            Self::DoubleSpend { .. }
            | Self::CounterReused(_)
            | Self::DuplicateFunding(_)
            | Self::DuplicateInput
            | Self::DuplicateOutput
            | Self::StoreConflict => ErrorKind::Conflict,

            Self::InvalidBlockNumber
            | Self::OutOfOrderBlock { .. }
            | Self::BatchOutOfOrder { .. }
            | Self::CounterRegression { .. }
            | Self::CounterBehindStore { .. }
            | Self::NotYetProcessed => ErrorKind::Sequencing,

            Self::Crypto(_) => ErrorKind::Cryptographic,

            Self::Storage(_)
            | Self::ReadBackMismatch(_)
            | Self::CorruptData(_)
            | Self::TaskFailed(_) => ErrorKind::Storage,
        }
    }

    /// Check if the error is a lost race or reused slot
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Check if retrying the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StoreConflict
                | Self::NotYetProcessed
                | Self::Storage(_)
                | Self::TaskFailed(_)
                | Self::BatchOutOfOrder { .. }
        )
    }
}
