//! # Transactions
//!
//! Plasma transfers are UTXO transactions of three shapes:
//!
//! | Type | Byte | Inputs | Outputs |
//! |------|------|--------|---------|
//! | Split | 0x01 | 1 | 1..=3 |
//! | Merge | 0x02 | 2 | 1 |
//! | Fund | 0x04 | 1, at (0,0,0) value 0 | 1 |
//!
//! An [`UnsignedTransaction`] is immutable once built. A
//! [`SignedTransaction`] adds the recoverable signature and caches the
//! recovered sender; replacing the signature drops the cache.

use plasma_crypto::{personal_hash, Address, CryptoError, CryptoWorkerPool, Hash};
use primitive_types::U256;
use std::sync::OnceLock;

// =============================================================================
// FIELD WIDTHS
// =============================================================================

/// Transaction type field width
pub const TRANSACTION_TYPE_LENGTH: usize = 1;
/// Block number field width
pub const BLOCK_NUMBER_LENGTH: usize = 4;
/// Transaction number field width
pub const TRANSACTION_NUMBER_LENGTH: usize = 4;
/// Output number field width
pub const OUTPUT_NUMBER_LENGTH: usize = 1;
/// Address field width
pub const ADDRESS_LENGTH: usize = 20;
/// Value field width
pub const VALUE_LENGTH: usize = 32;
/// Signature V width
pub const V_LENGTH: usize = 1;
/// Signature R width
pub const R_LENGTH: usize = 32;
/// Signature S width
pub const S_LENGTH: usize = 32;

/// The zero address; never a valid sender
pub const EMPTY_ADDRESS: Address = [0u8; ADDRESS_LENGTH];

// =============================================================================
// TYPES
// =============================================================================

/// Transaction shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransactionType {
    /// One input into up to three outputs
    Split = 0x01,
    /// Two inputs into one output
    Merge = 0x02,
    /// Operator-issued deposit
    Fund = 0x04,
}

impl TransactionType {
    /// Parse the wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Split),
            0x02 => Some(Self::Merge),
            0x04 => Some(Self::Fund),
            _ => None,
        }
    }

    /// Wire byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Split => "Split",
            Self::Merge => "Merge",
            Self::Fund => "Fund",
        }
    }
}

/// Reference to a previously created output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionInput {
    /// Block that created the output
    pub block_number: u32,
    /// Position of the creating transaction in that block
    pub transaction_number: u32,
    /// Output index in the creating transaction
    pub output_number: u8,
    /// Value of the referenced output
    pub value: U256,
}

impl TransactionInput {
    /// Build an input.
    pub fn new(block_number: u32, transaction_number: u32, output_number: u8, value: U256) -> Self {
        Self {
            block_number,
            transaction_number,
            output_number,
            value,
        }
    }

    /// Value as 32 big-endian bytes.
    pub fn value_bytes(&self) -> [u8; VALUE_LENGTH] {
        u256_to_bytes(&self.value)
    }

    /// True when the input references (0, 0, 0) with value 0.
    pub fn is_null(&self) -> bool {
        self.block_number == 0
            && self.transaction_number == 0
            && self.output_number == 0
            && self.value.is_zero()
    }
}

/// Newly created output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionOutput {
    /// Index of this output in its transaction
    pub output_number: u8,
    /// Recipient
    pub to: Address,
    /// Amount
    pub value: U256,
}

impl TransactionOutput {
    /// Build an output.
    pub fn new(output_number: u8, to: Address, value: U256) -> Self {
        Self {
            output_number,
            to,
            value,
        }
    }

    /// Value as 32 big-endian bytes.
    pub fn value_bytes(&self) -> [u8; VALUE_LENGTH] {
        u256_to_bytes(&self.value)
    }
}

/// Transaction body covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    tx_type: TransactionType,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
}

impl UnsignedTransaction {
    /// Build a transaction body. Structure is checked by `codec::validate`.
    pub fn new(
        tx_type: TransactionType,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
    ) -> Self {
        Self {
            tx_type,
            inputs,
            outputs,
        }
    }

    /// Transaction shape.
    pub fn tx_type(&self) -> TransactionType {
        self.tx_type
    }

    /// Ordered inputs.
    pub fn inputs(&self) -> &[TransactionInput] {
        &self.inputs
    }

    /// Ordered outputs.
    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    /// Digest the sender signs: personal hash of the canonical encoding.
    pub fn signing_hash(&self) -> Hash {
        personal_hash(&super::codec::encode_unsigned(self))
    }

    /// Sign with the given private key.
    pub fn sign(
        self,
        private_key: &[u8],
        pool: &CryptoWorkerPool,
    ) -> Result<SignedTransaction, CryptoError> {
        let signature = pool.sign(&self.signing_hash(), private_key)?;
        let mut r = [0u8; R_LENGTH];
        let mut s = [0u8; S_LENGTH];
        r.copy_from_slice(&signature[..32]);
        s.copy_from_slice(&signature[32..64]);
        Ok(SignedTransaction::new(self, signature[64], r, s))
    }
}

/// Transaction body plus recoverable signature.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    unsigned: UnsignedTransaction,
    v: u8,
    r: [u8; R_LENGTH],
    s: [u8; S_LENGTH],
    sender: OnceLock<Address>,
}

impl SignedTransaction {
    /// Attach a signature to a body.
    pub fn new(unsigned: UnsignedTransaction, v: u8, r: [u8; R_LENGTH], s: [u8; S_LENGTH]) -> Self {
        Self {
            unsigned,
            v,
            r,
            s,
            sender: OnceLock::new(),
        }
    }

    /// Signed body.
    pub fn unsigned(&self) -> &UnsignedTransaction {
        &self.unsigned
    }

    /// Shortcut for `unsigned().tx_type()`.
    pub fn tx_type(&self) -> TransactionType {
        self.unsigned.tx_type
    }

    /// Shortcut for `unsigned().inputs()`.
    pub fn inputs(&self) -> &[TransactionInput] {
        &self.unsigned.inputs
    }

    /// Shortcut for `unsigned().outputs()`.
    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.unsigned.outputs
    }

    /// Signature V as carried on the wire (0/1 or 27/28).
    pub fn v(&self) -> u8 {
        self.v
    }

    /// Signature R.
    pub fn r(&self) -> &[u8; R_LENGTH] {
        &self.r
    }

    /// Signature S.
    pub fn s(&self) -> &[u8; S_LENGTH] {
        &self.s
    }

    /// Signature as R ‖ S ‖ V.
    pub fn signature(&self) -> [u8; 65] {
        let mut sig = [0u8; 65];
        sig[..32].copy_from_slice(&self.r);
        sig[32..64].copy_from_slice(&self.s);
        sig[64] = self.v;
        sig
    }

    /// Replace the signature and forget the cached sender.
    pub fn set_signature(&mut self, v: u8, r: [u8; R_LENGTH], s: [u8; S_LENGTH]) {
        self.v = v;
        self.r = r;
        self.s = s;
        self.sender = OnceLock::new();
    }

    /// Recover the sender. The result is cached.
    pub fn sender(&self, pool: &CryptoWorkerPool) -> Result<Address, CryptoError> {
        if let Some(address) = self.sender.get() {
            return Ok(*address);
        }
        let address = pool.recover_address(&self.unsigned.signing_hash(), &self.signature())?;
        let _ = self.sender.set(address);
        Ok(address)
    }

    /// Sender if it was already recovered.
    pub fn cached_sender(&self) -> Option<Address> {
        self.sender.get().copied()
    }
}

impl PartialEq for SignedTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.unsigned == other.unsigned
            && self.v == other.v
            && self.r == other.r
            && self.s == other.s
    }
}

impl Eq for SignedTransaction {}

/// Big-endian 32-byte encoding of a U256.
pub fn u256_to_bytes(value: &U256) -> [u8; VALUE_LENGTH] {
    let mut bytes = [0u8; VALUE_LENGTH];
    value.to_big_endian(&mut bytes);
    bytes
}
