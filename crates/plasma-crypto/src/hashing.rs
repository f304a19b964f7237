//! # Keccak Hashing
//!
//! Keccak-256 and the Ethereum "personal message" hash used for transaction
//! signing digests, block header digests and Merkle leaves.

use sha3::{Digest, Keccak256};

/// Keccak-256 output (256-bit).
pub type Hash = [u8; 32];

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Hash data with Keccak-256 (one-shot).
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash the concatenation of several inputs with Keccak-256.
pub fn keccak256_concat(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize().into()
}

/// `keccak256("\x19Ethereum Signed Message:\n" || len(m) as decimal || m)`.
pub fn personal_hash(message: &[u8]) -> Hash {
    let length = message.len().to_string();
    keccak256_concat(&[PERSONAL_MESSAGE_PREFIX, length.as_bytes(), message])
}
