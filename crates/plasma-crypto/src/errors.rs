//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Private key is not 32 bytes
    #[error("Invalid private key length: expected 32, got {0}")]
    InvalidPrivateKeyLength(usize),

    /// Digest is not 32 bytes
    #[error("Invalid digest length: expected 32, got {0}")]
    InvalidDigestLength(usize),

    /// Signature is not 65 bytes (R || S || V)
    #[error("Invalid signature length: expected 65, got {0}")]
    InvalidSignatureLength(usize),

    /// Private key is zero or not below the curve order
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// R or S is not a valid scalar
    #[error("Invalid signature")]
    InvalidSignature,

    /// V is not one of 0, 1, 27, 28
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Public key recovery failed
    #[error("Public key recovery failed")]
    RecoveryFailed,

    /// Signing failed inside the curve backend
    #[error("Signing failed")]
    SigningFailed,

    /// Recovered address is all zeroes
    #[error("Recovered zero address")]
    ZeroAddress,
}
