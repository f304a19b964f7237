//! # Plasma Crypto
//!
//! Cryptographic primitives shared by the ledger crates.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256, personal hash | Signing digests, Merkle nodes |
//! | `ecdsa` | secp256k1 (recoverable) | Transaction and block header signatures |
//! | `pool` | - | Bounded blocking pool with scoped release |
//! | `worker` | - | `CryptoWorkerPool` capping parallel EC work |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic, low-S normalization (EIP-2)
//! - Secrets held in [`SecretKey`] are zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod pool;
pub mod worker;

// Re-exports
pub use ecdsa::{
    address_from_private_key, address_from_pubkey, Address, PublicKey, SecretKey,
    SIGNATURE_LENGTH,
};
pub use errors::CryptoError;
pub use hashing::{keccak256, keccak256_concat, personal_hash, Hash};
pub use pool::{BoundedPool, PoolGuard};
pub use worker::{CryptoWorkerPool, EcContext};
