//! # EC Worker Pool
//!
//! Caps the number of secp256k1 operations running at once. Every `sign` and
//! `recover` call checks out one [`EcContext`] for the duration of the curve
//! operation; callers beyond the pool size block until a context frees up.

use crate::ecdsa::{self, Address, PublicKey, SIGNATURE_LENGTH};
use crate::pool::BoundedPool;
use crate::CryptoError;
use tracing::debug;

/// Per-slot signing state.
#[derive(Debug)]
pub struct EcContext {
    id: usize,
    operations: u64,
}

impl EcContext {
    fn new(id: usize) -> Self {
        Self { id, operations: 0 }
    }

    /// Slot index inside the pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Curve operations served by this context so far.
    pub fn operations(&self) -> u64 {
        self.operations
    }

    fn sign(&mut self, digest: &[u8], private_key: &[u8]) -> Result<[u8; SIGNATURE_LENGTH], CryptoError> {
        self.operations += 1;
        ecdsa::sign_digest(digest, private_key)
    }

    fn recover(&mut self, digest: &[u8], signature: &[u8]) -> Result<PublicKey, CryptoError> {
        self.operations += 1;
        ecdsa::recover_pubkey(digest, signature)
    }
}

/// Bounded pool of EC contexts.
pub struct CryptoWorkerPool {
    contexts: BoundedPool<EcContext>,
}

impl CryptoWorkerPool {
    /// Create a pool with `concurrency` contexts (at least one).
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        debug!(concurrency, "Creating EC worker pool");
        Self {
            contexts: BoundedPool::with_capacity(concurrency, EcContext::new),
        }
    }

    /// One context per logical CPU.
    pub fn with_cpu_count() -> Self {
        Self::new(num_cpus::get())
    }

    /// Sign a 32-byte digest. Returns `R || S || V` with `V ∈ {0, 1}`.
    pub fn sign(&self, digest: &[u8], private_key: &[u8]) -> Result<[u8; SIGNATURE_LENGTH], CryptoError> {
        let mut context = self.contexts.acquire();
        context.sign(digest, private_key)
    }

    /// Recover the uncompressed public key from a 65-byte signature.
    pub fn recover_pubkey(&self, digest: &[u8], signature: &[u8]) -> Result<PublicKey, CryptoError> {
        let mut context = self.contexts.acquire();
        context.recover(digest, signature)
    }

    /// Recover the signer address, rejecting the zero address.
    pub fn recover_address(&self, digest: &[u8], signature: &[u8]) -> Result<Address, CryptoError> {
        let public_key = self.recover_pubkey(digest, signature)?;
        let address = ecdsa::address_from_pubkey(&public_key);
        if address == [0u8; 20] {
            return Err(CryptoError::ZeroAddress);
        }
        Ok(address)
    }

    /// Number of contexts.
    pub fn concurrency(&self) -> usize {
        self.contexts.capacity()
    }

    /// Contexts not currently in use.
    pub fn idle(&self) -> usize {
        self.contexts.available()
    }
}

impl Default for CryptoWorkerPool {
    fn default() -> Self {
        Self::with_cpu_count()
    }
}
