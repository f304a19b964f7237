//! # ECDSA Signatures (secp256k1)
//!
//! Recoverable secp256k1 signatures over 32-byte prehashed digests, in the
//! Ethereum layout `R || S || V`.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization (EIP-2), the recovery id is adjusted accordingly
//! - V accepted as raw {0, 1} or offset {27, 28} on recovery

use crate::hashing::keccak256;
use crate::CryptoError;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use zeroize::Zeroize;

/// Length of a recoverable signature (R || S || V).
pub const SIGNATURE_LENGTH: usize = 65;

/// Length of an uncompressed SEC1 public key (0x04 || X || Y).
pub const PUBLIC_KEY_LENGTH: usize = 65;

/// 20-byte Ethereum-style address.
pub type Address = [u8; 20];

/// Uncompressed SEC1 public key.
pub type PublicKey = [u8; PUBLIC_KEY_LENGTH];

/// Sign a 32-byte digest with a 32-byte private key.
///
/// Returns `R || S || V` with `V ∈ {0, 1}`.
pub fn sign_digest(digest: &[u8], private_key: &[u8]) -> Result<[u8; SIGNATURE_LENGTH], CryptoError> {
    if digest.len() != 32 {
        return Err(CryptoError::InvalidDigestLength(digest.len()));
    }
    if private_key.len() != 32 {
        return Err(CryptoError::InvalidPrivateKeyLength(private_key.len()));
    }

    let signing_key =
        SigningKey::from_slice(private_key).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(digest)
        .map_err(|_| CryptoError::SigningFailed)?;

    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = recovery_id.to_byte();
    Ok(out)
}

/// Recover the uncompressed public key that produced `signature` over `digest`.
pub fn recover_pubkey(digest: &[u8], signature: &[u8]) -> Result<PublicKey, CryptoError> {
    if digest.len() != 32 {
        return Err(CryptoError::InvalidDigestLength(digest.len()));
    }
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::InvalidSignatureLength(signature.len()));
    }

    let recovery_id = parse_recovery_id(signature[64])?;
    let sig = Signature::from_slice(&signature[..64]).map_err(|_| CryptoError::InvalidSignature)?;
    let recovered = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    let encoded = recovered.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LENGTH];
    out.copy_from_slice(encoded.as_bytes());
    Ok(out)
}

/// Derive the address of an uncompressed public key: last 20 bytes of
/// `keccak256(X || Y)`.
pub fn address_from_pubkey(public_key: &PublicKey) -> Address {
    let hash = keccak256(&public_key[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Derive the address controlled by a private key.
pub fn address_from_private_key(private_key: &[u8]) -> Result<Address, CryptoError> {
    if private_key.len() != 32 {
        return Err(CryptoError::InvalidPrivateKeyLength(private_key.len()));
    }
    let signing_key =
        SigningKey::from_slice(private_key).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let encoded = signing_key.verifying_key().to_encoded_point(false);
    let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
    public_key.copy_from_slice(encoded.as_bytes());
    Ok(address_from_pubkey(&public_key))
}

fn parse_recovery_id(v: u8) -> Result<RecoveryId, CryptoError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(CryptoError::InvalidRecoveryId(v)),
    };
    RecoveryId::from_byte(id).ok_or(CryptoError::InvalidRecoveryId(v))
}

/// A secp256k1 secret held for signing. Zeroized on drop.
pub struct SecretKey {
    bytes: [u8; 32],
}

impl SecretKey {
    /// Create from raw bytes, rejecting keys outside the curve order.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidPrivateKeyLength(bytes.len()));
        }
        SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Generate a random key.
    pub fn random() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self {
            bytes: signing_key.to_bytes().into(),
        }
    }

    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Address controlled by this key.
    pub fn address(&self) -> Result<Address, CryptoError> {
        address_from_private_key(&self.bytes)
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}
