//! # Blocks
//!
//! ```text
//! header (137) = block(4) ‖ tx_count(4) ‖ prev_hash(32) ‖ merkle_root(32) ‖ V(1) ‖ R(32) ‖ S(32)
//! block        = header ‖ rlp([signed_tx...])
//! ```
//!
//! The producer signs `personal_hash` of the first 72 header bytes; the block
//! hash is `personal_hash` of all 137.

use super::codec;
use super::errors::{LedgerError, Result};
use super::merkle::MerkleTree;
use super::rlp::{self, rlp_encode_list};
use super::transaction::{SignedTransaction, R_LENGTH, S_LENGTH};
use plasma_crypto::{personal_hash, Address, CryptoWorkerPool, Hash};
use rayon::prelude::*;
use std::sync::OnceLock;

/// Serialized header length
pub const BLOCK_HEADER_LENGTH: usize = 137;

/// Length of the signed header prefix
pub const SIGNED_HEADER_LENGTH: usize = 72;

// =============================================================================
// HEADER
// =============================================================================

/// Fixed-width block header.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    block_number: u32,
    transaction_count: u32,
    previous_hash: Hash,
    merkle_root: Hash,
    v: u8,
    r: [u8; R_LENGTH],
    s: [u8; S_LENGTH],
    signer: OnceLock<Address>,
}

impl BlockHeader {
    /// Unsigned header.
    pub fn new(block_number: u32, transaction_count: u32, previous_hash: Hash, merkle_root: Hash) -> Self {
        Self {
            block_number,
            transaction_count,
            previous_hash,
            merkle_root,
            v: 0,
            r: [0u8; R_LENGTH],
            s: [0u8; S_LENGTH],
            signer: OnceLock::new(),
        }
    }

    /// Parse exactly 137 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != BLOCK_HEADER_LENGTH {
            return Err(LedgerError::InvalidBlock(format!(
                "invalid header length {}",
                bytes.len()
            )));
        }
        let mut previous_hash = [0u8; 32];
        let mut merkle_root = [0u8; 32];
        let mut r = [0u8; R_LENGTH];
        let mut s = [0u8; S_LENGTH];
        previous_hash.copy_from_slice(&bytes[8..40]);
        merkle_root.copy_from_slice(&bytes[40..72]);
        r.copy_from_slice(&bytes[73..105]);
        s.copy_from_slice(&bytes[105..137]);
        Ok(Self {
            block_number: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            transaction_count: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            previous_hash,
            merkle_root,
            v: bytes[72],
            r,
            s,
            signer: OnceLock::new(),
        })
    }

    /// Serialize to 137 bytes.
    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_LENGTH] {
        let mut out = [0u8; BLOCK_HEADER_LENGTH];
        out[..SIGNED_HEADER_LENGTH].copy_from_slice(&self.signed_prefix());
        out[72] = self.v;
        out[73..105].copy_from_slice(&self.r);
        out[105..].copy_from_slice(&self.s);
        out
    }

    fn signed_prefix(&self) -> [u8; SIGNED_HEADER_LENGTH] {
        let mut out = [0u8; SIGNED_HEADER_LENGTH];
        out[..4].copy_from_slice(&self.block_number.to_be_bytes());
        out[4..8].copy_from_slice(&self.transaction_count.to_be_bytes());
        out[8..40].copy_from_slice(&self.previous_hash);
        out[40..72].copy_from_slice(&self.merkle_root);
        out
    }

    /// Digest the producer signs.
    pub fn signing_hash(&self) -> Hash {
        personal_hash(&self.signed_prefix())
    }

    /// Block hash, chained into the next header.
    pub fn hash(&self) -> Hash {
        personal_hash(&self.to_bytes())
    }

    /// Sign with the producer key. V is stored as 27/28.
    pub fn sign(&mut self, private_key: &[u8], pool: &CryptoWorkerPool) -> Result<()> {
        let signature = pool.sign(&self.signing_hash(), private_key)?;
        self.r.copy_from_slice(&signature[..32]);
        self.s.copy_from_slice(&signature[32..64]);
        self.v = if signature[64] < 27 {
            signature[64] + 27
        } else {
            signature[64]
        };
        self.signer = OnceLock::new();
        Ok(())
    }

    /// Recover the producer address. The result is cached.
    pub fn signer(&self, pool: &CryptoWorkerPool) -> Result<Address> {
        if let Some(address) = self.signer.get() {
            return Ok(*address);
        }
        let mut signature = [0u8; 65];
        signature[..32].copy_from_slice(&self.r);
        signature[32..64].copy_from_slice(&self.s);
        signature[64] = self.v;
        let address = pool.recover_address(&self.signing_hash(), &signature)?;
        let _ = self.signer.set(address);
        Ok(address)
    }

    /// Block number.
    pub fn block_number(&self) -> u32 {
        self.block_number
    }

    /// Number of transactions.
    pub fn transaction_count(&self) -> u32 {
        self.transaction_count
    }

    /// Hash of the previous block.
    pub fn previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    /// Merkle root of the transactions.
    pub fn merkle_root(&self) -> &Hash {
        &self.merkle_root
    }

    /// Signature V.
    pub fn v(&self) -> u8 {
        self.v
    }
}

impl PartialEq for BlockHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlockHeader {}

// =============================================================================
// BLOCK
// =============================================================================

/// Header plus ordered transactions and their tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<SignedTransaction>,
    tree: MerkleTree,
}

impl Block {
    /// Build an unsigned block. Every transaction is re-validated in parallel.
    pub fn new(
        block_number: u32,
        transactions: Vec<SignedTransaction>,
        previous_hash: Hash,
    ) -> Result<Self> {
        let transaction_count = u32::try_from(transactions.len())
            .map_err(|_| LedgerError::InvalidBlock("too many transactions in block".into()))?;
        let encoded: Vec<Vec<u8>> = transactions
            .par_iter()
            .map(|tx| codec::validate(tx).map(|_| codec::encode(tx)))
            .collect::<std::result::Result<_, _>>()?;
        let tree = MerkleTree::build(&encoded)?;
        let header = BlockHeader::new(block_number, transaction_count, previous_hash, tree.root());
        Ok(Self {
            header,
            transactions,
            tree,
        })
    }

    /// Parse `header ‖ rlp(txs)` and check the Merkle root.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() <= BLOCK_HEADER_LENGTH {
            return Err(LedgerError::InvalidBlock("data is too short".into()));
        }
        let header = BlockHeader::from_bytes(&bytes[..BLOCK_HEADER_LENGTH])?;
        let item = rlp::decode(&bytes[BLOCK_HEADER_LENGTH..])?;
        let transactions = item
            .as_list()?
            .iter()
            .map(codec::signed_from_item)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if transactions.len() != header.transaction_count as usize {
            return Err(LedgerError::InvalidBlock(format!(
                "header announces {} transactions, body has {}",
                header.transaction_count,
                transactions.len()
            )));
        }
        let encoded: Vec<Vec<u8>> = transactions.iter().map(codec::encode).collect();
        let tree = MerkleTree::build(&encoded)?;
        if &tree.root() != header.merkle_root() {
            return Err(LedgerError::InvalidBlock("Merkle tree root mismatch".into()));
        }
        Ok(Self {
            header,
            transactions,
            tree,
        })
    }

    /// Serialize as `header ‖ rlp(txs)`.
    pub fn serialize(&self) -> Vec<u8> {
        let encoded: Vec<Vec<u8>> = self.transactions.iter().map(codec::encode).collect();
        let body = rlp_encode_list(&encoded);
        let mut out = Vec::with_capacity(BLOCK_HEADER_LENGTH + body.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// Sign the header.
    pub fn sign(&mut self, private_key: &[u8], pool: &CryptoWorkerPool) -> Result<()> {
        self.header.sign(private_key, pool)
    }

    /// Recover the producer address.
    pub fn signer(&self, pool: &CryptoWorkerPool) -> Result<Address> {
        self.header.signer(pool)
    }

    /// Proof of inclusion for transaction `index`.
    pub fn proof(&self, index: usize) -> Result<Vec<u8>> {
        Ok(self.tree.provide_proof(index)?)
    }

    /// Header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Block number.
    pub fn block_number(&self) -> u32 {
        self.header.block_number
    }

    /// Ordered transactions.
    pub fn transactions(&self) -> &[SignedTransaction] {
        &self.transactions
    }

    /// Merkle tree.
    pub fn merkle_tree(&self) -> &MerkleTree {
        &self.tree
    }
}
