//! # Merkle Commitment
//!
//! Binary tree over the ordered, encoded transactions of a block.
//!
//! - Leaf: `personal_hash(encoded_tx)`
//! - Node: `keccak256(left ‖ right)`
//! - Odd level: the last node is paired with a padding node whose hash is
//!   `keccak256` of the empty padding element
//! - One leaf: the root is the leaf hash
//!
//! Proofs are 33-byte chunks from leaf to root: a side byte (0x01 when the
//! proven node is the left child) followed by the sibling hash.

use super::errors::MerkleError;
use plasma_crypto::{keccak256, keccak256_concat, personal_hash, Hash};

/// Size of one proof step
pub const PROOF_CHUNK_LENGTH: usize = 33;

const LEFT: u8 = 0x01;
const RIGHT: u8 = 0x00;

/// Hash of the padding node.
pub fn padding_hash() -> Hash {
    keccak256(&[])
}

/// A binary Merkle tree over byte-string leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// Level 0 holds the leaf hashes, the last level holds the root.
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a tree. Fails on an empty leaf list.
    pub fn build<T: AsRef<[u8]>>(leaves: &[T]) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::Empty);
        }
        let leaf_hashes: Vec<Hash> = leaves.iter().map(|l| personal_hash(l.as_ref())).collect();
        Ok(Self::from_leaf_hashes(leaf_hashes))
    }

    fn from_leaf_hashes(leaf_hashes: Vec<Hash>) -> Self {
        let padding = padding_hash();
        let mut levels = vec![leaf_hashes];
        while let Some(level) = levels.last().filter(|l| l.len() > 1) {
            let next: Vec<Hash> = level
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&padding)))
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    /// Root hash.
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_else(padding_hash)
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    /// Proof of inclusion for leaf `index`. Empty for a single-leaf tree.
    pub fn provide_proof(&self, index: usize) -> Result<Vec<u8>, MerkleError> {
        let leaves = self.leaf_count();
        if index >= leaves {
            return Err(MerkleError::InvalidIndex { index, leaves });
        }

        let padding = padding_hash();
        let depth = self.levels.len() - 1;
        let mut proof = Vec::with_capacity(depth * PROOF_CHUNK_LENGTH);
        let mut position = index;
        for level in &self.levels[..depth] {
            if position % 2 == 0 {
                let sibling = level.get(position + 1).unwrap_or(&padding);
                proof.push(LEFT);
                proof.extend_from_slice(sibling);
            } else {
                proof.push(RIGHT);
                proof.extend_from_slice(&level[position - 1]);
            }
            position /= 2;
        }
        Ok(proof)
    }

    /// Check a proof for `leaf_content` against `root`.
    pub fn verify_proof(root: &Hash, proof: &[u8], leaf_content: &[u8]) -> Result<bool, MerkleError> {
        if proof.len() % PROOF_CHUNK_LENGTH != 0 {
            return Err(MerkleError::InvalidProofLength(proof.len()));
        }
        let mut current = personal_hash(leaf_content);
        for chunk in proof.chunks_exact(PROOF_CHUNK_LENGTH) {
            let sibling = &chunk[1..];
            current = match chunk[0] {
                LEFT => keccak256_concat(&[current.as_slice(), sibling]),
                RIGHT => keccak256_concat(&[sibling, current.as_slice()]),
                other => return Err(MerkleError::InvalidProofSide(other)),
            };
        }
        Ok(&current == root)
    }
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    keccak256_concat(&[left.as_slice(), right.as_slice()])
}
