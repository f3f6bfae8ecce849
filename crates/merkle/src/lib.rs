//! Append-only Merkle tree over pre-hashed leaves
//!
//! Used to commit to ledger contents with a single SHA-256 root.

mod crypto;
mod tree;
mod types;

pub use crypto::{empty_root, hash_bytes, hash_pair};
pub use tree::MerkleTree;
pub use types::{Hash32, InclusionProof, ProofStep, Side};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("Leaf index {index} out of range for tree of size {size}")]
    IndexOutOfRange { index: usize, size: usize },
}

pub type Result<T> = std::result::Result<T, MerkleError>;
