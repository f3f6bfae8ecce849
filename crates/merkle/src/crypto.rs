//! SHA-256 primitives shared by the tree and the ledger

use sha2::{Digest, Sha256};

use crate::Hash32;

/// Hash arbitrary bytes to 32 bytes
pub fn hash_bytes(data: &[u8]) -> Hash32 {
    Sha256::digest(data).into()
}

/// Internal node hash
/// node = H(left || right)
pub fn hash_pair(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Root of a tree with no leaves: H("")
pub fn empty_root() -> Hash32 {
    hash_bytes(b"")
}
