use base64::{engine::general_purpose::STANDARD, Engine as _};
use merkle::{hash_bytes, Hash32, MerkleTree};
use serde::{Deserialize, Serialize};

use crate::{to_digest, LedgerError, Result};

/// SHA-256 of the key
pub fn key_hash(key: &str) -> Hash32 {
    hash_bytes(key.as_bytes())
}

/// SHA-256 of `address || key`.
///
/// No delimiter: ("a", "bc") and ("ab", "c") collide. Kept as-is so roots stay
/// comparable with rows already committed on-chain.
pub fn row_hash(address: &str, key: &str) -> Hash32 {
    let mut data = Vec::with_capacity(address.len() + key.len());
    data.extend_from_slice(address.as_bytes());
    data.extend_from_slice(key.as_bytes());
    hash_bytes(&data)
}

pub fn encode_root(root: &Hash32) -> String {
    STANDARD.encode(root)
}

/// Decode a base64 root received at the boundary
pub fn decode_root(encoded: &str) -> Result<Hash32> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| LedgerError::Validation(format!("root is not base64: {e}")))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| LedgerError::Validation(format!("root has {len} bytes, expected 32")))
}

/// One immutable ledger row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerRow {
    /// Insertion sequence, defines leaf order
    pub id: i64,
    pub address: String,
    pub key: String,
    pub key_hash: Hash32,
    pub row_hash: Hash32,
}

#[derive(sqlx::FromRow)]
pub(crate) struct LedgerRowRecord {
    id: i64,
    address: String,
    key: String,
    key_hash: Vec<u8>,
    row_hash: Vec<u8>,
}

impl TryFrom<LedgerRowRecord> for LedgerRow {
    type Error = LedgerError;

    fn try_from(r: LedgerRowRecord) -> Result<Self> {
        Ok(Self {
            id: r.id,
            address: r.address,
            key: r.key,
            key_hash: to_digest(r.key_hash)?,
            row_hash: to_digest(r.row_hash)?,
        })
    }
}

/// Point-in-time commitment over the ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootRecord {
    pub key_root: Hash32,
    pub row_root: Hash32,
    pub leaf_count: usize,
}

impl RootRecord {
    pub fn encoded(&self) -> EncodedRoots {
        EncodedRoots {
            key_root: encode_root(&self.key_root),
            row_root: encode_root(&self.row_root),
        }
    }
}

/// Base64 form of a [`RootRecord`], for responses and on-chain values
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncodedRoots {
    pub key_root: String,
    pub row_root: String,
}

/// Roots plus the in-memory trees they came from
#[derive(Clone, Debug)]
pub struct LedgerTrees {
    pub roots: RootRecord,
    pub key_tree: MerkleTree,
    pub row_tree: MerkleTree,
}

impl LedgerTrees {
    pub fn from_rows(rows: &[LedgerRow]) -> Self {
        let key_tree: MerkleTree = rows.iter().map(|r| r.key_hash).collect();
        let row_tree: MerkleTree = rows.iter().map(|r| r.row_hash).collect();
        let roots = RootRecord {
            key_root: key_tree.root(),
            row_root: row_tree.root(),
            leaf_count: rows.len(),
        };
        Self { roots, key_tree, row_tree }
    }
}
