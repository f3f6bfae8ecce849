//! Core types for the append-only tree

use serde::{Deserialize, Serialize};

/// 32-byte digest
pub type Hash32 = [u8; 32];

/// Position of a sibling relative to the node being folded
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One folding step of an inclusion proof
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofStep {
    pub side: Side,
    pub sibling: Hash32,
}

/// Inclusion proof for a single leaf.
///
/// Levels where the node was carried up unpaired contribute no step.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InclusionProof {
    /// 1-based leaf index
    pub index: usize,
    /// Number of leaves in the tree the proof was taken from
    pub tree_size: usize,
    pub steps: Vec<ProofStep>,
}
