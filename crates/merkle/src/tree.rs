use crate::crypto;
use crate::types::{Hash32, InclusionProof, ProofStep, Side};
use crate::{MerkleError, Result};

/// Append-only binary hash tree over pre-hashed leaves.
///
/// Leaves are never re-hashed. Parents are `H(left || right)`; a node left
/// without a partner at the end of a level is carried up unchanged and pairs
/// with whatever node is computed next. Nothing is ever duplicated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MerkleTree {
    leaves: Vec<Hash32>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self { leaves: Vec::new() }
    }

    /// Build a tree from an ordered sequence of leaf digests
    pub fn build_from<I>(leaves: I) -> Self
    where
        I: IntoIterator<Item = Hash32>,
    {
        Self { leaves: leaves.into_iter().collect() }
    }

    /// Append a leaf, returning its 1-based index
    pub fn add_leaf(&mut self, leaf: Hash32) -> usize {
        self.leaves.push(leaf);
        self.leaves.len()
    }

    /// Leaf at a 1-based index, `None` outside `[1, len]`
    pub fn leaf_at(&self, index: usize) -> Option<Hash32> {
        if index == 0 {
            return None;
        }
        self.leaves.get(index - 1).copied()
    }

    pub fn try_leaf(&self, index: usize) -> Result<Hash32> {
        self.leaf_at(index).ok_or(MerkleError::IndexOutOfRange {
            index,
            size: self.len(),
        })
    }

    pub fn leaves(&self) -> &[Hash32] {
        &self.leaves
    }

    pub fn into_leaves(self) -> Vec<Hash32> {
        self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Root over every leaf
    pub fn root(&self) -> Hash32 {
        root_of(&self.leaves)
    }

    /// Root over the first `size` leaves
    pub fn root_at(&self, size: usize) -> Result<Hash32> {
        if size > self.len() {
            return Err(MerkleError::IndexOutOfRange { index: size, size: self.len() });
        }
        Ok(root_of(&self.leaves[..size]))
    }

    /// Full node layout, level 0 = leaves, last level = `[root]`.
    ///
    /// Empty trees have a single empty level.
    pub fn levels(&self) -> Vec<Vec<Hash32>> {
        let mut levels = vec![self.leaves.clone()];
        while let Some(last) = levels.last() {
            if last.len() <= 1 {
                break;
            }
            let next = next_level(last);
            levels.push(next);
        }
        levels
    }

    /// Inclusion proof for the leaf at a 1-based index
    pub fn proof_for(&self, index: usize) -> Result<InclusionProof> {
        self.try_leaf(index)?;

        let mut steps = Vec::new();
        let mut pos = index - 1;
        for level in self.levels() {
            if level.len() <= 1 {
                break;
            }
            if pos % 2 == 1 {
                steps.push(ProofStep { side: Side::Left, sibling: level[pos - 1] });
            } else if pos + 1 < level.len() {
                steps.push(ProofStep { side: Side::Right, sibling: level[pos + 1] });
            }
            // unpaired last node: carried up, no step
            pos /= 2;
        }

        Ok(InclusionProof { index, tree_size: self.len(), steps })
    }

    /// Fold a proof from `leaf` and compare with `root`
    pub fn verify_inclusion(leaf: Hash32, proof: &InclusionProof, root: Hash32) -> bool {
        if proof.index == 0 || proof.index > proof.tree_size {
            return false;
        }
        let folded = proof.steps.iter().fold(leaf, |acc, step| match step.side {
            Side::Left => crypto::hash_pair(&step.sibling, &acc),
            Side::Right => crypto::hash_pair(&acc, &step.sibling),
        });
        folded == root
    }
}

impl FromIterator<Hash32> for MerkleTree {
    fn from_iter<I: IntoIterator<Item = Hash32>>(iter: I) -> Self {
        Self::build_from(iter)
    }
}

fn root_of(leaves: &[Hash32]) -> Hash32 {
    if leaves.is_empty() {
        return crypto::empty_root();
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

fn next_level(level: &[Hash32]) -> Vec<Hash32> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => crypto::hash_pair(left, right),
            [carried] => *carried,
            _ => unreachable!("chunks(2) yields one or two nodes"),
        })
        .collect()
}
