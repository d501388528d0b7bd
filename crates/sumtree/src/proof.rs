//! Witness proofs and verification

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{error::TreeError, index::GlobalIndex, node::TreeNode};

/// Recompute the anchor node from `node` at `index` and its witness.
///
/// The witness is root-ward: element `i` is the sibling of the node `i`
/// levels above `index`. The anchor sits `witness.len()` levels up.
pub fn compute_anchor(
    index: GlobalIndex,
    node: &TreeNode,
    witness: &[TreeNode],
) -> Result<TreeNode, TreeError> {
    let mut current = *node;
    let mut cursor = index;
    for sibling in witness {
        current = if cursor.is_right_child() {
            TreeNode::combine(sibling, &current)?
        } else {
            TreeNode::combine(&current, sibling)?
        };
        cursor = cursor.parent().ok_or(TreeError::MalformedProof {
            expected: index.depth() as usize,
            actual: witness.len(),
        })?;
    }
    Ok(current)
}

/// Verify that `node` sits at `index` beneath the committed `anchor_node`.
///
/// Used both for leaf proofs (anchor = root) and for challenge proofs anchored
/// at an internal checkpoint.
pub fn verify_path(
    anchor_index: GlobalIndex,
    anchor_node: &TreeNode,
    index: GlobalIndex,
    node: &TreeNode,
    witness: &[TreeNode],
) -> Result<(), TreeError> {
    if !index.is_descendant_of(anchor_index) {
        return Err(TreeError::NotDescendant { index: index.get(), anchor: anchor_index.get() });
    }
    let expected = (index.depth() - anchor_index.depth()) as usize;
    if witness.len() != expected {
        return Err(TreeError::MalformedProof { expected, actual: witness.len() });
    }
    if compute_anchor(index, node, witness)? != *anchor_node {
        return Err(TreeError::ProofMismatch);
    }
    Ok(())
}

/// Inclusion proof of a participant's voting power against the root
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafProof {
    /// Global index of the leaf
    pub index: GlobalIndex,
    /// Voting power at the leaf
    pub sum: U256,
    /// Sibling nodes from the leaf up to the root
    pub witness: Vec<TreeNode>,
}

impl LeafProof {
    /// Verify this proof against a committed root
    pub fn verify(&self, root: &TreeNode) -> Result<(), TreeError> {
        verify_path(GlobalIndex::ROOT, root, self.index, &TreeNode::leaf(self.sum), &self.witness)
    }

    /// Leaf position in the participant ordering
    pub const fn position(&self) -> u64 {
        self.index.offset()
    }
}

/// Proof that a claimed node sits beneath an agreed checkpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeProof {
    /// Checkpoint the walk ends at
    pub anchor: GlobalIndex,
    /// Disputed index
    pub index: GlobalIndex,
    /// Node claimed at `index`
    pub node: TreeNode,
    /// Siblings from `index` up to `anchor`
    pub witness: Vec<TreeNode>,
}

impl ChallengeProof {
    /// Verify against the node committed at the anchor
    pub fn verify(&self, anchor_node: &TreeNode) -> Result<(), TreeError> {
        verify_path(self.anchor, anchor_node, self.index, &self.node, &self.witness)
    }
}
