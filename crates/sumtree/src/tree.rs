//! Merkle-sum tree implementation

use alloy_primitives::U256;

use crate::{
    error::TreeError,
    index::GlobalIndex,
    node::TreeNode,
    pollard::{Pollard, effective_order},
    proof::{ChallengeProof, LeafProof},
};

/// Complete binary Merkle-sum tree over a power-of-two padded leaf array
#[derive(Clone, Debug)]
pub struct SumTree {
    /// `layers[0]` holds the padded leaves, the last layer holds the root
    layers: Vec<Vec<TreeNode>>,
    /// Number of leaves supplied before padding
    leaf_count: usize,
}

impl SumTree {
    /// Build a tree from ordered per-participant values
    pub fn build(values: &[U256]) -> Result<Self, TreeError> {
        if values.is_empty() {
            return Err(TreeError::EmptyInput);
        }

        let width = values.len().next_power_of_two();
        let mut current: Vec<TreeNode> = values.iter().copied().map(TreeNode::leaf).collect();
        current.resize(width, TreeNode::zero());

        let mut layers = Vec::with_capacity(width.trailing_zeros() as usize + 1);
        while current.len() > 1 {
            let next = current
                .chunks_exact(2)
                .map(|pair| TreeNode::combine(&pair[0], &pair[1]))
                .collect::<Result<Vec<_>, _>>()?;
            layers.push(std::mem::replace(&mut current, next));
        }
        layers.push(current);

        Ok(Self { layers, leaf_count: values.len() })
    }

    /// Depth `D`; a single leaf is a tree of depth 0
    pub fn depth(&self) -> u32 {
        (self.layers.len() - 1) as u32
    }

    /// Root node
    pub fn root(&self) -> TreeNode {
        self.layers[self.layers.len() - 1][0]
    }

    /// Number of leaves supplied before padding
    pub const fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Padded leaf layer
    pub fn leaves(&self) -> &[TreeNode] {
        &self.layers[0]
    }

    /// All nodes at `depth`, left to right
    pub fn layer_at_depth(&self, depth: u32) -> Option<&[TreeNode]> {
        let tree_depth = self.depth();
        if depth > tree_depth {
            return None;
        }
        Some(&self.layers[(tree_depth - depth) as usize])
    }

    /// Node at a global index
    pub fn node(&self, index: GlobalIndex) -> Option<&TreeNode> {
        self.layer_at_depth(index.depth())?.get(index.offset() as usize)
    }

    fn require_node(&self, index: GlobalIndex) -> Result<TreeNode, TreeError> {
        self.node(index)
            .copied()
            .ok_or(TreeError::IndexOutOfRange { index: index.get(), depth: self.depth() })
    }

    /// Siblings from `index` up to (excluding) `anchor`
    fn witness(&self, index: GlobalIndex, anchor: GlobalIndex) -> Result<Vec<TreeNode>, TreeError> {
        if !index.is_descendant_of(anchor) {
            return Err(TreeError::NotDescendant { index: index.get(), anchor: anchor.get() });
        }
        let mut witness = Vec::with_capacity((index.depth() - anchor.depth()) as usize);
        let mut cursor = index;
        while cursor != anchor {
            let sibling = cursor.sibling().ok_or(TreeError::InvalidIndex(cursor.get()))?;
            witness.push(self.require_node(sibling)?);
            cursor = cursor.parent().ok_or(TreeError::InvalidIndex(cursor.get()))?;
        }
        Ok(witness)
    }

    /// Generate a voting-power proof for the leaf at `position`
    pub fn prove_leaf(&self, position: u64) -> Result<LeafProof, TreeError> {
        let index = GlobalIndex::from_leaf(position, self.depth())?;
        let sum = self.require_node(index)?.sum;
        let witness = self.witness(index, GlobalIndex::ROOT)?;
        Ok(LeafProof { index, sum, witness })
    }

    /// Generate a challenge proof for `index` anchored at the checkpoint `anchor`
    pub fn prove_node(
        &self,
        index: GlobalIndex,
        anchor: GlobalIndex,
    ) -> Result<ChallengeProof, TreeError> {
        let node = self.require_node(index)?;
        let witness = self.witness(index, anchor)?;
        Ok(ChallengeProof { anchor, index, node, witness })
    }

    /// Reveal the `2^order` nodes beneath `index`, clamping `order` to the remaining depth
    pub fn generate_pollard(&self, order: u32, index: GlobalIndex) -> Result<Pollard, TreeError> {
        self.require_node(index)?;
        let order = effective_order(order, index.depth(), self.depth());
        let target = index.depth() + order;
        let first = index
            .first_descendant_at(target)
            .ok_or(TreeError::IndexOutOfRange { index: index.get(), depth: self.depth() })?;
        let layer = self
            .layer_at_depth(target)
            .ok_or(TreeError::IndexOutOfRange { index: first.get(), depth: self.depth() })?;
        let start = first.offset() as usize;
        let nodes = layer[start..start + (1usize << order)].to_vec();
        Ok(Pollard { index, order, nodes })
    }
}
