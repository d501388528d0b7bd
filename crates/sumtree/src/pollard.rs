//! Pollards: bounded windows of nodes beneath a committed node

use serde::{Deserialize, Serialize};

use crate::{
    error::TreeError,
    index::{GlobalIndex, MAX_DEPTH},
    node::TreeNode,
};

/// Clamp a requested pollard order to the depth remaining below `index_depth`.
///
/// Starting from the root with a fixed order this yields `order` every round
/// except the last, which is `tree_depth % order` when that is non-zero.
pub const fn effective_order(requested: u32, index_depth: u32, tree_depth: u32) -> u32 {
    let remaining = tree_depth.saturating_sub(index_depth);
    if requested < remaining { requested } else { remaining }
}

/// All `2^order` nodes sitting `order` levels beneath `index`, left to right
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pollard {
    /// Node whose decomposition is revealed
    pub index: GlobalIndex,
    /// Levels revealed beneath `index`
    pub order: u32,
    /// Revealed nodes in left-before-right order
    pub nodes: Vec<TreeNode>,
}

impl Pollard {
    /// Depth of the revealed nodes
    pub const fn depth(&self) -> u32 {
        self.index.depth().saturating_add(self.order)
    }

    /// Check that the node count and index range match the order
    pub fn check_shape(&self) -> Result<(), TreeError> {
        if self.depth() > MAX_DEPTH {
            return Err(TreeError::InvalidPollard(format!(
                "order {} below {} exceeds addressable depth",
                self.order, self.index
            )));
        }
        let width = 1usize << self.order;
        if self.nodes.len() != width {
            return Err(TreeError::InvalidPollard(format!(
                "order {} requires {width} nodes, got {}",
                self.order,
                self.nodes.len()
            )));
        }
        Ok(())
    }

    /// Global index of the first revealed node
    fn first_index(&self) -> Result<GlobalIndex, TreeError> {
        self.index
            .first_descendant_at(self.depth())
            .ok_or_else(|| TreeError::InvalidPollard(format!("no descendants below {}", self.index)))
    }

    /// Recombine the revealed nodes pairwise up to the node at `index`
    pub fn root(&self) -> Result<TreeNode, TreeError> {
        self.check_shape()?;
        let mut layer = self.nodes.clone();
        while layer.len() > 1 {
            layer = layer
                .chunks_exact(2)
                .map(|pair| TreeNode::combine(&pair[0], &pair[1]))
                .collect::<Result<Vec<_>, _>>()?;
        }
        Ok(layer[0])
    }

    /// Verify the pollard expands `expected`
    pub fn verify(&self, expected: &TreeNode) -> Result<(), TreeError> {
        if self.root()? != *expected {
            return Err(TreeError::ProofMismatch);
        }
        Ok(())
    }

    /// Revealed nodes paired with their global indices
    pub fn entries(&self) -> Result<Vec<(GlobalIndex, TreeNode)>, TreeError> {
        self.check_shape()?;
        let first = self.first_index()?.get();
        Ok(self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| GlobalIndex::new(first + i as u64).map(|index| (index, *node)))
            .collect())
    }

    /// Node revealed at `index`, if this pollard covers it
    pub fn node_at(&self, index: GlobalIndex) -> Option<&TreeNode> {
        if index.depth() != self.depth() || !index.is_descendant_of(self.index) {
            return None;
        }
        let first = self.first_index().ok()?;
        self.nodes.get((index.get() - first.get()) as usize)
    }
}
