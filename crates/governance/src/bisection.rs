//! Off-chain bisection participant

use xlayer_sumtree::{GlobalIndex, Pollard, SumTree, TreeError, TreeNode};

/// Bisection manager
///
/// Holds a party's own view of the voting-power tree. The proposer side answers
/// challenges with pollards; the challenger side compares revealed pollards
/// against its honest tree and names the child to keep disputing.
#[derive(Debug)]
pub struct BisectionManager {
    /// Tree built from this party's snapshot
    tree: SumTree,
    /// Requested pollard order
    order: u32,
    /// Node currently disputed
    current: GlobalIndex,
    /// Is this manager for proposer or challenger
    is_proposer: bool,
}

impl BisectionManager {
    /// Create a new bisection manager
    pub fn new(tree: SumTree, order: u32, is_proposer: bool) -> Self {
        Self { tree, order, current: GlobalIndex::ROOT, is_proposer }
    }

    /// This party's tree
    pub const fn tree(&self) -> &SumTree {
        &self.tree
    }

    /// Whether this manager plays the proposer
    pub const fn is_proposer(&self) -> bool {
        self.is_proposer
    }

    /// Node currently disputed
    pub const fn current(&self) -> GlobalIndex {
        self.current
    }

    /// Pollard revealing our nodes beneath `index`
    pub fn respond(&mut self, index: GlobalIndex) -> Result<Pollard, TreeError> {
        self.current = index;
        self.tree.generate_pollard(self.order, index)
    }

    /// Our node at `index`
    pub fn node(&self, index: GlobalIndex) -> Option<TreeNode> {
        self.tree.node(index).copied()
    }

    /// First revealed node that differs from ours, left to right
    pub fn find_dispute(&self, pollard: &Pollard) -> Result<Option<(GlobalIndex, TreeNode)>, TreeError> {
        Ok(pollard
            .entries()?
            .into_iter()
            .find(|(index, theirs)| self.tree.node(*index) != Some(theirs)))
    }

    /// Process opponent's pollard and decide response
    pub fn process_pollard(&mut self, pollard: &Pollard) -> Result<BisectionResponse, TreeError> {
        let Some((pick, theirs)) = self.find_dispute(pollard)? else {
            return Ok(BisectionResponse::Agree);
        };
        self.current = pick;

        if self.is_bisection_complete() {
            let position = pick.leaf_position(self.tree.depth()).ok_or(TreeError::IndexOutOfRange {
                index: pick.get(),
                depth: self.tree.depth(),
            })?;
            Ok(BisectionResponse::Complete { disputed_leaf: pick, position })
        } else {
            Ok(BisectionResponse::Disagree {
                pick,
                ours: self.node(pick).unwrap_or_else(TreeNode::zero),
                theirs,
            })
        }
    }

    /// Check if bisection is complete (narrowed to a single leaf)
    pub fn is_bisection_complete(&self) -> bool {
        self.current.depth() >= self.tree.depth()
    }

    /// Get the disputed leaf position (after bisection completes)
    pub fn disputed_leaf(&self) -> Option<u64> {
        self.current.leaf_position(self.tree.depth())
    }
}

/// Bisection response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BisectionResponse {
    /// Every revealed node matches our tree
    Agree,
    /// Keep disputing `pick`
    Disagree {
        /// First revealed node we dispute
        pick: GlobalIndex,
        /// Our node at `pick`
        ours: TreeNode,
        /// Opponent's node at `pick`
        theirs: TreeNode,
    },
    /// Bisection is complete, identified the disputed leaf
    Complete {
        /// Global index of the disputed leaf
        disputed_leaf: GlobalIndex,
        /// Participant position of that leaf
        position: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn create_test_tree(len: u64, tampered: Option<u64>) -> SumTree {
        let values: Vec<U256> = (0..len)
            .map(|i| if Some(i) == tampered { U256::from(i + 1_000) } else { U256::from(i) })
            .collect();
        SumTree::build(&values).unwrap()
    }

    #[test]
    fn test_bisection_complete() {
        let mut proposer = BisectionManager::new(create_test_tree(1000, Some(617)), 2, true);
        let mut challenger = BisectionManager::new(create_test_tree(1000, None), 2, false);

        let mut index = GlobalIndex::ROOT;
        let mut round = 0;
        let disputed = loop {
            let pollard = proposer.respond(index).unwrap();
            round += 1;
            match challenger.process_pollard(&pollard).unwrap() {
                BisectionResponse::Disagree { pick, .. } => index = pick,
                BisectionResponse::Complete { position, .. } => break position,
                BisectionResponse::Agree => panic!("dishonest tree must be disputed"),
            }
        };

        assert_eq!(disputed, 617);
        assert!(challenger.is_bisection_complete());
        assert_eq!(challenger.disputed_leaf(), Some(617));
        assert_eq!(round, 5); // depth 10 in steps of 2
    }

    #[test]
    fn test_honest_pollard_agrees() {
        let proposer = BisectionManager::new(create_test_tree(6, None), 1, true);
        let mut challenger = BisectionManager::new(create_test_tree(6, None), 1, false);
        let pollard = proposer.tree().generate_pollard(1, GlobalIndex::ROOT).unwrap();
        assert_eq!(challenger.process_pollard(&pollard).unwrap(), BisectionResponse::Agree);
        assert!(!challenger.is_bisection_complete());
    }

    #[test]
    fn test_first_difference_is_picked() {
        let mut proposer = BisectionManager::new(create_test_tree(4, Some(3)), 1, true);
        let mut challenger = BisectionManager::new(create_test_tree(4, None), 1, false);

        let pollard = proposer.respond(GlobalIndex::ROOT).unwrap();
        let response = challenger.process_pollard(&pollard).unwrap();
        let BisectionResponse::Disagree { pick, ours, theirs } = response else {
            panic!("expected disagreement, got {response:?}");
        };
        assert_eq!(pick.get(), 3);
        assert_ne!(ours, theirs);
    }
}
