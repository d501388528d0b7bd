//! Proposal record and state derivation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use xlayer_sumtree::{GlobalIndex, Pollard, TreeNode};

use crate::{
    challenge::ChallengeBook,
    config::ProtocolConfig,
    types::{Address, BlockNumber, ChallengeId, ProposalId, ProposalState, U256, VoteRecord},
};

/// A governance proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Identifier
    pub id: ProposalId,
    /// Author
    pub proposer: Address,
    /// Human-readable description
    pub message: String,
    /// Opaque payload released on execution
    pub payload: Vec<u8>,
    /// Block the voting power was measured at
    pub snapshot_block: BlockNumber,
    /// Widest root pollard the proposer has committed to
    pub root_pollard: Pollard,
    /// Depth of the committed tree
    pub tree_depth: u32,
    /// Participants in the snapshot
    pub participant_count: u64,
    /// Voting power needed for quorum and passage
    pub votes_required: U256,
    /// Power voted in favour
    pub votes_for: U256,
    /// Power voted against
    pub votes_against: U256,
    /// Block the proposal was created at
    pub created_at: BlockNumber,
    /// First block of the primary vote
    pub start_block: BlockNumber,
    /// First block after the primary vote
    pub phase1_end: BlockNumber,
    /// First block after the veto window
    pub phase2_end: BlockNumber,
    /// First block the proposal can no longer be executed
    pub execution_deadline: BlockNumber,
    /// Posted proposer bond
    pub proposer_bond: U256,
    /// Whether the proposer bond has been paid out
    pub proposer_bond_settled: bool,
    /// Withdrawn by the proposer
    pub cancelled: bool,
    /// Blocked by the guardian
    pub vetoed: bool,
    /// Executed
    pub executed: bool,
    /// Committed nodes and disputes
    pub challenges: ChallengeBook,
    /// Accepted votes by voter leaf
    pub votes: BTreeMap<GlobalIndex, VoteRecord>,
}

impl Proposal {
    /// Lay out a new proposal's schedule from `config`
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ProposalId,
        proposer: Address,
        message: String,
        payload: Vec<u8>,
        snapshot_block: BlockNumber,
        root_pollard: Pollard,
        root: TreeNode,
        tree_depth: u32,
        participant_count: u64,
        config: &ProtocolConfig,
        now: BlockNumber,
    ) -> Self {
        let start_block = now.saturating_add(config.voting_delay);
        let phase1_end = start_block.saturating_add(config.phase1_period);
        let phase2_end = phase1_end.saturating_add(config.phase2_period);
        Self {
            id,
            proposer,
            message,
            payload,
            snapshot_block,
            root_pollard,
            tree_depth,
            participant_count,
            votes_required: config.votes_required(root.sum),
            votes_for: U256::ZERO,
            votes_against: U256::ZERO,
            created_at: now,
            start_block,
            phase1_end,
            phase2_end,
            execution_deadline: phase2_end.saturating_add(config.execution_grace),
            proposer_bond: config.proposer_bond,
            proposer_bond_settled: false,
            cancelled: false,
            vetoed: false,
            executed: false,
            challenges: ChallengeBook::new(tree_depth, config.pollard_order, config.response_window, root),
            votes: BTreeMap::new(),
        }
    }

    /// Committed root node
    pub const fn root(&self) -> TreeNode {
        self.challenges.root()
    }

    /// Challenge that proved the root fraudulent, if any
    pub const fn defeated_by(&self) -> Option<ChallengeId> {
        self.challenges.fraud_proven()
    }

    /// State at block `now`
    pub fn state(&self, now: BlockNumber) -> ProposalState {
        if self.defeated_by().is_some() {
            return ProposalState::Defeated;
        }
        if self.executed {
            return ProposalState::Executed;
        }
        if self.cancelled {
            return ProposalState::Cancelled;
        }
        if self.vetoed {
            return ProposalState::Vetoed;
        }
        if now < self.start_block {
            return ProposalState::Pending;
        }
        if now < self.phase1_end {
            return ProposalState::ActivePhase1;
        }
        if now < self.phase2_end {
            return ProposalState::ActivePhase2;
        }
        self.tally_state(now)
    }

    fn tally_state(&self, now: BlockNumber) -> ProposalState {
        let turnout = self.votes_for.saturating_add(self.votes_against);
        if turnout < self.votes_required {
            ProposalState::QuorumNotMet
        } else if self.votes_for < self.votes_required || self.votes_for <= self.votes_against {
            ProposalState::Defeated
        } else if now >= self.execution_deadline {
            ProposalState::Expired
        } else {
            ProposalState::Succeeded
        }
    }
}
