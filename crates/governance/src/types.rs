//! Common types

use serde::{Deserialize, Serialize};
use xlayer_sumtree::{GlobalIndex, TreeNode};

pub use alloy_primitives::{Address, U256};

/// Proposal identifier
pub type ProposalId = u64;

/// Block height used as the protocol clock
pub type BlockNumber = u64;

/// Challenge identifier, unique within one proposal
pub type ChallengeId = u64;

/// Proposal lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalState {
    /// Created, voting has not started
    Pending,
    /// Primary vote
    ActivePhase1,
    /// Veto / ratification window
    ActivePhase2,
    /// Withdrawn by the proposer
    Cancelled,
    /// Blocked by the veto guardian
    Vetoed,
    /// Turnout below the required voting power
    QuorumNotMet,
    /// Lost the vote, or the root commitment was proven fraudulent
    Defeated,
    /// Passed and awaiting execution
    Succeeded,
    /// Passed but not executed within the grace period
    Expired,
    /// Executed
    Executed,
}

impl ProposalState {
    /// Whether voting is open
    pub const fn accepts_votes(self) -> bool {
        matches!(self, Self::ActivePhase1)
    }

    /// Whether the root commitment may still be disputed
    pub const fn accepts_challenges(self) -> bool {
        matches!(self, Self::Pending | Self::ActivePhase1 | Self::ActivePhase2 | Self::Succeeded)
    }

    /// Whether the proposer may still withdraw
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::ActivePhase1 | Self::ActivePhase2)
    }
}

/// Vote direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteDirection {
    /// In favour
    For,
    /// Against
    Against,
}

/// An accepted vote
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Proposal voted on
    pub proposal_id: ProposalId,
    /// Leaf whose voting power was proven
    pub voter_index: GlobalIndex,
    /// Identity registered at the leaf
    pub voter: Address,
    /// Proven weight, including power delegated to the voter
    pub voting_power: U256,
    /// Participant position the delegated power was aggregated into.
    ///
    /// Delegated power is folded into the delegate's own leaf when the tree is
    /// built, so this is the voter's position; it is kept for audit trails.
    pub delegate_index: u64,
    /// Direction
    pub direction: VoteDirection,
    /// Root-ward witness the weight was proven with
    pub witness: Vec<TreeNode>,
}

/// Payload released by a successful `execute`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTicket {
    /// Executed proposal
    pub proposal_id: ProposalId,
    /// Payload to dispatch
    pub payload: Vec<u8>,
}
