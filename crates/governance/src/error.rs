//! Governance errors

use thiserror::Error;
use xlayer_sumtree::{GlobalIndex, TreeError};

use crate::{
    challenge::ChallengeState,
    types::{Address, ChallengeId, ProposalId, ProposalState},
};

/// Failures reported by the external voting-power ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The snapshot is unknown or has been pruned
    #[error("snapshot at block {0} is not available")]
    SnapshotUnavailable(u64),
    /// No participant is registered at this position
    #[error("participant {index} does not exist at block {block}")]
    UnknownParticipant {
        /// Participant position
        index: u64,
        /// Snapshot block
        block: u64,
    },
    /// Aggregated voting power overflowed 256 bits
    #[error("voting power overflow at block {0}")]
    PowerOverflow(u64),
}

/// Errors returned by proposal, challenge and settlement operations.
///
/// A returned error never leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    /// Unknown proposal id
    #[error("proposal {0} not found")]
    ProposalNotFound(ProposalId),
    /// The snapshot block can no longer be queried
    #[error("snapshot at block {block} is no longer queryable")]
    StaleSnapshot {
        /// Requested snapshot block
        block: u64,
    },
    /// Witness, pollard or node data failed verification
    #[error("malformed proof: {0}")]
    MalformedProof(#[from] TreeError),
    /// The disputed index does not trace back to an agreed commitment
    #[error("unauthorized challenge at {index}: {reason}")]
    UnauthorizedChallenge {
        /// Disputed index
        index: GlobalIndex,
        /// Why it was rejected
        reason: &'static str,
    },
    /// The challenger already has an open challenge at this index
    #[error("{challenger} already disputes {index}")]
    ChallengeExists {
        /// Disputed index
        index: GlobalIndex,
        /// Challenger
        challenger: Address,
    },
    /// Unknown challenge id
    #[error("challenge {0} not found")]
    ChallengeNotFound(ChallengeId),
    /// The challenge is not waiting for this action
    #[error("challenge {challenge} is {state:?}")]
    InvalidChallengeState {
        /// Challenge id
        challenge: ChallengeId,
        /// Current state
        state: ChallengeState,
    },
    /// The bond was already paid out
    #[error("bond for proposal {proposal_id}, challenge {challenge:?} already settled")]
    DoubleSettlement {
        /// Proposal id
        proposal_id: ProposalId,
        /// Challenge id, `None` for the proposer bond
        challenge: Option<ChallengeId>,
    },
    /// The caller's side did not win this challenge
    #[error("challenge {challenge} ({state:?}) is not claimable by this party")]
    NotClaimable {
        /// Challenge id
        challenge: ChallengeId,
        /// Current state
        state: ChallengeState,
    },
    /// The challenge has not been resolved yet
    #[error("challenge {0} is not resolved")]
    NotResolved(ChallengeId),
    /// The caller may not perform this action
    #[error("{caller} is not allowed to {action}")]
    Unauthorized {
        /// Caller identity
        caller: Address,
        /// Attempted action
        action: &'static str,
    },
    /// The proposal state forbids this action
    #[error("cannot {action} proposal {proposal_id} in state {state:?}")]
    InvalidState {
        /// Proposal id
        proposal_id: ProposalId,
        /// Current state
        state: ProposalState,
        /// Attempted action
        action: &'static str,
    },
    /// A vote was already cast for this leaf
    #[error("leaf {0} already voted")]
    AlreadyVoted(GlobalIndex),
    /// Unresolved challenges block this action
    #[error("proposal {proposal_id} has {open} unresolved challenges")]
    ChallengesPending {
        /// Proposal id
        proposal_id: ProposalId,
        /// Number of unresolved challenges
        open: usize,
    },
    /// Configuration rejected by validation
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// Ledger lookup failed
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
