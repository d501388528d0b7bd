//! Bond escrow and payouts

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    challenge::{Challenge, ChallengeState},
    error::GovernanceError,
    types::{Address, ChallengeId, ProposalId, U256},
};

/// Side claiming a challenge bond
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Claimant {
    /// The proposal's author
    Proposer,
    /// The party that opened the challenge
    Challenger,
}

/// Escrowed bonds and released payouts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BondLedger {
    escrowed: U256,
    payouts: HashMap<Address, U256>,
}

impl BondLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a posted bond
    pub fn escrow(&mut self, amount: U256) {
        self.escrowed = self.escrowed.saturating_add(amount);
    }

    /// Release escrowed funds to `to`
    pub fn release(&mut self, to: Address, amount: U256) {
        self.escrowed = self.escrowed.saturating_sub(amount);
        let balance = self.payouts.entry(to).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Total still locked
    pub const fn escrowed(&self) -> U256 {
        self.escrowed
    }

    /// Total released to `identity`
    pub fn balance(&self, identity: &Address) -> U256 {
        self.payouts.get(identity).copied().unwrap_or_default()
    }
}

/// Amount `claimant` may take from `challenge`.
///
/// | outcome | proposer | challenger |
/// |---|---|---|
/// | `ResolvedForProposer` | challenger bond | not claimable |
/// | `ResolvedForChallenger` | not claimable | challenger bond + proposer bond |
/// | `Cancelled` | not claimable | challenger bond |
pub fn settlement_amount(
    proposal_id: ProposalId,
    claimant: Claimant,
    challenge: &Challenge,
    proposer_bond: U256,
) -> Result<U256, GovernanceError> {
    let id = challenge.id;
    if challenge.settled {
        return Err(GovernanceError::DoubleSettlement { proposal_id, challenge: Some(id) });
    }
    match (claimant, challenge.state) {
        (_, state) if state.is_active() => Err(GovernanceError::NotResolved(id)),
        (Claimant::Proposer, ChallengeState::ResolvedForProposer) |
        (Claimant::Challenger, ChallengeState::Cancelled) => Ok(challenge.bond),
        (Claimant::Challenger, ChallengeState::ResolvedForChallenger) => {
            Ok(challenge.bond.saturating_add(proposer_bond))
        }
        (_, state) => Err(GovernanceError::NotClaimable { challenge: id, state }),
    }
}

/// Reject batches naming the same challenge twice
pub(crate) fn check_batch(proposal_id: ProposalId, ids: &[ChallengeId]) -> Result<(), GovernanceError> {
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) {
            return Err(GovernanceError::DoubleSettlement { proposal_id, challenge: Some(*id) });
        }
    }
    Ok(())
}
