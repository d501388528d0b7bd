//! Proposal store
//!
//! Owns every proposal keyed by id, the bond escrow and the voting-power
//! ledger. Each operation is applied atomically: an error leaves the store
//! exactly as it was. Time is the caller-supplied block height `now`.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use xlayer_sumtree::{
    GlobalIndex, Pollard, TreeError, TreeNode, depth_for, effective_order, verify_path,
};

use crate::{
    bonds::{BondLedger, Claimant, check_batch, settlement_amount},
    challenge::ChallengeState,
    config::ProtocolConfig,
    error::{GovernanceError, LedgerError},
    ledger::VotingPowerLedger,
    proposal::Proposal,
    snapshot::{canonical_value, leaf_values, value_at},
    types::{
        Address, BlockNumber, ChallengeId, ExecutionTicket, ProposalId, ProposalState, U256,
        VoteDirection, VoteRecord,
    },
};

/// Challenge transition applied by [`ProposalStore::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeEvent {
    /// Proposal id
    pub proposal_id: ProposalId,
    /// Challenge id
    pub challenge: ChallengeId,
    /// State after the transition
    pub state: ChallengeState,
}

/// Proposal store
#[derive(Debug)]
pub struct ProposalStore<L> {
    config: ProtocolConfig,
    ledger: L,
    proposals: BTreeMap<ProposalId, Proposal>,
    next_id: ProposalId,
    bonds: BondLedger,
}

impl<L: VotingPowerLedger> ProposalStore<L> {
    /// Create a store over `ledger`
    pub fn new(config: ProtocolConfig, ledger: L) -> Result<Self, GovernanceError> {
        config.validate()?;
        Ok(Self { config, ledger, proposals: BTreeMap::new(), next_id: 1, bonds: BondLedger::new() })
    }

    /// Active configuration
    pub const fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Voting-power ledger
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable voting-power ledger
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Bond escrow
    pub const fn bonds(&self) -> &BondLedger {
        &self.bonds
    }

    /// Proposal by id
    pub fn proposal(&self, id: ProposalId) -> Result<&Proposal, GovernanceError> {
        self.proposals.get(&id).ok_or(GovernanceError::ProposalNotFound(id))
    }

    fn proposal_mut(&mut self, id: ProposalId) -> Result<&mut Proposal, GovernanceError> {
        self.proposals.get_mut(&id).ok_or(GovernanceError::ProposalNotFound(id))
    }

    /// State of proposal `id` at `now`
    pub fn state(&self, id: ProposalId, now: BlockNumber) -> Result<ProposalState, GovernanceError> {
        Ok(self.proposal(id)?.state(now))
    }

    /// Total bonds released to `identity`
    pub fn payouts(&self, identity: &Address) -> U256 {
        self.bonds.balance(identity)
    }

    /// Create a proposal committed to the root of `root_pollard`.
    ///
    /// The pollard must expand the root, at most as deep as the configured
    /// order allows for the snapshot's tree. The proposer bond is escrowed.
    pub fn propose(
        &mut self,
        proposer: Address,
        message: impl Into<String>,
        payload: Vec<u8>,
        snapshot_block: BlockNumber,
        root_pollard: Pollard,
        now: BlockNumber,
    ) -> Result<ProposalId, GovernanceError> {
        let participant_count = self.ledger.participant_count(snapshot_block).map_err(|e| match e {
            LedgerError::SnapshotUnavailable(block) => GovernanceError::StaleSnapshot { block },
            other => other.into(),
        })?;
        let tree_depth = depth_for(participant_count);
        check_root_pollard(&root_pollard, self.config.pollard_order, tree_depth)?;
        let root = root_pollard.root()?;

        let id = self.next_id;
        let mut proposal = Proposal::new(
            id,
            proposer,
            message.into(),
            payload,
            snapshot_block,
            root_pollard.clone(),
            root,
            tree_depth,
            participant_count,
            &self.config,
            now,
        );
        proposal.challenges.commit_pollard(&root_pollard)?;

        info!(
            target: "governance",
            proposal_id = id,
            %proposer,
            snapshot_block,
            tree_depth,
            root = %root,
            votes_required = %proposal.votes_required,
            "proposal created"
        );
        self.bonds.escrow(proposal.proposer_bond);
        self.proposals.insert(id, proposal);
        self.next_id += 1;
        Ok(id)
    }

    /// Replace the root pollard with a wider one while the proposal is pending
    pub fn submit_root(
        &mut self,
        id: ProposalId,
        caller: Address,
        pollard: Pollard,
        now: BlockNumber,
    ) -> Result<(), GovernanceError> {
        let proposal = self.proposal_mut(id)?;
        if caller != proposal.proposer {
            return Err(GovernanceError::Unauthorized { caller, action: "submit a root" });
        }
        let state = proposal.state(now);
        if state != ProposalState::Pending {
            return Err(GovernanceError::InvalidState { proposal_id: id, state, action: "submit a root" });
        }
        check_root_pollard(&pollard, proposal.tree_depth, proposal.tree_depth)?;
        if pollard.order <= proposal.root_pollard.order {
            return Err(TreeError::InvalidPollard(format!(
                "order {} does not widen committed order {}",
                pollard.order, proposal.root_pollard.order
            ))
            .into());
        }
        pollard.verify(&proposal.root())?;
        proposal.challenges.commit_pollard(&pollard)?;
        debug!(target: "governance", proposal_id = id, order = pollard.order, "root pollard widened");
        proposal.root_pollard = pollard;
        Ok(())
    }

    /// Cast `voting_power` proven by `witness` against the committed root
    #[allow(clippy::too_many_arguments)]
    pub fn vote(
        &mut self,
        id: ProposalId,
        voter: Address,
        direction: VoteDirection,
        voting_power: U256,
        voter_index: GlobalIndex,
        witness: Vec<TreeNode>,
        now: BlockNumber,
    ) -> Result<(), GovernanceError> {
        let proposal = self.proposals.get_mut(&id).ok_or(GovernanceError::ProposalNotFound(id))?;
        let state = proposal.state(now);
        if !state.accepts_votes() {
            return Err(GovernanceError::InvalidState { proposal_id: id, state, action: "vote on" });
        }
        let position = voter_index.leaf_position(proposal.tree_depth).ok_or(
            TreeError::IndexOutOfRange { index: voter_index.get(), depth: proposal.tree_depth },
        )?;
        verify_path(
            GlobalIndex::ROOT,
            &proposal.root(),
            voter_index,
            &TreeNode::leaf(voting_power),
            &witness,
        )?;
        if position >= proposal.participant_count ||
            self.ledger.participant_at(position, proposal.snapshot_block)? != voter
        {
            return Err(GovernanceError::Unauthorized { caller: voter, action: "vote with this leaf" });
        }
        if proposal.votes.contains_key(&voter_index) {
            return Err(GovernanceError::AlreadyVoted(voter_index));
        }

        match direction {
            VoteDirection::For => proposal.votes_for = proposal.votes_for.saturating_add(voting_power),
            VoteDirection::Against => {
                proposal.votes_against = proposal.votes_against.saturating_add(voting_power)
            }
        }
        proposal.votes.insert(
            voter_index,
            VoteRecord {
                proposal_id: id,
                voter_index,
                voter,
                voting_power,
                delegate_index: position,
                direction,
                witness,
            },
        );
        info!(target: "governance", proposal_id = id, %voter, direction = ?direction, power = %voting_power, "vote cast");
        Ok(())
    }

    /// Dispute the proposer's node at `index`, escrowing the challenger bond
    pub fn create_challenge(
        &mut self,
        id: ProposalId,
        challenger: Address,
        index: GlobalIndex,
        claimed_node: TreeNode,
        witness: &[TreeNode],
        now: BlockNumber,
    ) -> Result<(ChallengeId, ChallengeState), GovernanceError> {
        let bond = self.config.challenger_bond;
        let proposal = self.proposal_mut(id)?;
        let state = proposal.state(now);
        if !state.accepts_challenges() {
            return Err(GovernanceError::InvalidState { proposal_id: id, state, action: "challenge" });
        }
        let (challenge, opened) =
            proposal.challenges.open(challenger, bond, index, claimed_node, witness, now)?;
        self.bonds.escrow(bond);
        info!(target: "governance", proposal_id = id, challenge, index = %index, %challenger, "challenge created");
        Ok((challenge, opened))
    }

    /// Proposer reveals `pollard` for `challenge`
    pub fn respond_to_challenge(
        &mut self,
        id: ProposalId,
        caller: Address,
        challenge: ChallengeId,
        pollard: Pollard,
        now: BlockNumber,
    ) -> Result<ChallengeState, GovernanceError> {
        let proposal = self.proposal_mut(id)?;
        if caller != proposal.proposer {
            return Err(GovernanceError::Unauthorized { caller, action: "respond to a challenge" });
        }
        let state = proposal.challenges.respond(challenge, pollard, now)?;
        if state == ChallengeState::ResolvedForChallenger {
            warn!(target: "governance", proposal_id = id, challenge, "late response, challenge forfeited");
        }
        Ok(state)
    }

    /// Challenger keeps disputing `child`
    pub fn pick_child(
        &mut self,
        id: ProposalId,
        caller: Address,
        challenge: ChallengeId,
        child: GlobalIndex,
        now: BlockNumber,
    ) -> Result<ChallengeState, GovernanceError> {
        let proposal = self.proposal_mut(id)?;
        let state = proposal.challenges.pick(challenge, caller, child, now)?;
        if state == ChallengeState::ResolvedForProposer {
            warn!(target: "governance", proposal_id = id, challenge, "late pick, challenge forfeited");
        }
        Ok(state)
    }

    /// Finalize a challenge that timed out or reached a leaf.
    ///
    /// Leaf claims are compared with the canonical snapshot; a mismatch
    /// defeats the proposal.
    pub fn defeat_proposal(
        &mut self,
        id: ProposalId,
        challenge: ChallengeId,
        now: BlockNumber,
    ) -> Result<ChallengeState, GovernanceError> {
        let proposal = self.proposals.get_mut(&id).ok_or(GovernanceError::ProposalNotFound(id))?;
        let current =
            proposal.challenges.get(challenge).ok_or(GovernanceError::ChallengeNotFound(challenge))?;
        let outcome = if current.state == ChallengeState::AwaitingLeafResolution {
            let canonical =
                leaf_canonical(&self.ledger, proposal, current.index).map_err(|e| match e {
                    LedgerError::SnapshotUnavailable(block) => GovernanceError::StaleSnapshot { block },
                    other => other.into(),
                })?;
            proposal.challenges.resolve_leaf(challenge, canonical)?
        } else {
            let state = current.state;
            proposal
                .challenges
                .forfeit(challenge, now)?
                .ok_or(GovernanceError::InvalidChallengeState { challenge, state })?
        };
        log_outcome(id, challenge, outcome);
        Ok(outcome)
    }

    /// Apply deadline forfeits and resolve leaf-level challenges across all proposals.
    ///
    /// The snapshot is read once per proposal with challenges at a leaf.
    pub fn tick(&mut self, now: BlockNumber) -> Vec<ChallengeEvent> {
        let mut events = Vec::new();
        for (id, proposal) in &mut self.proposals {
            for (challenge, state) in proposal.challenges.expire(now) {
                log_outcome(*id, challenge, state);
                events.push(ChallengeEvent { proposal_id: *id, challenge, state });
            }

            let at_leaf: Vec<(ChallengeId, GlobalIndex)> = proposal
                .challenges
                .challenges()
                .filter(|c| c.state == ChallengeState::AwaitingLeafResolution)
                .map(|c| (c.id, c.index))
                .collect();
            if at_leaf.is_empty() {
                continue;
            }
            let values = match leaf_values(&self.ledger, proposal.snapshot_block) {
                Ok(values) => values,
                Err(e) => {
                    warn!(target: "governance", proposal_id = *id, pending = at_leaf.len(), error = %e, "leaf resolution skipped");
                    continue;
                }
            };
            for (challenge, index) in at_leaf {
                let position = index.leaf_position(proposal.tree_depth).unwrap_or(u64::MAX);
                // an earlier resolution in this pass may have cancelled it
                if let Ok(state) = proposal.challenges.resolve_leaf(challenge, value_at(&values, position)) {
                    log_outcome(*id, challenge, state);
                    events.push(ChallengeEvent { proposal_id: *id, challenge, state });
                }
            }
        }
        events
    }

    /// Proposer withdraws the proposal; a defeated proposal stays defeated
    pub fn cancel(
        &mut self,
        id: ProposalId,
        caller: Address,
        now: BlockNumber,
    ) -> Result<ProposalState, GovernanceError> {
        let proposal = self.proposal_mut(id)?;
        if caller != proposal.proposer {
            return Err(GovernanceError::Unauthorized { caller, action: "cancel" });
        }
        let state = proposal.state(now);
        if state == ProposalState::Defeated {
            return Ok(state);
        }
        if !state.is_cancellable() {
            return Err(GovernanceError::InvalidState { proposal_id: id, state, action: "cancel" });
        }
        proposal.cancelled = true;
        info!(target: "governance", proposal_id = id, previous = ?state, "proposal cancelled");
        Ok(ProposalState::Cancelled)
    }

    /// Guardian blocks the proposal during either voting phase
    pub fn veto(
        &mut self,
        id: ProposalId,
        caller: Address,
        now: BlockNumber,
    ) -> Result<(), GovernanceError> {
        if self.config.veto_guardian != Some(caller) {
            return Err(GovernanceError::Unauthorized { caller, action: "veto" });
        }
        let proposal = self.proposal_mut(id)?;
        let state = proposal.state(now);
        if !matches!(state, ProposalState::ActivePhase1 | ProposalState::ActivePhase2) {
            return Err(GovernanceError::InvalidState { proposal_id: id, state, action: "veto" });
        }
        proposal.vetoed = true;
        info!(target: "governance", proposal_id = id, previous = ?state, "proposal vetoed");
        Ok(())
    }

    /// Execute a succeeded proposal with no unresolved challenges
    pub fn execute(
        &mut self,
        id: ProposalId,
        now: BlockNumber,
    ) -> Result<ExecutionTicket, GovernanceError> {
        let proposal = self.proposal_mut(id)?;
        let state = proposal.state(now);
        if state != ProposalState::Succeeded {
            return Err(GovernanceError::InvalidState { proposal_id: id, state, action: "execute" });
        }
        let open = proposal.challenges.unresolved_count();
        if open > 0 {
            return Err(GovernanceError::ChallengesPending { proposal_id: id, open });
        }
        proposal.executed = true;
        info!(target: "governance", proposal_id = id, payload = %hex::encode(&proposal.payload), "proposal executed");
        Ok(ExecutionTicket { proposal_id: id, payload: proposal.payload.clone() })
    }

    /// Proposer collects challenger bonds from challenges it won
    pub fn claim_bond_proposer(
        &mut self,
        id: ProposalId,
        caller: Address,
        challenges: &[ChallengeId],
    ) -> Result<U256, GovernanceError> {
        let proposal = self.proposals.get_mut(&id).ok_or(GovernanceError::ProposalNotFound(id))?;
        if caller != proposal.proposer {
            return Err(GovernanceError::Unauthorized { caller, action: "claim proposer bonds" });
        }
        check_batch(id, challenges)?;
        let mut total = U256::ZERO;
        for challenge_id in challenges {
            let challenge = proposal
                .challenges
                .get(*challenge_id)
                .ok_or(GovernanceError::ChallengeNotFound(*challenge_id))?;
            let amount = settlement_amount(id, Claimant::Proposer, challenge, U256::ZERO)?;
            total = total.saturating_add(amount);
        }

        for challenge_id in challenges {
            if let Some(challenge) = proposal.challenges.get_mut(*challenge_id) {
                challenge.settled = true;
            }
        }
        self.bonds.release(caller, total);
        info!(target: "governance", proposal_id = id, %caller, count = challenges.len(), amount = %total, "proposer bonds claimed");
        Ok(total)
    }

    /// Challenger collects refunds and winnings from its challenges
    pub fn claim_bond_challenger(
        &mut self,
        id: ProposalId,
        caller: Address,
        challenges: &[ChallengeId],
    ) -> Result<U256, GovernanceError> {
        let proposal = self.proposals.get_mut(&id).ok_or(GovernanceError::ProposalNotFound(id))?;
        check_batch(id, challenges)?;
        let proposer_bond =
            if proposal.proposer_bond_settled { U256::ZERO } else { proposal.proposer_bond };
        let mut total = U256::ZERO;
        let mut takes_proposer_bond = false;
        for challenge_id in challenges {
            let challenge = proposal
                .challenges
                .get(*challenge_id)
                .ok_or(GovernanceError::ChallengeNotFound(*challenge_id))?;
            if challenge.challenger != caller {
                return Err(GovernanceError::Unauthorized { caller, action: "claim this challenge bond" });
            }
            let amount = settlement_amount(id, Claimant::Challenger, challenge, proposer_bond)?;
            takes_proposer_bond |= challenge.state == ChallengeState::ResolvedForChallenger;
            total = total.saturating_add(amount);
        }

        for challenge_id in challenges {
            if let Some(challenge) = proposal.challenges.get_mut(*challenge_id) {
                challenge.settled = true;
            }
        }
        if takes_proposer_bond {
            proposal.proposer_bond_settled = true;
        }
        self.bonds.release(caller, total);
        info!(target: "governance", proposal_id = id, %caller, count = challenges.len(), amount = %total, "challenger bonds claimed");
        Ok(total)
    }

    /// Return the proposer bond once the proposal ended without proven fraud
    pub fn reclaim_proposal_bond(
        &mut self,
        id: ProposalId,
        caller: Address,
        now: BlockNumber,
    ) -> Result<U256, GovernanceError> {
        let proposal = self.proposals.get_mut(&id).ok_or(GovernanceError::ProposalNotFound(id))?;
        if caller != proposal.proposer {
            return Err(GovernanceError::Unauthorized { caller, action: "reclaim the proposal bond" });
        }
        if proposal.proposer_bond_settled {
            return Err(GovernanceError::DoubleSettlement { proposal_id: id, challenge: None });
        }
        let state = proposal.state(now);
        let terminal = matches!(
            state,
            ProposalState::Cancelled |
                ProposalState::Vetoed |
                ProposalState::QuorumNotMet |
                ProposalState::Defeated |
                ProposalState::Expired |
                ProposalState::Executed
        );
        if !terminal || proposal.defeated_by().is_some() {
            return Err(GovernanceError::InvalidState { proposal_id: id, state, action: "reclaim the bond of" });
        }
        let open = proposal.challenges.unresolved_count();
        if open > 0 {
            return Err(GovernanceError::ChallengesPending { proposal_id: id, open });
        }

        proposal.proposer_bond_settled = true;
        let amount = proposal.proposer_bond;
        self.bonds.release(caller, amount);
        info!(target: "governance", proposal_id = id, amount = %amount, "proposal bond reclaimed");
        Ok(amount)
    }
}

/// Root pollard must expand the root with `0 < order <= effective order`
fn check_root_pollard(pollard: &Pollard, order: u32, tree_depth: u32) -> Result<(), TreeError> {
    if !pollard.index.is_root() {
        return Err(TreeError::InvalidPollard(format!("root pollard expands {}", pollard.index)));
    }
    let max = effective_order(order, 0, tree_depth);
    if pollard.order > max || (pollard.order == 0 && max > 0) {
        return Err(TreeError::InvalidPollard(format!(
            "root pollard order {} outside 1..={max}",
            pollard.order
        )));
    }
    pollard.check_shape()
}

fn leaf_canonical<L: VotingPowerLedger>(
    ledger: &L,
    proposal: &Proposal,
    index: GlobalIndex,
) -> Result<U256, LedgerError> {
    let position = index.leaf_position(proposal.tree_depth).unwrap_or(u64::MAX);
    canonical_value(ledger, proposal.snapshot_block, position)
}

fn log_outcome(id: ProposalId, challenge: ChallengeId, state: ChallengeState) {
    match state {
        ChallengeState::ResolvedForChallenger => {
            warn!(target: "governance", proposal_id = id, challenge, "proposal defeated by challenge")
        }
        _ => info!(target: "governance", proposal_id = id, challenge, state = ?state, "challenge resolved"),
    }
}
