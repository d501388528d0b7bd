//! Bisection challenge state machine
//!
//! A [`ChallengeBook`] holds every node the proposer has committed to for one
//! proposal, and every challenge opened against those commitments. Each
//! challenge narrows one disputed node round by round until it reaches a leaf,
//! where the claimed value is checked against the canonical snapshot.
//!
//! Any number of challengers may dispute the same node. Only a leaf checked
//! against the snapshot settles other disputes; a forfeit settles nothing
//! beyond the forfeited challenge.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use xlayer_sumtree::{GlobalIndex, Pollard, TreeError, TreeNode, effective_order, verify_path};

use crate::{
    error::GovernanceError,
    types::{Address, BlockNumber, ChallengeId, U256},
};

/// Challenge state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeState {
    /// Proposer must reveal a pollard beneath the disputed node
    AwaitingProposerResponse,
    /// Challenger must pick one revealed child to keep disputing
    AwaitingChallengerPick,
    /// Leaf reached; anyone may compare it with the canonical snapshot
    AwaitingLeafResolution,
    /// The proposer's claim stood
    ResolvedForProposer,
    /// The proposer's claim was proven wrong or abandoned
    ResolvedForChallenger,
    /// Made moot by another resolution
    Cancelled,
}

impl ChallengeState {
    /// Whether the challenge reached a final outcome
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::ResolvedForProposer | Self::ResolvedForChallenger | Self::Cancelled)
    }

    /// Whether the challenge still waits on a party
    pub const fn is_active(self) -> bool {
        !self.is_resolved()
    }
}

/// A single dispute
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Identifier within the proposal
    pub id: ChallengeId,
    /// Index the challenge was opened at
    pub opened_at: GlobalIndex,
    /// Node currently disputed
    pub index: GlobalIndex,
    /// Proposer's committed node at `index`
    pub claimed: TreeNode,
    /// Party that opened the challenge
    pub challenger: Address,
    /// Bond posted by the challenger
    pub bond: U256,
    /// Last block the waiting party may act at
    pub deadline: Option<BlockNumber>,
    /// Current state
    pub state: ChallengeState,
    /// Pollards answered so far
    pub rounds: u32,
    /// Pollard revealed in the current round
    pub revealed: Option<Pollard>,
    /// Whether the bond has been paid out
    pub settled: bool,
}

impl Challenge {
    fn is_overdue(&self, now: BlockNumber) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }
}

/// Commitments and challenges of one proposal
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChallengeBook {
    tree_depth: u32,
    pollard_order: u32,
    response_window: u64,
    root: TreeNode,
    commitments: BTreeMap<GlobalIndex, TreeNode>,
    challenges: BTreeMap<ChallengeId, Challenge>,
    next_challenge: ChallengeId,
    fraud_proven: Option<ChallengeId>,
}

impl ChallengeBook {
    /// Create a book for a tree of depth `tree_depth` committed to `root`
    pub fn new(tree_depth: u32, pollard_order: u32, response_window: u64, root: TreeNode) -> Self {
        let mut commitments = BTreeMap::new();
        commitments.insert(GlobalIndex::ROOT, root);
        Self {
            tree_depth,
            pollard_order,
            response_window,
            root,
            commitments,
            challenges: BTreeMap::new(),
            next_challenge: 1,
            fraud_proven: None,
        }
    }

    /// Depth of the committed tree
    pub const fn tree_depth(&self) -> u32 {
        self.tree_depth
    }

    /// Levels revealed per round
    pub const fn pollard_order(&self) -> u32 {
        self.pollard_order
    }

    /// Committed root node
    pub const fn root(&self) -> TreeNode {
        self.root
    }

    /// Node the proposer committed to at `index`, if revealed
    pub fn commitment(&self, index: GlobalIndex) -> Option<&TreeNode> {
        self.commitments.get(&index)
    }

    /// Number of committed nodes
    pub fn commitment_count(&self) -> usize {
        self.commitments.len()
    }

    /// Record a verified pollard's nodes as commitments.
    ///
    /// The pollard must expand a node that is already committed.
    pub fn commit_pollard(&mut self, pollard: &Pollard) -> Result<(), GovernanceError> {
        let parent = *self.commitments.get(&pollard.index).ok_or(
            GovernanceError::UnauthorizedChallenge {
                index: pollard.index,
                reason: "pollard expands an uncommitted node",
            },
        )?;
        if pollard.depth() > self.tree_depth {
            return Err(TreeError::InvalidPollard(format!(
                "pollard reaches depth {} beyond tree depth {}",
                pollard.depth(),
                self.tree_depth
            ))
            .into());
        }
        pollard.verify(&parent)?;
        for (index, node) in pollard.entries()? {
            self.commitments.entry(index).or_insert(node);
        }
        Ok(())
    }

    /// Challenge by id
    pub fn get(&self, id: ChallengeId) -> Option<&Challenge> {
        self.challenges.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ChallengeId) -> Option<&mut Challenge> {
        self.challenges.get_mut(&id)
    }

    /// All challenges in opening order
    pub fn challenges(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.values()
    }

    /// Challenges not yet resolved
    pub fn unresolved_count(&self) -> usize {
        self.challenges.values().filter(|c| c.state.is_active()).count()
    }

    /// Challenge that proved the commitment fraudulent
    pub const fn fraud_proven(&self) -> Option<ChallengeId> {
        self.fraud_proven
    }

    fn lookup(&self, id: ChallengeId) -> Result<&Challenge, GovernanceError> {
        self.challenges.get(&id).ok_or(GovernanceError::ChallengeNotFound(id))
    }

    fn lookup_mut(&mut self, id: ChallengeId) -> Result<&mut Challenge, GovernanceError> {
        self.challenges.get_mut(&id).ok_or(GovernanceError::ChallengeNotFound(id))
    }

    /// Dispute the proposer's node at `index`.
    ///
    /// `witness` walks from `index` up to a node the proposer has already
    /// committed to; its length fixes which ancestor that is. A challenger
    /// holds at most one open challenge per node.
    pub fn open(
        &mut self,
        challenger: Address,
        bond: U256,
        index: GlobalIndex,
        claimed: TreeNode,
        witness: &[TreeNode],
        now: BlockNumber,
    ) -> Result<(ChallengeId, ChallengeState), GovernanceError> {
        if index.depth() > self.tree_depth {
            return Err(GovernanceError::UnauthorizedChallenge {
                index,
                reason: "index is deeper than the committed tree",
            });
        }
        let Some(anchor_depth) = index.depth().checked_sub(witness.len() as u32) else {
            return Err(TreeError::MalformedProof {
                expected: index.depth() as usize,
                actual: witness.len(),
            }
            .into());
        };
        let anchor = index.ancestor_at_depth(anchor_depth).ok_or(TreeError::InvalidIndex(index.get()))?;
        let anchor_node = self.commitments.get(&anchor).ok_or(GovernanceError::UnauthorizedChallenge {
            index,
            reason: "witness does not reach an agreed commitment",
        })?;
        verify_path(anchor, anchor_node, index, &claimed, witness)?;
        if self
            .challenges
            .values()
            .any(|c| c.state.is_active() && c.challenger == challenger && c.index == index)
        {
            return Err(GovernanceError::ChallengeExists { index, challenger });
        }

        let (state, deadline) = if index.depth() == self.tree_depth {
            (ChallengeState::AwaitingLeafResolution, None)
        } else {
            (ChallengeState::AwaitingProposerResponse, Some(now.saturating_add(self.response_window)))
        };
        let id = self.next_challenge;
        self.next_challenge += 1;
        self.challenges.insert(
            id,
            Challenge {
                id,
                opened_at: index,
                index,
                claimed,
                challenger,
                bond,
                deadline,
                state,
                rounds: 0,
                revealed: None,
                settled: false,
            },
        );
        info!(target: "bisection", challenge = id, index = %index, anchor = %anchor, %challenger, state = ?state, "challenge opened");
        Ok((id, state))
    }

    /// Proposer reveals `pollard` beneath the disputed node.
    ///
    /// A response after the deadline forfeits the challenge instead.
    pub fn respond(
        &mut self,
        id: ChallengeId,
        pollard: Pollard,
        now: BlockNumber,
    ) -> Result<ChallengeState, GovernanceError> {
        let challenge = self.lookup(id)?;
        if challenge.state != ChallengeState::AwaitingProposerResponse {
            return Err(GovernanceError::InvalidChallengeState { challenge: id, state: challenge.state });
        }
        if challenge.is_overdue(now) {
            return Ok(self.resolve(id, ChallengeState::ResolvedForChallenger));
        }
        if pollard.index != challenge.index {
            return Err(TreeError::InvalidPollard(format!(
                "pollard expands {} but {} is disputed",
                pollard.index, challenge.index
            ))
            .into());
        }
        let expected = effective_order(self.pollard_order, challenge.index.depth(), self.tree_depth);
        if pollard.order != expected {
            return Err(TreeError::InvalidPollard(format!(
                "expected order {expected}, got {}",
                pollard.order
            ))
            .into());
        }
        pollard.verify(&challenge.claimed)?;

        let entries = pollard.entries()?;
        for (index, node) in entries {
            self.commitments.entry(index).or_insert(node);
        }
        let deadline = now.saturating_add(self.response_window);
        let challenge = self.lookup_mut(id)?;
        challenge.rounds += 1;
        challenge.revealed = Some(pollard);
        challenge.state = ChallengeState::AwaitingChallengerPick;
        challenge.deadline = Some(deadline);
        debug!(target: "bisection", challenge = id, index = %challenge.index, round = challenge.rounds, "pollard revealed");
        Ok(ChallengeState::AwaitingChallengerPick)
    }

    /// Challenger keeps disputing `child`, one of the revealed nodes.
    ///
    /// A pick after the deadline forfeits the challenge to the proposer.
    pub fn pick(
        &mut self,
        id: ChallengeId,
        caller: Address,
        child: GlobalIndex,
        now: BlockNumber,
    ) -> Result<ChallengeState, GovernanceError> {
        let challenge = self.lookup(id)?;
        if challenge.challenger != caller {
            return Err(GovernanceError::Unauthorized { caller, action: "pick a child" });
        }
        if challenge.state != ChallengeState::AwaitingChallengerPick {
            return Err(GovernanceError::InvalidChallengeState { challenge: id, state: challenge.state });
        }
        if challenge.is_overdue(now) {
            return Ok(self.resolve(id, ChallengeState::ResolvedForProposer));
        }
        let node = challenge
            .revealed
            .as_ref()
            .and_then(|pollard| pollard.node_at(child))
            .copied()
            .ok_or(GovernanceError::UnauthorizedChallenge {
                index: child,
                reason: "child was not revealed in this round",
            })?;

        let (state, deadline) = if child.depth() == self.tree_depth {
            (ChallengeState::AwaitingLeafResolution, None)
        } else {
            (ChallengeState::AwaitingProposerResponse, Some(now.saturating_add(self.response_window)))
        };
        let challenge = self.lookup_mut(id)?;
        challenge.index = child;
        challenge.claimed = node;
        challenge.revealed = None;
        challenge.state = state;
        challenge.deadline = deadline;
        debug!(target: "bisection", challenge = id, child = %child, state = ?state, "child picked");
        Ok(state)
    }

    /// Compare a leaf-level claim with the canonical voting power.
    ///
    /// A leaf that matches settles every other dispute over the same leaf,
    /// which are cancelled.
    pub fn resolve_leaf(
        &mut self,
        id: ChallengeId,
        canonical: U256,
    ) -> Result<ChallengeState, GovernanceError> {
        let challenge = self.lookup(id)?;
        if challenge.state != ChallengeState::AwaitingLeafResolution {
            return Err(GovernanceError::InvalidChallengeState { challenge: id, state: challenge.state });
        }
        let index = challenge.index;
        if TreeNode::leaf(canonical) != challenge.claimed {
            return Ok(self.resolve(id, ChallengeState::ResolvedForChallenger));
        }
        let outcome = self.resolve(id, ChallengeState::ResolvedForProposer);
        let cancelled = self.cancel_subtree(index, id);
        if !cancelled.is_empty() {
            debug!(target: "bisection", index = %index, count = cancelled.len(), "settled challenges cancelled");
        }
        Ok(outcome)
    }

    /// Forfeit `id` if its waiting party missed the deadline.
    ///
    /// Returns the new state, or `None` when nothing is overdue. Other
    /// challenges are left untouched.
    pub fn forfeit(
        &mut self,
        id: ChallengeId,
        now: BlockNumber,
    ) -> Result<Option<ChallengeState>, GovernanceError> {
        let challenge = self.lookup(id)?;
        if !challenge.is_overdue(now) {
            return Ok(None);
        }
        let outcome = match challenge.state {
            ChallengeState::AwaitingProposerResponse => ChallengeState::ResolvedForChallenger,
            ChallengeState::AwaitingChallengerPick => ChallengeState::ResolvedForProposer,
            _ => return Ok(None),
        };
        Ok(Some(self.resolve(id, outcome)))
    }

    /// Forfeit every overdue challenge
    pub fn expire(&mut self, now: BlockNumber) -> Vec<(ChallengeId, ChallengeState)> {
        let overdue: Vec<ChallengeId> = self
            .challenges
            .values()
            .filter(|c| c.state.is_active() && c.is_overdue(now))
            .map(|c| c.id)
            .collect();
        overdue
            .into_iter()
            .filter_map(|id| self.forfeit(id, now).ok().flatten().map(|state| (id, state)))
            .collect()
    }

    /// Cancel every unresolved challenge
    pub fn cancel_all(&mut self) -> Vec<ChallengeId> {
        self.cancel_where(|_| true)
    }

    /// Cancel unresolved challenges other than `except` disputing `index` or a node beneath it
    pub fn cancel_subtree(&mut self, index: GlobalIndex, except: ChallengeId) -> Vec<ChallengeId> {
        self.cancel_where(|c| c.id != except && c.index.is_descendant_of(index))
    }

    fn cancel_where(&mut self, predicate: impl Fn(&Challenge) -> bool) -> Vec<ChallengeId> {
        let mut cancelled = Vec::new();
        for challenge in self.challenges.values_mut() {
            if challenge.state.is_active() && predicate(challenge) {
                challenge.state = ChallengeState::Cancelled;
                challenge.deadline = None;
                challenge.revealed = None;
                cancelled.push(challenge.id);
            }
        }
        cancelled
    }

    fn resolve(&mut self, id: ChallengeId, outcome: ChallengeState) -> ChallengeState {
        let Some(challenge) = self.challenges.get_mut(&id) else {
            return outcome;
        };
        challenge.state = outcome;
        challenge.deadline = None;
        challenge.revealed = None;
        let index = challenge.index;

        if outcome == ChallengeState::ResolvedForChallenger {
            warn!(target: "bisection", challenge = id, index = %index, "commitment proven fraudulent");
            if self.fraud_proven.is_none() {
                self.fraud_proven = Some(id);
            }
            let cancelled = self.cancel_all();
            if !cancelled.is_empty() {
                debug!(target: "bisection", count = cancelled.len(), "remaining challenges cancelled");
            }
        } else {
            info!(target: "bisection", challenge = id, index = %index, state = ?outcome, "challenge resolved");
        }
        outcome
    }
}
