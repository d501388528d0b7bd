//! External voting-power ledger interface

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::LedgerError,
    types::{Address, BlockNumber, U256},
};

/// Read access to historical voting power
pub trait VotingPowerLedger {
    /// Number of registered participants at `block`
    fn participant_count(&self, block: BlockNumber) -> Result<u64, LedgerError>;

    /// Own voting power of participant `index` at `block`
    fn voting_power_at(&self, index: u64, block: BlockNumber) -> Result<U256, LedgerError>;

    /// Identity participant `index` delegates to at `block`; itself when not delegating
    fn delegate_at(&self, index: u64, block: BlockNumber) -> Result<Address, LedgerError>;

    /// Identity of participant `index` at `block`
    fn participant_at(&self, index: u64, block: BlockNumber) -> Result<Address, LedgerError>;
}

/// Participant record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Identity
    pub identity: Address,
    /// Own voting power
    pub voting_power: U256,
    /// Delegate identity, `None` when voting directly
    pub delegate: Option<Address>,
}

impl Participant {
    /// Participant voting with its own power
    pub fn new(identity: Address, voting_power: U256) -> Self {
        Self { identity, voting_power, delegate: None }
    }

    /// Delegate this participant's power to `delegate`
    pub fn delegating_to(mut self, delegate: Address) -> Self {
        self.delegate = Some(delegate);
        self
    }
}

/// Ledger backed by per-block snapshots.
///
/// A query at block `b` reads the latest snapshot recorded at or before `b`.
/// Blocks earlier than the pruning horizon are no longer queryable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    snapshots: BTreeMap<BlockNumber, Vec<Participant>>,
    pruned_before: BlockNumber,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the participant set effective from `block`
    pub fn record_snapshot(&mut self, block: BlockNumber, participants: Vec<Participant>) {
        self.snapshots.insert(block, participants);
    }

    /// Drop history older than `block`
    pub fn prune_before(&mut self, block: BlockNumber) {
        // keep the snapshot still in effect at `block`
        let effective = self.snapshots.range(..=block).next_back().map(|(b, _)| *b);
        self.snapshots.retain(|b, _| Some(*b) == effective || *b >= block);
        self.pruned_before = self.pruned_before.max(block);
    }

    fn snapshot(&self, block: BlockNumber) -> Result<&[Participant], LedgerError> {
        if block < self.pruned_before {
            return Err(LedgerError::SnapshotUnavailable(block));
        }
        self.snapshots
            .range(..=block)
            .next_back()
            .map(|(_, participants)| participants.as_slice())
            .ok_or(LedgerError::SnapshotUnavailable(block))
    }

    fn participant(&self, index: u64, block: BlockNumber) -> Result<&Participant, LedgerError> {
        let participants = self.snapshot(block)?;
        usize::try_from(index)
            .ok()
            .and_then(|i| participants.get(i))
            .ok_or(LedgerError::UnknownParticipant { index, block })
    }
}

impl VotingPowerLedger for InMemoryLedger {
    fn participant_count(&self, block: BlockNumber) -> Result<u64, LedgerError> {
        Ok(self.snapshot(block)?.len() as u64)
    }

    fn voting_power_at(&self, index: u64, block: BlockNumber) -> Result<U256, LedgerError> {
        Ok(self.participant(index, block)?.voting_power)
    }

    fn delegate_at(&self, index: u64, block: BlockNumber) -> Result<Address, LedgerError> {
        let participant = self.participant(index, block)?;
        Ok(participant.delegate.unwrap_or(participant.identity))
    }

    fn participant_at(&self, index: u64, block: BlockNumber) -> Result<Address, LedgerError> {
        Ok(self.participant(index, block)?.identity)
    }
}
