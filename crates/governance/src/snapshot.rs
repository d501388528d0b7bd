//! Leaf values from a voting-power snapshot

use std::collections::HashMap;

use xlayer_sumtree::SumTree;

use crate::{
    error::{GovernanceError, LedgerError},
    ledger::VotingPowerLedger,
    types::{Address, BlockNumber, U256},
};

/// Voting power per participant position after delegation.
///
/// Delegation is resolved one hop: a participant delegating to another
/// registered participant moves its whole power into the delegate's position.
/// Delegation to itself or to an unregistered identity keeps the power in
/// place. When an identity appears twice, the first position receives.
pub fn leaf_values<L: VotingPowerLedger + ?Sized>(
    ledger: &L,
    block: BlockNumber,
) -> Result<Vec<U256>, LedgerError> {
    let count = ledger.participant_count(block)?;
    let mut identities = Vec::with_capacity(count as usize);
    let mut positions: HashMap<Address, usize> = HashMap::new();
    for index in 0..count {
        let identity = ledger.participant_at(index, block)?;
        positions.entry(identity).or_insert(index as usize);
        identities.push(identity);
    }

    let mut values = vec![U256::ZERO; identities.len()];
    for (position, identity) in identities.iter().enumerate() {
        let power = ledger.voting_power_at(position as u64, block)?;
        let delegate = ledger.delegate_at(position as u64, block)?;
        let target = if delegate == *identity {
            position
        } else {
            positions.get(&delegate).copied().unwrap_or(position)
        };
        values[target] =
            values[target].checked_add(power).ok_or(LedgerError::PowerOverflow(block))?;
    }
    Ok(values)
}

/// Build the voting-power tree for `block`; an empty snapshot is a single zero leaf
pub fn build_tree<L: VotingPowerLedger + ?Sized>(
    ledger: &L,
    block: BlockNumber,
) -> Result<SumTree, GovernanceError> {
    let mut values = leaf_values(ledger, block)?;
    if values.is_empty() {
        values.push(U256::ZERO);
    }
    Ok(SumTree::build(&values)?)
}

/// Canonical voting power at leaf `position`; positions past the participant count are padding
pub fn canonical_value<L: VotingPowerLedger + ?Sized>(
    ledger: &L,
    block: BlockNumber,
    position: u64,
) -> Result<U256, LedgerError> {
    Ok(value_at(&leaf_values(ledger, block)?, position))
}

/// Value at leaf `position` of precomputed `values`; padding is zero
pub fn value_at(values: &[U256], position: u64) -> U256 {
    usize::try_from(position).ok().and_then(|p| values.get(p)).copied().unwrap_or(U256::ZERO)
}
