//! Configuration

use serde::{Deserialize, Serialize};
use std::env;

use crate::{
    error::GovernanceError,
    types::{Address, U256},
};

/// Denominator for `quorum_bps`
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Protocol configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Required share of the committed root sum, in basis points
    pub quorum_bps: u64,
    /// Blocks between creation and the start of voting
    pub voting_delay: u64,
    /// Length of the primary vote in blocks
    pub phase1_period: u64,
    /// Length of the veto window in blocks
    pub phase2_period: u64,
    /// Blocks a succeeded proposal stays executable
    pub execution_grace: u64,
    /// Blocks a party has to answer its turn in a challenge
    pub response_window: u64,
    /// Levels revealed per bisection round
    pub pollard_order: u32,
    /// Bond posted with every proposal
    pub proposer_bond: U256,
    /// Bond posted with every challenge
    pub challenger_bond: U256,
    /// Identity allowed to veto during the active phases
    pub veto_guardian: Option<Address>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            quorum_bps: 400,
            voting_delay: 7_200,
            phase1_period: 50_400,
            phase2_period: 21_600,
            execution_grace: 100_800,
            response_window: 7_200,
            pollard_order: 2,
            proposer_bond: U256::from(1_000u64),
            challenger_bond: U256::from(100u64),
            veto_guardian: None,
        }
    }
}

impl ProtocolConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            quorum_bps: parse_env("GOV_QUORUM_BPS").unwrap_or(defaults.quorum_bps),
            voting_delay: parse_env("GOV_VOTING_DELAY").unwrap_or(defaults.voting_delay),
            phase1_period: parse_env("GOV_PHASE1_PERIOD").unwrap_or(defaults.phase1_period),
            phase2_period: parse_env("GOV_PHASE2_PERIOD").unwrap_or(defaults.phase2_period),
            execution_grace: parse_env("GOV_EXECUTION_GRACE").unwrap_or(defaults.execution_grace),
            response_window: parse_env("GOV_RESPONSE_WINDOW").unwrap_or(defaults.response_window),
            pollard_order: parse_env("GOV_POLLARD_ORDER").unwrap_or(defaults.pollard_order),
            proposer_bond: parse_env("GOV_PROPOSER_BOND").unwrap_or(defaults.proposer_bond),
            challenger_bond: parse_env("GOV_CHALLENGER_BOND").unwrap_or(defaults.challenger_bond),
            veto_guardian: parse_env("GOV_VETO_GUARDIAN").or(defaults.veto_guardian),
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(input: &str) -> Result<Self, GovernanceError> {
        let config: Self = serde_json::from_str(input)
            .map_err(|e| GovernanceError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the protocol cannot run with
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.quorum_bps > BPS_DENOMINATOR {
            return Err(GovernanceError::InvalidConfig(format!(
                "quorum_bps {} exceeds {BPS_DENOMINATOR}",
                self.quorum_bps
            )));
        }
        if self.pollard_order == 0 {
            return Err(GovernanceError::InvalidConfig("pollard_order must be positive".into()));
        }
        if self.response_window == 0 {
            return Err(GovernanceError::InvalidConfig("response_window must be positive".into()));
        }
        Ok(())
    }

    /// Voting power required out of `total`
    pub fn votes_required(&self, total: U256) -> U256 {
        let bps = U256::from(self.quorum_bps);
        let denominator = U256::from(BPS_DENOMINATOR);
        total
            .checked_mul(bps)
            .map(|scaled| scaled / denominator)
            .unwrap_or_else(|| total / denominator * bps)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
