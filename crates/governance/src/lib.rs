//! X Layer governance over committed voting power
//!
//! A proposal commits to the root of a Merkle-sum tree of voting power. Votes
//! prove their weight against that root, and anyone who disagrees with the
//! committed tree can force a bisection game that narrows the dispute to a
//! single leaf, checked against the canonical snapshot. A proven fraud defeats
//! the proposal and pays the proposer's bond to the challenger.
//!
//! Key components:
//! - [`ProposalStore`]: lifecycle, voting, challenges and bond settlement
//! - [`ChallengeBook`]: per-proposal bisection state machine
//! - [`BisectionManager`]: off-chain participant for either side of a dispute
//! - [`VotingPowerLedger`]: the external voting-power source

pub mod bisection;
pub mod bonds;
pub mod challenge;
pub mod config;
pub mod error;
pub mod ledger;
pub mod proposal;
pub mod snapshot;
pub mod store;
pub mod types;

pub use bisection::{BisectionManager, BisectionResponse};
pub use bonds::{BondLedger, Claimant};
pub use challenge::{Challenge, ChallengeBook, ChallengeState};
pub use config::ProtocolConfig;
pub use error::{GovernanceError, LedgerError};
pub use ledger::{InMemoryLedger, Participant, VotingPowerLedger};
pub use proposal::Proposal;
pub use store::{ChallengeEvent, ProposalStore};
pub use types::*;
