//! Tree errors

use thiserror::Error;

/// Errors produced while building, proving or verifying a sum tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Tree construction was requested with no leaves
    #[error("cannot build a tree from zero leaves")]
    EmptyInput,
    /// The index does not name a node of this tree
    #[error("index {index} is outside a tree of depth {depth}")]
    IndexOutOfRange {
        /// Raw global index
        index: u64,
        /// Depth of the tree
        depth: u32,
    },
    /// Zero or an otherwise unrepresentable global index
    #[error("invalid global index {0}")]
    InvalidIndex(u64),
    /// The proven node does not sit beneath the anchor it is proven against
    #[error("index {index} is not a descendant of anchor {anchor}")]
    NotDescendant {
        /// Raw index being proven
        index: u64,
        /// Raw anchor index
        anchor: u64,
    },
    /// Witness length disagrees with the depth gap between node and anchor
    #[error("malformed proof: expected {expected} witness nodes, got {actual}")]
    MalformedProof {
        /// Witness length implied by the indices
        expected: usize,
        /// Witness length supplied
        actual: usize,
    },
    /// Recombination does not reproduce the committed node
    #[error("proof does not reproduce the committed node")]
    ProofMismatch,
    /// Pollard shape is inconsistent with its order
    #[error("invalid pollard: {0}")]
    InvalidPollard(String),
    /// Adding two sums overflowed 256 bits
    #[error("sum overflow while combining nodes")]
    SumOverflow,
    /// Wire bytes could not be decoded
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}
