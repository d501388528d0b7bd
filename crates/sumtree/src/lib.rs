//! Merkle-sum tree for X Layer voting power commitments
//!
//! Every node commits to a Keccak256 digest and to the total voting power of
//! the leaves beneath it. Key features:
//! - Heap-numbered global indices: nodes are named independently of storage
//! - Witness proofs anchored at the root or at any agreed checkpoint
//! - Pollards: bounded-width reveals used by the bisection dispute game
//! - EVM-compatible encoding: 32-byte digests and big-endian 256-bit sums

mod error;
mod hasher;
mod index;
mod node;
mod pollard;
mod proof;
mod tree;

pub use error::TreeError;
pub use hasher::{Keccak256Hasher, SUM_BYTES};
pub use index::{GlobalIndex, MAX_DEPTH};
pub use node::{NODE_BYTES, TreeNode, decode_nodes, encode_nodes};
pub use pollard::{Pollard, effective_order};
pub use proof::{ChallengeProof, LeafProof, compute_anchor, verify_path};
pub use tree::SumTree;

/// Depth of a tree holding `leaf_count` leaves: `ceil(log2(leaf_count))`
pub const fn depth_for(leaf_count: u64) -> u32 {
    if leaf_count <= 1 { 0 } else { u64::BITS - (leaf_count - 1).leading_zeros() }
}
