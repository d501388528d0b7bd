//! Committed (hash, sum) node

use std::fmt;

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    error::TreeError,
    hasher::{Keccak256Hasher, SUM_BYTES},
};

/// Size of an encoded node: `hash ‖ sum`
pub const NODE_BYTES: usize = 32 + SUM_BYTES;

/// A node of the Merkle-sum tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeNode {
    /// Digest committing to the subtree content
    pub hash: B256,
    /// Total voting power beneath this node
    pub sum: U256,
}

impl TreeNode {
    /// Canonicalize a raw value into a leaf node
    pub fn leaf(sum: U256) -> Self {
        Self { hash: Keccak256Hasher::hash_leaf(&sum), sum }
    }

    /// The padding leaf, identical to a participant with zero voting power
    pub fn zero() -> Self {
        Self::leaf(U256::ZERO)
    }

    /// Combine two children into their parent
    pub fn combine(left: &Self, right: &Self) -> Result<Self, TreeError> {
        let sum = left.sum.checked_add(right.sum).ok_or(TreeError::SumOverflow)?;
        let hash = Keccak256Hasher::hash_children(&left.hash, &left.sum, &right.hash, &right.sum);
        Ok(Self { hash, sum })
    }

    /// Fixed-width wire encoding
    pub fn encode(&self) -> [u8; NODE_BYTES] {
        let mut out = [0u8; NODE_BYTES];
        out[..32].copy_from_slice(self.hash.as_slice());
        out[32..].copy_from_slice(&self.sum.to_be_bytes::<SUM_BYTES>());
        out
    }

    /// Decode a node from exactly [`NODE_BYTES`] bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, TreeError> {
        if bytes.len() != NODE_BYTES {
            return Err(TreeError::InvalidEncoding(format!(
                "expected {NODE_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            hash: B256::from_slice(&bytes[..32]),
            sum: U256::from_be_slice(&bytes[32..]),
        })
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}..(sum={})", hex::encode(&self.hash[..4]), self.sum)
    }
}

/// Encode an ordered node sequence (witness or pollard), left before right
pub fn encode_nodes(nodes: &[TreeNode]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nodes.len() * NODE_BYTES);
    for node in nodes {
        out.extend_from_slice(&node.encode());
    }
    out
}

/// Decode a sequence produced by [`encode_nodes`]
pub fn decode_nodes(bytes: &[u8]) -> Result<Vec<TreeNode>, TreeError> {
    if bytes.len() % NODE_BYTES != 0 {
        return Err(TreeError::InvalidEncoding(format!(
            "length {} is not a multiple of {NODE_BYTES}",
            bytes.len()
        )));
    }
    bytes.chunks_exact(NODE_BYTES).map(TreeNode::decode).collect()
}
