//! Keccak256 hasher for sum-tree nodes

use alloy_primitives::{B256, U256};
use tiny_keccak::{Hasher, Keccak};

/// Width of a big-endian encoded sum.
pub const SUM_BYTES: usize = 32;

/// Keccak256 hasher
///
/// Encodings match the EVM `keccak256(abi.encodePacked(..))` layout so the same
/// node can be recomputed by the on-chain verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256Hasher;

impl Keccak256Hasher {
    /// Hash a single value
    pub fn hash(data: &[u8]) -> B256 {
        let mut hasher = Keccak::v256();
        hasher.update(data);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        B256::from(output)
    }

    /// Hash a leaf: `H(sum)`
    pub fn hash_leaf(sum: &U256) -> B256 {
        Self::hash(&sum.to_be_bytes::<SUM_BYTES>())
    }

    /// Hash two children: `H(left.hash ‖ left.sum ‖ right.hash ‖ right.sum)`
    pub fn hash_children(
        left_hash: &B256,
        left_sum: &U256,
        right_hash: &B256,
        right_sum: &U256,
    ) -> B256 {
        let mut hasher = Keccak::v256();
        hasher.update(left_hash.as_slice());
        hasher.update(&left_sum.to_be_bytes::<SUM_BYTES>());
        hasher.update(right_hash.as_slice());
        hasher.update(&right_sum.to_be_bytes::<SUM_BYTES>());
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        B256::from(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{b256, keccak256};

    #[test]
    fn test_zero_leaf_matches_evm() {
        // keccak256(abi.encodePacked(uint256(0)))
        assert_eq!(
            Keccak256Hasher::hash_leaf(&U256::ZERO),
            b256!("290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563")
        );
    }

    #[test]
    fn test_hash_children_is_packed_encoding() {
        let left = (B256::repeat_byte(1), U256::from(10u64));
        let right = (B256::repeat_byte(2), U256::from(30u64));

        let mut packed = Vec::with_capacity(128);
        packed.extend_from_slice(left.0.as_slice());
        packed.extend_from_slice(&left.1.to_be_bytes::<32>());
        packed.extend_from_slice(right.0.as_slice());
        packed.extend_from_slice(&right.1.to_be_bytes::<32>());

        let hash = Keccak256Hasher::hash_children(&left.0, &left.1, &right.0, &right.1);
        assert_eq!(hash, keccak256(&packed));
        assert_ne!(
            hash,
            Keccak256Hasher::hash_children(&right.0, &right.1, &left.0, &left.1)
        );
    }
}
