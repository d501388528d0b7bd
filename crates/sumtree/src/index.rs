//! Heap-numbered global node indices
//!
//! The root is `1` and the children of `k` are `2k` and `2k + 1`, so a node is
//! named the same way by every party regardless of how the tree is stored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;

/// Deepest level addressable by a `u64` index
pub const MAX_DEPTH: u32 = 63;

/// Global index of a tree node
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct GlobalIndex(u64);

impl GlobalIndex {
    /// The root node
    pub const ROOT: Self = Self(1);

    /// Wrap a raw index; `0` names no node
    pub const fn new(raw: u64) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    /// Index of the leaf at `position` in a tree of depth `depth`
    pub fn from_leaf(position: u64, depth: u32) -> Result<Self, TreeError> {
        if depth > MAX_DEPTH || position >= 1u64 << depth {
            return Err(TreeError::IndexOutOfRange { index: position, depth });
        }
        Ok(Self((1u64 << depth) + position))
    }

    /// Raw value
    pub const fn get(self) -> u64 {
        self.0
    }

    /// `floor(log2(k))`
    pub const fn depth(self) -> u32 {
        MAX_DEPTH - self.0.leading_zeros()
    }

    /// Position of this node within its own layer
    pub const fn offset(self) -> u64 {
        self.0 - (1u64 << self.depth())
    }

    /// Whether this is the root
    pub const fn is_root(self) -> bool {
        self.0 == 1
    }

    /// Parent index, `None` for the root
    pub const fn parent(self) -> Option<Self> {
        if self.is_root() { None } else { Some(Self(self.0 >> 1)) }
    }

    /// Left and right children, `None` past [`MAX_DEPTH`]
    pub const fn children(self) -> Option<(Self, Self)> {
        if self.depth() >= MAX_DEPTH {
            return None;
        }
        Some((Self(self.0 << 1), Self((self.0 << 1) | 1)))
    }

    /// The other child of this node's parent
    pub const fn sibling(self) -> Option<Self> {
        if self.is_root() { None } else { Some(Self(self.0 ^ 1)) }
    }

    /// Orientation relative to the sibling; odd indices sit on the right
    pub const fn is_right_child(self) -> bool {
        !self.is_root() && self.0 & 1 == 1
    }

    /// Ancestor at `depth`, or self when `depth` equals this node's depth
    pub const fn ancestor_at_depth(self, depth: u32) -> Option<Self> {
        let own = self.depth();
        if depth > own { None } else { Some(Self(self.0 >> (own - depth))) }
    }

    /// True when `ancestor` lies on the path from this node to the root (inclusive)
    pub fn is_descendant_of(self, ancestor: Self) -> bool {
        self.ancestor_at_depth(ancestor.depth()) == Some(ancestor)
    }

    /// Leftmost descendant at `depth`
    pub const fn first_descendant_at(self, depth: u32) -> Option<Self> {
        let own = self.depth();
        if depth < own || depth > MAX_DEPTH {
            return None;
        }
        Some(Self(self.0 << (depth - own)))
    }

    /// Leaf position if this node is a leaf of a tree of depth `tree_depth`
    pub const fn leaf_position(self, tree_depth: u32) -> Option<u64> {
        if self.depth() == tree_depth { Some(self.offset()) } else { None }
    }
}

impl TryFrom<u64> for GlobalIndex {
    type Error = TreeError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(TreeError::InvalidIndex(raw))
    }
}

impl From<GlobalIndex> for u64 {
    fn from(index: GlobalIndex) -> Self {
        index.0
    }
}

impl fmt::Display for GlobalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
