//! Node and link identities.
//!
//! A node is identified by where it is and what it is: its [`BlockPos`] plus
//! its payload compared by value. A link is identified by its two endpoints
//! (unordered) and a key that tells parallel links apart.

use serde::{Deserialize, Serialize};

use crate::pos::{BlockPos, SidedPos};

/// A node payload at a position: the identity of a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodePos<N> {
    /// The cell the node lives in.
    pub pos: BlockPos,
    /// The node payload.
    pub node: N,
}

impl<N> NodePos<N> {
    /// Pair a payload with its position.
    pub const fn new(pos: BlockPos, node: N) -> Self {
        Self { pos, node }
    }
}

impl<N: core::fmt::Debug> core::fmt::Display for NodePos<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}@{}", self.node, self.pos)
    }
}

/// An undirected link between two nodes, told apart from parallel links by
/// its key.
///
/// The endpoints are stored in sorted order so that `LinkPos::new(a, b, k)`
/// and `LinkPos::new(b, a, k)` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkPos<N, K> {
    first: NodePos<N>,
    second: NodePos<N>,
    key: K,
}

impl<N: Ord, K> LinkPos<N, K> {
    /// Build a link identity, normalising endpoint order.
    pub fn new(a: NodePos<N>, b: NodePos<N>, key: K) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
                key,
            }
        } else {
            Self {
                first: b,
                second: a,
                key,
            }
        }
    }

    /// Return the lesser endpoint.
    pub const fn first(&self) -> &NodePos<N> {
        &self.first
    }

    /// Return the greater endpoint.
    pub const fn second(&self) -> &NodePos<N> {
        &self.second
    }

    /// Return the link key.
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Check whether the given node is one of the endpoints.
    pub fn contains(&self, node: &NodePos<N>) -> bool {
        self.first == *node || self.second == *node
    }

    /// Return the endpoint opposite `node`.
    ///
    /// If `node` is not an endpoint the first endpoint is returned.
    pub fn other(&self, node: &NodePos<N>) -> &NodePos<N> {
        if self.first == *node {
            &self.second
        } else {
            &self.first
        }
    }
}

impl<N: Ord + Clone, K: Clone> LinkPos<N, K> {
    /// View this link from one endpoint as a half-link pointing at the other.
    pub fn to_half_link(&self, from: &NodePos<N>) -> HalfLink<N, K> {
        HalfLink {
            key: self.key.clone(),
            other: self.other(from).clone(),
        }
    }
}

/// One endpoint's view of a link: the key plus the node at the other end.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HalfLink<N, K> {
    /// The link key.
    pub key: K,
    /// The node at the far end.
    pub other: NodePos<N>,
}

impl<N: Ord + Clone, K: Clone> HalfLink<N, K> {
    /// Create a half-link.
    pub const fn new(key: K, other: NodePos<N>) -> Self {
        Self { key, other }
    }

    /// Return the same link as seen from `other`, pointing back at `from`.
    pub fn reverse(&self, from: &NodePos<N>) -> Self {
        Self {
            key: self.key.clone(),
            other: from.clone(),
        }
    }

    /// Complete this half-link into a full link identity rooted at `from`.
    pub fn to_link(&self, from: &NodePos<N>) -> LinkPos<N, K> {
        LinkPos::new(from.clone(), self.other.clone(), self.key.clone())
    }
}

/// Target of a connection rescan: every node in a cell, or only the nodes on
/// one face of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePos {
    /// All nodes at the cell.
    Block(BlockPos),
    /// Only sided nodes on the given face.
    Sided(SidedPos),
}

impl UpdatePos {
    /// Return the cell this update targets.
    pub const fn block_pos(self) -> BlockPos {
        match self {
            Self::Block(pos) => pos,
            Self::Sided(sided) => sided.pos,
        }
    }
}

impl From<BlockPos> for UpdatePos {
    fn from(pos: BlockPos) -> Self {
        Self::Block(pos)
    }
}

impl From<SidedPos> for UpdatePos {
    fn from(pos: SidedPos) -> Self {
        Self::Sided(pos)
    }
}
