//! Behaviour traits supplied by the domain layer.
//!
//! The graph engine never decides what a node is or why two nodes connect.
//! It asks: a [`NodeDiscoverer`] says which nodes should exist at a cell,
//! each [`BlockNode`] says which links it wants and accepts, and each
//! [`LinkKey`] says whether its link is dropped automatically when no longer
//! wanted. Collaborators query the world back through a [`NodeView`].

use core::fmt::Debug;
use core::hash::Hash;

use blockgraph_types::{BlockPos, Direction, GraphId, HalfLink, LinkPos, NodePos, SidedPos, UpdatePos};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Link identity for nodes of type `N`.
pub type LinkOf<N> = LinkPos<N, <N as BlockNode>::Key>;

/// Half-link for nodes of type `N`.
pub type HalfLinkOf<N> = HalfLink<N, <N as BlockNode>::Key>;

/// Per-link entity type for nodes of type `N`.
pub type LinkEntityOf<N> = <<N as BlockNode>::Key as LinkKey>::Entity;

/// Distinguishes parallel links between the same two nodes and carries the
/// link's removal policy.
pub trait LinkKey: Clone + Ord + Hash + Debug + Serialize + DeserializeOwned + 'static {
    /// Optional mutable state attached to a link.
    type Entity: Debug + Serialize + DeserializeOwned + 'static;

    /// Whether a link with this key is removed as soon as either endpoint
    /// stops wanting it.
    ///
    /// Manual links (`false`) survive predicate changes and are removed only
    /// when their far endpoint disappears or on an explicit disconnect.
    fn is_automatic_removal(&self) -> bool {
        true
    }

    /// Create the entity for a freshly made link, if this key has one.
    fn create_entity(&self) -> Option<Self::Entity> {
        None
    }
}

/// A node payload and its connectivity predicates.
///
/// Node identity is `(position, payload)` compared by value, so two equal
/// payloads at the same cell are the same node.
pub trait BlockNode: Clone + Ord + Hash + Debug + Serialize + DeserializeOwned + 'static {
    /// Key type of the links this node makes.
    type Key: LinkKey;

    /// Optional mutable state attached to a node.
    type Entity: Debug + Serialize + DeserializeOwned + 'static;

    /// The face this node occupies, or `None` if it fills its cell.
    fn side(&self) -> Option<Direction> {
        None
    }

    /// Every link this node wants right now.
    ///
    /// Anything returned here must also be accepted by [`can_connect`] on
    /// both ends.
    ///
    /// [`can_connect`]: BlockNode::can_connect
    fn find_connections(
        &self,
        pos: BlockPos,
        view: &mut dyn NodeView<Self>,
    ) -> Vec<HalfLink<Self, Self::Key>>;

    /// Whether this node accepts the given link.
    fn can_connect(
        &self,
        pos: BlockPos,
        view: &mut dyn NodeView<Self>,
        link: &HalfLink<Self, Self::Key>,
    ) -> bool;

    /// Whether a node rescan may destroy this node once the discoverer no
    /// longer reports it.
    fn is_automatic_removal(&self) -> bool {
        true
    }

    /// Called during the callback phase after this node's link set changed.
    fn on_connections_changed(&self, _pos: BlockPos, _view: &mut dyn NodeView<Self>) {}

    /// Create the entity for a freshly placed node, if it has one.
    fn create_entity(&self, _pos: BlockPos) -> Option<Self::Entity> {
        None
    }
}

/// The query and request surface handed to collaborators.
///
/// Lookups load regions and graphs on demand. Requests are queued and
/// processed on the next maintenance pass, never inline.
pub trait NodeView<N: BlockNode> {
    /// All nodes at a cell.
    fn nodes_at(&mut self, pos: BlockPos) -> Vec<NodePos<N>>;

    /// Nodes at a cell that sit on the given face.
    fn nodes_at_side(&mut self, pos: SidedPos) -> Vec<NodePos<N>> {
        self.nodes_at(pos.pos)
            .into_iter()
            .filter(|n| n.node.side() == Some(pos.side))
            .collect()
    }

    /// Whether the node is a member of some graph.
    fn node_exists(&mut self, node: &NodePos<N>) -> bool;

    /// The graph owning the node, if any.
    fn graph_for_node(&mut self, node: &NodePos<N>) -> Option<GraphId>;

    /// The node's current links, seen from the node.
    fn connections_of(&mut self, node: &NodePos<N>) -> Vec<HalfLinkOf<N>>;

    /// Queue a node rescan for the cell.
    fn request_node_rescan(&mut self, pos: BlockPos);

    /// Queue a connection rescan for a cell or one face of it.
    fn request_connection_rescan(&mut self, pos: UpdatePos);
}

/// Reports which nodes should exist at a cell right now.
pub trait NodeDiscoverer<N> {
    /// Return every node that should exist at `pos`.
    fn discover_nodes(&self, pos: BlockPos) -> Vec<N>;
}

impl<N, F> NodeDiscoverer<N> for F
where
    F: Fn(BlockPos) -> Vec<N>,
{
    fn discover_nodes(&self, pos: BlockPos) -> Vec<N> {
        self(pos)
    }
}
