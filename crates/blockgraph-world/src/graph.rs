//! A single connected component of nodes and links.
//!
//! A [`BlockGraph`] owns its member nodes, the links between them, and a
//! derived spatial footprint (cells and regions it occupies). Merging is
//! incremental; splitting recomputes components with one breadth-first
//! traversal over the whole graph.
//!
//! Internally each node slot keeps the set of links touching it, so link
//! removal on node destruction and component traversal never scan the full
//! link table.

use core::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use blockgraph_types::{
    BlockPos, GraphId, GraphRecord, LinkRecord, NodePos, NodeRecord, RegionPos, SidedPos,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::WorldError;
use crate::node::{BlockNode, HalfLinkOf, LinkEntityOf, LinkOf};

/// Membership record of one node.
#[derive(Debug)]
struct NodeSlot<N: BlockNode> {
    /// Entity attached to the node.
    entity: Option<N::Entity>,
    /// Every link with this node as an endpoint.
    links: BTreeSet<LinkOf<N>>,
}

impl<N: BlockNode> NodeSlot<N> {
    const fn new(entity: Option<N::Entity>) -> Self {
        Self {
            entity,
            links: BTreeSet::new(),
        }
    }
}

/// What [`BlockGraph::remove_node`] took out of the graph.
#[derive(Debug)]
pub struct RemovedNode<N: BlockNode> {
    /// The removed node.
    pub node: NodePos<N>,
    /// Its entity, if it had one.
    pub entity: Option<N::Entity>,
    /// Every link that touched it, now removed.
    pub links: Vec<LinkOf<N>>,
    /// Whether the graph no longer has any node at the node's cell.
    pub pos_vacated: bool,
}

/// Result of decoding a persisted graph record.
#[derive(Debug)]
pub struct DecodedGraph<N: BlockNode> {
    /// The rebuilt graph.
    pub graph: BlockGraph<N>,
    /// Nodes or links that failed to decode and were dropped.
    pub dropped: usize,
}

/// One connected component with a stable identity.
#[derive(Debug)]
pub struct BlockGraph<N: BlockNode> {
    /// Graph identity.
    id: GraphId,
    /// Member nodes.
    nodes: BTreeMap<NodePos<N>, NodeSlot<N>>,
    /// Every link with its entity.
    links: BTreeMap<LinkOf<N>, Option<LinkEntityOf<N>>>,
    /// Member nodes grouped by cell.
    by_pos: BTreeMap<BlockPos, BTreeSet<NodePos<N>>>,
    /// Node count per occupied region.
    regions: BTreeMap<RegionPos, usize>,
}

impl<N: BlockNode> BlockGraph<N> {
    /// Create an empty graph.
    pub const fn new(id: GraphId) -> Self {
        Self {
            id,
            nodes: BTreeMap::new(),
            links: BTreeMap::new(),
            by_pos: BTreeMap::new(),
            regions: BTreeMap::new(),
        }
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Return the graph id.
    pub const fn id(&self) -> GraphId {
        self.id
    }

    /// Number of member nodes.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over member nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodePos<N>> {
        self.nodes.keys()
    }

    /// Iterate over member nodes at a cell.
    pub fn nodes_at(&self, pos: BlockPos) -> impl Iterator<Item = &NodePos<N>> {
        self.by_pos.get(&pos).into_iter().flatten()
    }

    /// Iterate over member nodes on one face of a cell.
    pub fn nodes_at_side(&self, pos: SidedPos) -> impl Iterator<Item = &NodePos<N>> {
        self.nodes_at(pos.pos)
            .filter(move |n| n.node.side() == Some(pos.side))
    }

    /// Whether the node is a member.
    pub fn contains_node(&self, node: &NodePos<N>) -> bool {
        self.nodes.contains_key(node)
    }

    /// Whether any member node sits at the cell.
    pub fn has_nodes_at(&self, pos: BlockPos) -> bool {
        self.by_pos.contains_key(&pos)
    }

    /// Iterate over the cells this graph occupies.
    pub fn positions(&self) -> impl Iterator<Item = BlockPos> + '_ {
        self.by_pos.keys().copied()
    }

    /// Iterate over the regions this graph occupies.
    pub fn regions(&self) -> impl Iterator<Item = RegionPos> + '_ {
        self.regions.keys().copied()
    }

    /// Whether any member node lies in the region.
    pub fn occupies_region(&self, region: RegionPos) -> bool {
        self.regions.contains_key(&region)
    }

    /// The node's links, each seen from the node.
    ///
    /// Empty if the node is not a member.
    pub fn connections(&self, node: &NodePos<N>) -> Vec<HalfLinkOf<N>> {
        self.nodes
            .get(node)
            .map(|slot| slot.links.iter().map(|l| l.to_half_link(node)).collect())
            .unwrap_or_default()
    }

    /// Iterate over every link.
    pub fn links(&self) -> impl Iterator<Item = &LinkOf<N>> {
        self.links.keys()
    }

    /// Number of links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Whether the link is present.
    pub fn link_exists(&self, link: &LinkOf<N>) -> bool {
        self.links.contains_key(link)
    }

    /// The node's entity.
    pub fn node_entity(&self, node: &NodePos<N>) -> Option<&N::Entity> {
        self.nodes.get(node)?.entity.as_ref()
    }

    /// The node's entity, mutably.
    pub fn node_entity_mut(&mut self, node: &NodePos<N>) -> Option<&mut N::Entity> {
        self.nodes.get_mut(node)?.entity.as_mut()
    }

    /// The link's entity.
    pub fn link_entity(&self, link: &LinkOf<N>) -> Option<&LinkEntityOf<N>> {
        self.links.get(link)?.as_ref()
    }

    /// The link's entity, mutably.
    pub fn link_entity_mut(&mut self, link: &LinkOf<N>) -> Option<&mut LinkEntityOf<N>> {
        self.links.get_mut(link)?.as_mut()
    }

    // -------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------

    /// Insert a node with no links.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateNode`] if the node is already a member.
    pub fn insert_node(
        &mut self,
        node: NodePos<N>,
        entity: Option<N::Entity>,
    ) -> Result<(), WorldError> {
        if self.nodes.contains_key(&node) {
            return Err(WorldError::DuplicateNode(node.to_string()));
        }
        self.index_node(&node);
        self.nodes.insert(node, NodeSlot::new(entity));
        Ok(())
    }

    /// Remove a node and every link touching it.
    ///
    /// Does not split: the remainder may be disconnected afterwards.
    /// Returns `None` if the node is not a member.
    pub fn remove_node(&mut self, node: &NodePos<N>) -> Option<RemovedNode<N>> {
        let (node, slot) = self.nodes.remove_entry(node)?;
        for link in &slot.links {
            self.links.remove(link);
            if let Some(other) = self.nodes.get_mut(link.other(&node)) {
                other.links.remove(link);
            }
        }
        let pos_vacated = self.unindex_node(&node);
        Some(RemovedNode {
            node,
            entity: slot.entity,
            links: slot.links.into_iter().collect(),
            pos_vacated,
        })
    }

    /// Add a link between two member nodes.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::SelfLink`] if `a == b`,
    /// [`WorldError::NodeNotFound`] if either endpoint is not a member, or
    /// [`WorldError::LinkExists`] if the same endpoints and key are already
    /// linked.
    pub fn link(
        &mut self,
        a: &NodePos<N>,
        b: &NodePos<N>,
        key: N::Key,
        entity: Option<LinkEntityOf<N>>,
    ) -> Result<LinkOf<N>, WorldError> {
        if a == b {
            return Err(WorldError::SelfLink(a.to_string()));
        }
        for endpoint in [a, b] {
            if !self.nodes.contains_key(endpoint) {
                return Err(WorldError::NodeNotFound(endpoint.to_string()));
            }
        }
        let link = LinkOf::<N>::new(a.clone(), b.clone(), key);
        if self.links.contains_key(&link) {
            return Err(WorldError::LinkExists(format!("{a} <-> {b} {:?}", link.key())));
        }
        for endpoint in [a, b] {
            if let Some(slot) = self.nodes.get_mut(endpoint) {
                slot.links.insert(link.clone());
            }
        }
        self.links.insert(link.clone(), entity);
        Ok(link)
    }

    /// Remove a link if present. Returns whether anything was removed.
    ///
    /// Does not split.
    pub fn unlink(&mut self, a: &NodePos<N>, b: &NodePos<N>, key: &N::Key) -> bool {
        let link = LinkOf::<N>::new(a.clone(), b.clone(), key.clone());
        if self.links.remove(&link).is_none() {
            return false;
        }
        for endpoint in [link.first(), link.second()] {
            if let Some(slot) = self.nodes.get_mut(endpoint) {
                slot.links.remove(&link);
            }
        }
        true
    }

    /// Absorb every node and link of `other`, which is consumed.
    ///
    /// Cost is linear in the size of `other`; callers merge the smaller graph
    /// into the larger.
    pub fn merge(&mut self, other: Self) {
        let Self {
            id: other_id,
            nodes,
            links,
            ..
        } = other;
        for (node, slot) in nodes {
            if let Some(existing) = self.nodes.get_mut(&node) {
                warn!(
                    graph_id = %self.id,
                    other_id = %other_id,
                    node = %node,
                    "Node present in both graphs during merge"
                );
                existing.links.extend(slot.links);
            } else {
                self.index_node(&node);
                self.nodes.insert(node, slot);
            }
        }
        self.links.extend(links);
    }

    // -------------------------------------------------------------------
    // Components
    // -------------------------------------------------------------------

    /// Connected components under the current links, largest first.
    ///
    /// Components of equal size keep discovery order, so the one holding the
    /// smallest node comes first.
    pub fn components(&self) -> Vec<BTreeSet<NodePos<N>>> {
        let mut seen: BTreeSet<&NodePos<N>> = BTreeSet::new();
        let mut components = Vec::new();

        for start in self.nodes.keys() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                component.insert(current.clone());
                let Some(slot) = self.nodes.get(current) else {
                    continue;
                };
                for link in &slot.links {
                    let other = link.other(current);
                    if seen.insert(other) {
                        queue.push_back(other);
                    }
                }
            }
            components.push(component);
        }

        components.sort_by_key(|c| Reverse(c.len()));
        components
    }

    /// Whether the graph is a single connected component.
    pub fn is_connected(&self) -> bool {
        self.components().len() <= 1
    }

    /// Move every component but the largest into new graphs.
    ///
    /// `alloc` supplies an id per new graph. If it runs out, the remaining
    /// components stay in this graph and a warning is logged.
    pub fn split(&mut self, mut alloc: impl FnMut() -> Option<GraphId>) -> Vec<Self> {
        let components = self.components();
        let mut split_off = Vec::with_capacity(components.len().saturating_sub(1));
        for component in components.iter().skip(1) {
            let Some(id) = alloc() else {
                warn!(graph_id = %self.id, "Graph id space exhausted, split left incomplete");
                break;
            };
            split_off.push(self.take_component(id, component));
        }
        split_off
    }

    fn take_component(&mut self, id: GraphId, component: &BTreeSet<NodePos<N>>) -> Self {
        let mut graph = Self::new(id);
        for member in component {
            let Some((node, slot)) = self.nodes.remove_entry(member) else {
                continue;
            };
            self.unindex_node(&node);
            for link in &slot.links {
                if let Some((link, entity)) = self.links.remove_entry(link) {
                    graph.links.insert(link, entity);
                }
            }
            graph.index_node(&node);
            graph.nodes.insert(node, slot);
        }
        graph
    }

    // -------------------------------------------------------------------
    // Footprint
    // -------------------------------------------------------------------

    fn index_node(&mut self, node: &NodePos<N>) {
        self.by_pos.entry(node.pos).or_default().insert(node.clone());
        let count = self.regions.entry(node.pos.region()).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Returns whether the node's cell is now empty.
    fn unindex_node(&mut self, node: &NodePos<N>) -> bool {
        let mut vacated = false;
        if let Some(at_pos) = self.by_pos.get_mut(&node.pos) {
            at_pos.remove(node);
            if at_pos.is_empty() {
                self.by_pos.remove(&node.pos);
                vacated = true;
            }
        }
        let region = node.pos.region();
        if let Some(count) = self.regions.get_mut(&region) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.regions.remove(&region);
            }
        }
        vacated
    }

    // -------------------------------------------------------------------
    // Records
    // -------------------------------------------------------------------

    /// Encode the graph as a persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Encode`] if a payload, key, or entity fails to
    /// serialize, or [`WorldError::TooLarge`] if node indices overflow `u32`.
    pub fn to_record(&self) -> Result<GraphRecord, WorldError> {
        let mut index: BTreeMap<&NodePos<N>, u32> = BTreeMap::new();
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (i, (node, slot)) in self.nodes.iter().enumerate() {
            let Ok(i) = u32::try_from(i) else {
                return Err(WorldError::TooLarge {
                    count: self.nodes.len(),
                });
            };
            index.insert(node, i);
            nodes.push(NodeRecord {
                pos: node.pos,
                node: encode("node", &node.node)?,
                entity: slot
                    .entity
                    .as_ref()
                    .map(|e| encode("node entity", e))
                    .transpose()?,
            });
        }

        let mut links = Vec::with_capacity(self.links.len());
        for (link, entity) in &self.links {
            let (Some(&first), Some(&second)) = (index.get(link.first()), index.get(link.second()))
            else {
                return Err(WorldError::NodeNotFound(link.first().to_string()));
            };
            links.push(LinkRecord {
                first,
                second,
                key: encode("link key", link.key())?,
                entity: entity
                    .as_ref()
                    .map(|e| encode("link entity", e))
                    .transpose()?,
            });
        }

        Ok(GraphRecord { nodes, links })
    }

    /// Rebuild a graph from a persisted record.
    ///
    /// Nodes that fail to decode are dropped together with their links.
    /// Entities that fail to decode are dropped and the node or link kept.
    /// Every drop is logged and counted in [`DecodedGraph::dropped`]; a
    /// graph with drops may no longer be connected.
    pub fn from_record(id: GraphId, record: GraphRecord) -> DecodedGraph<N> {
        let mut graph = Self::new(id);
        let mut dropped: usize = 0;
        let mut decoded: Vec<Option<NodePos<N>>> = Vec::with_capacity(record.nodes.len());

        for rec in record.nodes {
            let node = match serde_json::from_value::<N>(rec.node) {
                Ok(node) => NodePos::new(rec.pos, node),
                Err(err) => {
                    warn!(graph_id = %id, pos = %rec.pos, %err, "Dropping undecodable node");
                    dropped = dropped.saturating_add(1);
                    decoded.push(None);
                    continue;
                }
            };
            let entity = decode_entity(id, "node entity", rec.entity);
            match graph.insert_node(node.clone(), entity) {
                Ok(()) => decoded.push(Some(node)),
                Err(err) => {
                    warn!(graph_id = %id, %err, "Dropping node from record");
                    dropped = dropped.saturating_add(1);
                    decoded.push(None);
                }
            }
        }

        for rec in record.links {
            let endpoint = |i: u32| {
                usize::try_from(i)
                    .ok()
                    .and_then(|i| decoded.get(i))
                    .and_then(Option::as_ref)
            };
            let (Some(a), Some(b)) = (endpoint(rec.first), endpoint(rec.second)) else {
                dropped = dropped.saturating_add(1);
                continue;
            };
            let key = match serde_json::from_value::<N::Key>(rec.key) {
                Ok(key) => key,
                Err(err) => {
                    warn!(graph_id = %id, %err, "Dropping link with undecodable key");
                    dropped = dropped.saturating_add(1);
                    continue;
                }
            };
            let entity = decode_entity(id, "link entity", rec.entity);
            if let Err(err) = graph.link(a, b, key, entity) {
                warn!(graph_id = %id, %err, "Dropping link from record");
                dropped = dropped.saturating_add(1);
            }
        }

        DecodedGraph { graph, dropped }
    }
}

fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<serde_json::Value, WorldError> {
    serde_json::to_value(value).map_err(|source| WorldError::Encode { what, source })
}

fn decode_entity<T: DeserializeOwned>(
    id: GraphId,
    what: &'static str,
    value: Option<serde_json::Value>,
) -> Option<T> {
    match serde_json::from_value(value?) {
        Ok(entity) => Some(entity),
        Err(err) => {
            warn!(graph_id = %id, %err, "Dropping undecodable {what}");
            None
        }
    }
}
