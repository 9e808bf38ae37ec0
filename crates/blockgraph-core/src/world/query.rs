//! Read-side lookups.
//!
//! Every lookup that needs a region or graph loads it on demand and marks it
//! used, so lookups take `&mut self`. Stale index entries found along the
//! way are removed.

use std::collections::BTreeSet;

use blockgraph_types::{BlockPos, GraphId, NodePos, RegionPos, SidedPos, UpdatePos};
use blockgraph_world::{BlockGraph, BlockNode, HalfLinkOf, LinkEntityOf, LinkOf, NodeView};
use tracing::{error, warn};

use super::{GraphWorld, PendingUpdates};

impl<N: BlockNode> GraphWorld<N> {
    /// Every node at the cell.
    pub fn nodes_at(&mut self, pos: BlockPos) -> Vec<NodePos<N>> {
        let ids = self.resolve_graphs_at(pos);
        ids.iter()
            .filter_map(|id| self.graphs.get(id))
            .flat_map(|g| g.nodes_at(pos).cloned())
            .collect()
    }

    /// Sided nodes on one face of the cell.
    pub fn nodes_at_side(&mut self, pos: SidedPos) -> Vec<NodePos<N>> {
        self.nodes_at(pos.pos)
            .into_iter()
            .filter(|n| n.node.side() == Some(pos.side))
            .collect()
    }

    /// Whether the node is a member of some graph.
    pub fn node_exists(&mut self, node: &NodePos<N>) -> bool {
        self.graph_for_node(node).is_some()
    }

    /// The graph owning the node.
    pub fn graph_for_node(&mut self, node: &NodePos<N>) -> Option<GraphId> {
        self.resolve_graphs_at(node.pos)
            .into_iter()
            .find(|id| self.graphs.get(id).is_some_and(|g| g.contains_node(node)))
    }

    /// The graph with the given id, loading it if needed.
    pub fn graph(&mut self, id: GraphId) -> Option<&BlockGraph<N>> {
        if !self.ensure_graph(id) {
            return None;
        }
        self.graphs.get(&id)
    }

    /// Graph ids the region index lists at the cell, without loading or
    /// validating them.
    pub fn graph_ids_at(&mut self, pos: BlockPos) -> Vec<GraphId> {
        self.chunk(pos.region()).graphs_at(pos).collect()
    }

    /// Graph ids the region index lists anywhere in the region.
    pub fn graph_ids_in_region(&mut self, region: RegionPos) -> BTreeSet<GraphId> {
        self.chunk(region).graphs()
    }

    /// Ids of the graphs with nodes at the cell, loading each and dropping
    /// stale index entries.
    pub fn loaded_graphs_at(&mut self, pos: BlockPos) -> Vec<GraphId> {
        self.resolve_graphs_at(pos)
    }

    /// Ids of the graphs listed in the region that could be loaded.
    pub fn loaded_graphs_in_region(&mut self, region: RegionPos) -> Vec<GraphId> {
        let ids = self.graph_ids_in_region(region);
        ids.into_iter().filter(|&id| self.ensure_graph(id)).collect()
    }

    /// Ids of every loaded graph and every graph with a record on disk.
    pub fn all_graph_ids(&self) -> BTreeSet<GraphId> {
        let mut ids: BTreeSet<GraphId> = self.graphs.keys().copied().collect();
        match self.files.list_ids() {
            Ok(on_disk) => ids.extend(on_disk),
            Err(err) => error!(%err, "Error listing graph records"),
        }
        ids
    }

    /// Iterate over the resident graphs.
    pub fn loaded_graphs(&self) -> impl Iterator<Item = &BlockGraph<N>> {
        self.graphs.values()
    }

    /// Whether the region's index is held in memory.
    pub fn is_region_resident(&self, region: RegionPos) -> bool {
        self.chunks.is_loaded(region)
    }

    /// Number of resident graphs.
    pub fn loaded_graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// The node's entity.
    pub fn node_entity(&mut self, node: &NodePos<N>) -> Option<&N::Entity> {
        let id = self.graph_for_node(node)?;
        self.graphs.get(&id)?.node_entity(node)
    }

    /// The node's entity for modification. Marks the owning graph dirty.
    pub fn node_entity_mut(&mut self, node: &NodePos<N>) -> Option<&mut N::Entity> {
        let id = self.graph_for_node(node)?;
        self.mark_dirty(id);
        self.graphs.get_mut(&id)?.node_entity_mut(node)
    }

    /// Whether the link exists.
    pub fn link_exists(&mut self, link: &LinkOf<N>) -> bool {
        self.graph_for_link(link).is_some()
    }

    /// The link's entity.
    pub fn link_entity(&mut self, link: &LinkOf<N>) -> Option<&LinkEntityOf<N>> {
        let id = self.graph_for_link(link)?;
        self.graphs.get(&id)?.link_entity(link)
    }

    /// The link's entity for modification. Marks the owning graph dirty.
    pub fn link_entity_mut(&mut self, link: &LinkOf<N>) -> Option<&mut LinkEntityOf<N>> {
        let id = self.graph_for_link(link)?;
        self.mark_dirty(id);
        self.graphs.get_mut(&id)?.link_entity_mut(link)
    }

    /// The node's links, seen from the node.
    pub fn connections_of(&mut self, node: &NodePos<N>) -> Vec<HalfLinkOf<N>> {
        self.graph_for_node(node)
            .and_then(|id| self.graphs.get(&id))
            .map(|g| g.connections(node))
            .unwrap_or_default()
    }

    /// Current sizes of the pending-work queues.
    pub fn pending_updates(&self) -> PendingUpdates {
        PendingUpdates {
            node_rescans: self.node_updates.len(),
            connection_rescans: self.connection_updates.len(),
            callbacks: self.callback_updates.len(),
            unsaved_graphs: self.unsaved.len(),
        }
    }

    fn graph_for_link(&mut self, link: &LinkOf<N>) -> Option<GraphId> {
        let id = self.graph_for_node(link.first())?;
        self.graphs
            .get(&id)
            .is_some_and(|g| g.link_exists(link))
            .then_some(id)
    }

    /// Ids of loaded graphs that really have nodes at the cell.
    ///
    /// Index entries naming a graph that cannot be loaded, or that has no
    /// node at the cell, are removed with a warning.
    pub(super) fn resolve_graphs_at(&mut self, pos: BlockPos) -> Vec<GraphId> {
        let region = pos.region();
        let listed: Vec<GraphId> = self.chunk(region).graphs_at(pos).collect();
        for id in listed {
            self.ensure_graph(id);
        }

        // Loading a damaged graph can split it and re-index this cell.
        let listed: Vec<GraphId> = self.chunk(region).graphs_at(pos).collect();
        let mut live = Vec::with_capacity(listed.len());
        for id in listed {
            if self.graphs.get(&id).is_some_and(|g| g.has_nodes_at(pos)) {
                live.push(id);
            } else {
                warn!(graph_id = %id, %pos, "Removing stale graph reference from region index");
                self.chunk_mut(region).remove_graph_in_pos(id, pos);
            }
        }
        live
    }
}

impl<N: BlockNode> NodeView<N> for GraphWorld<N> {
    fn nodes_at(&mut self, pos: BlockPos) -> Vec<NodePos<N>> {
        Self::nodes_at(self, pos)
    }

    fn nodes_at_side(&mut self, pos: SidedPos) -> Vec<NodePos<N>> {
        Self::nodes_at_side(self, pos)
    }

    fn node_exists(&mut self, node: &NodePos<N>) -> bool {
        Self::node_exists(self, node)
    }

    fn graph_for_node(&mut self, node: &NodePos<N>) -> Option<GraphId> {
        Self::graph_for_node(self, node)
    }

    fn connections_of(&mut self, node: &NodePos<N>) -> Vec<HalfLinkOf<N>> {
        Self::connections_of(self, node)
    }

    fn request_node_rescan(&mut self, pos: BlockPos) {
        Self::request_node_rescan(self, pos);
    }

    fn request_connection_rescan(&mut self, pos: UpdatePos) {
        Self::request_connection_rescan(self, pos);
    }
}
