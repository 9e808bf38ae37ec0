//! Node and link mutation, merge, split, and connection recomputation.
//!
//! Merges always fold the smaller graph into the larger one; on a tie the
//! first operand survives. Splits run a full component pass over the one
//! affected graph. Every public entry point leaves each graph connected.

use std::collections::BTreeSet;

use blockgraph_types::{BlockPos, GraphId, NodePos, RegionPos, UpdatePos};
use blockgraph_world::{BlockGraph, BlockNode, HalfLinkOf, LinkKey, LinkOf, RemovedNode, WorldError};
use indexmap::IndexSet;
use tracing::{debug, warn};

use super::{GraphEvent, GraphWorld};
use crate::error::CoreError;

impl<N: BlockNode> GraphWorld<N> {
    // -------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------

    /// Queue a node rescan for the cell.
    pub fn request_node_rescan(&mut self, pos: BlockPos) {
        self.node_updates.push(pos);
    }

    /// Queue node rescans for several cells.
    pub fn request_node_rescans(&mut self, positions: impl IntoIterator<Item = BlockPos>) {
        self.node_updates.extend(positions);
    }

    /// Queue a connection rescan for a cell or one face of it.
    pub fn request_connection_rescan(&mut self, pos: impl Into<UpdatePos>) {
        self.connection_updates.push(pos.into());
    }

    // -------------------------------------------------------------------
    // Public mutation
    // -------------------------------------------------------------------

    /// Place a node in a fresh single-node graph, then recompute its
    /// connections. Returns the id of the graph the node ends up in.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NodeExists`] if the node is already present, or
    /// [`CoreError::GraphIdsExhausted`] if no graph id is left.
    pub fn add_node(&mut self, pos: BlockPos, node: N) -> Result<GraphId, CoreError> {
        let node = NodePos::new(pos, node);
        if self.node_exists(&node) {
            return Err(CoreError::NodeExists(node.to_string()));
        }
        let id = self.create_graph_with_node(&node)?;
        self.update_connections(&node);
        Ok(self.graph_for_node(&node).unwrap_or(id))
    }

    /// Remove a node and its links, then split what remains of its graph.
    ///
    /// Returns `false` if the node does not exist.
    pub fn remove_node(&mut self, node: &NodePos<N>) -> bool {
        let Some(id) = self.graph_for_node(node) else {
            return false;
        };
        if self.destroy_node(id, node).is_none() {
            return false;
        }
        if self.graphs.contains_key(&id) {
            self.split_graph(id);
        }
        true
    }

    /// Link two existing nodes, merging their graphs if they differ.
    ///
    /// Returns the new link, or `None` if either node does not exist, the
    /// link would be a self-link, or it already exists.
    pub fn connect_nodes(
        &mut self,
        a: &NodePos<N>,
        b: &NodePos<N>,
        key: N::Key,
    ) -> Option<LinkOf<N>> {
        let a_graph = self.graph_for_node(a)?;
        let b_graph = self.graph_for_node(b)?;
        let merged = if a_graph == b_graph {
            a_graph
        } else {
            self.merge_graphs(a_graph, b_graph)
        };

        let in_graph = self
            .graphs
            .get(&merged)
            .is_some_and(|g| g.contains_node(a) && g.contains_node(b));
        if !in_graph {
            warn!(graph_id = %merged, a = %a, b = %b, "Region index and graph disagree on node membership, re-splitting");
            self.split_graph(merged);
            return None;
        }

        let entity = key.create_entity();
        let link = self.link_in(merged, a, b, key, entity)?;
        self.fire(merged, GraphEvent::Updated);
        Some(link)
    }

    /// Remove the link if present, then split the graph.
    ///
    /// The split pass runs even when no link was removed, so it also
    /// repairs a graph that had drifted out of connectivity. Returns whether
    /// a link was removed.
    pub fn disconnect_nodes(&mut self, a: &NodePos<N>, b: &NodePos<N>, key: &N::Key) -> bool {
        let Some(id) = self.graph_for_node(a) else {
            return false;
        };
        if !self.graphs.get(&id).is_some_and(|g| g.contains_node(b)) {
            return false;
        }
        let removed = self.unlink_in(id, a, b, key);
        self.split_graph(id);
        removed
    }

    /// Destroy a graph and every node in it. Returns `false` if no such graph
    /// exists.
    pub fn destroy_graph(&mut self, id: GraphId) -> bool {
        if !self.ensure_graph(id) {
            warn!(graph_id = %id, "Attempted to destroy graph that does not exist");
            return false;
        }
        let nodes: Vec<NodePos<N>> = self
            .graphs
            .get(&id)
            .map(|g| g.nodes().cloned().collect())
            .unwrap_or_default();
        self.callback_updates.extend(nodes);
        self.destroy_graph_impl(id);
        true
    }

    /// Remove every empty graph, loaded or on disk. Returns how many were
    /// removed.
    ///
    /// Records that fail to load, or load empty, are deleted as a side
    /// effect of trying to read them. Readable records stay loaded, and one
    /// that lost entries while decoding is re-split and marked dirty.
    pub fn remove_empty_graphs(&mut self) -> usize {
        let mut removed: usize = 0;
        for id in self.all_graph_ids() {
            if let Some(graph) = self.graphs.get(&id) {
                if graph.is_empty() {
                    warn!(graph_id = %id, "Encountered empty graph, removing it");
                    self.destroy_graph_impl(id);
                    removed = removed.saturating_add(1);
                }
            } else if !self.ensure_graph(id) {
                removed = removed.saturating_add(1);
            }
        }
        removed
    }

    // -------------------------------------------------------------------
    // Graph bookkeeping
    // -------------------------------------------------------------------

    /// Create a graph holding just `node` and index it.
    fn create_graph_with_node(&mut self, node: &NodePos<N>) -> Result<GraphId, CoreError> {
        let id = self.next_graph_id().ok_or(CoreError::GraphIdsExhausted)?;
        let mut graph = BlockGraph::new(id);
        graph.insert_node(node.clone(), node.node.create_entity(node.pos))?;
        self.graphs.insert(id, graph);
        self.chunk_mut(node.pos.region()).put_graph_with_node(id, node);
        self.mark_dirty(id);
        self.fire(id, GraphEvent::Created);
        debug!(graph_id = %id, node = %node, "Created graph");
        Ok(id)
    }

    /// Remove a node from graph `id`, fix the region index, queue callbacks,
    /// and destroy the graph if it is now empty. Does not split.
    fn destroy_node(&mut self, id: GraphId, node: &NodePos<N>) -> Option<RemovedNode<N>> {
        let graph = self.graphs.get_mut(&id)?;
        let removed = graph.remove_node(node)?;
        let now_empty = graph.is_empty();

        if removed.pos_vacated {
            self.chunk_mut(node.pos.region())
                .remove_graph_in_pos(id, node.pos);
        }
        for link in &removed.links {
            self.callback_updates.push(link.other(node).clone());
        }
        self.callback_updates.push(node.clone());
        self.mark_dirty(id);

        if now_empty {
            self.destroy_graph_impl(id);
        }
        Some(removed)
    }

    /// Drop a graph from memory, disk, and every region index that lists it.
    fn destroy_graph_impl(&mut self, id: GraphId) {
        let regions: Vec<RegionPos> = self
            .graphs
            .remove(&id)
            .map(|g| g.regions().collect())
            .unwrap_or_default();
        self.unsaved.shift_remove(&id);
        self.delete_graph_file(id);
        for region in regions {
            self.chunk_mut(region).remove_graph(id);
        }
        self.fire_destroyed(id);
        debug!(graph_id = %id, "Destroyed graph");
    }

    /// Merge two graphs, smaller into larger (first operand on a tie).
    /// Returns the surviving id.
    fn merge_graphs(&mut self, a: GraphId, b: GraphId) -> GraphId {
        let size_a = self.graphs.get(&a).map_or(0, BlockGraph::size);
        let size_b = self.graphs.get(&b).map_or(0, BlockGraph::size);
        let (keep, absorb) = if size_a >= size_b { (a, b) } else { (b, a) };
        if keep == absorb || !self.graphs.contains_key(&keep) {
            return keep;
        }
        let Some(absorbed) = self.graphs.remove(&absorb) else {
            return keep;
        };

        let positions: Vec<BlockPos> = absorbed.positions().collect();
        if let Some(graph) = self.graphs.get_mut(&keep) {
            graph.merge(absorbed);
        }
        for pos in positions {
            let chunk = self.chunk_mut(pos.region());
            chunk.remove_graph_in_pos(absorb, pos);
            chunk.put_graph_in_pos(keep, pos);
        }

        self.unsaved.shift_remove(&absorb);
        self.delete_graph_file(absorb);
        self.mark_dirty(keep);
        self.fire_destroyed(absorb);
        debug!(graph_id = %keep, absorbed = %absorb, "Merged graphs");
        keep
    }

    /// Split graph `id` into its connected components.
    ///
    /// Fires `graph_updated` for the original and `graph_created` for each
    /// new graph.
    pub(super) fn split_graph(&mut self, id: GraphId) {
        // An empty placeholder keeps `id` reserved while ids are handed out.
        let Some(slot) = self.graphs.get_mut(&id) else {
            return;
        };
        let mut graph = std::mem::replace(slot, BlockGraph::new(id));
        let parts = graph.split(|| self.next_graph_id());
        self.graphs.insert(id, graph);

        let mut created = Vec::with_capacity(parts.len());
        for part in parts {
            let new_id = part.id();
            let positions: Vec<BlockPos> = part.positions().collect();
            self.graphs.insert(new_id, part);
            for pos in positions {
                let still_there = self.graphs.get(&id).is_some_and(|g| g.has_nodes_at(pos));
                let chunk = self.chunk_mut(pos.region());
                chunk.put_graph_in_pos(new_id, pos);
                if !still_there {
                    chunk.remove_graph_in_pos(id, pos);
                }
            }
            self.mark_dirty(new_id);
            created.push(new_id);
        }

        if !created.is_empty() {
            self.mark_dirty(id);
            debug!(graph_id = %id, new_graphs = created.len(), "Split graph");
        }
        self.fire(id, GraphEvent::Updated);
        for new_id in created {
            self.fire(new_id, GraphEvent::Created);
        }
    }

    /// Link two nodes already in graph `id`. Queues callbacks for both ends.
    fn link_in(
        &mut self,
        id: GraphId,
        a: &NodePos<N>,
        b: &NodePos<N>,
        key: N::Key,
        entity: Option<<N::Key as LinkKey>::Entity>,
    ) -> Option<LinkOf<N>> {
        let graph = self.graphs.get_mut(&id)?;
        match graph.link(a, b, key, entity) {
            Ok(link) => {
                self.mark_dirty(id);
                self.callback_updates.push(a.clone());
                self.callback_updates.push(b.clone());
                Some(link)
            }
            Err(WorldError::LinkExists(_)) => None,
            Err(err) => {
                warn!(graph_id = %id, %err, "Unable to link nodes");
                None
            }
        }
    }

    /// Unlink two nodes in graph `id`. Queues callbacks for both ends.
    fn unlink_in(&mut self, id: GraphId, a: &NodePos<N>, b: &NodePos<N>, key: &N::Key) -> bool {
        let removed = self
            .graphs
            .get_mut(&id)
            .is_some_and(|g| g.unlink(a, b, key));
        if removed {
            self.mark_dirty(id);
            self.callback_updates.push(a.clone());
            self.callback_updates.push(b.clone());
        }
        removed
    }

    // -------------------------------------------------------------------
    // Rescans
    // -------------------------------------------------------------------

    /// Reconcile the nodes at a cell with what the discoverers report.
    ///
    /// Existing auto-removable nodes that are no longer reported are
    /// destroyed; reported nodes that do not exist yet get a fresh graph
    /// and a connection recomputation.
    pub(super) fn on_nodes_changed(&mut self, pos: BlockPos, discovered: &IndexSet<N>) {
        let mut new_nodes = discovered.clone();
        let mut touched = BTreeSet::new();

        for id in self.resolve_graphs_at(pos) {
            let existing: Vec<NodePos<N>> = self
                .graphs
                .get(&id)
                .map(|g| g.nodes_at(pos).cloned().collect())
                .unwrap_or_default();
            for node in existing {
                if node.node.is_automatic_removal() && !discovered.contains(&node.node) {
                    self.destroy_node(id, &node);
                    touched.insert(id);
                }
                new_nodes.shift_remove(&node.node);
            }
        }

        for id in touched {
            if self.graphs.contains_key(&id) {
                self.split_graph(id);
            }
        }

        for payload in new_nodes {
            let node = NodePos::new(pos, payload);
            match self.create_graph_with_node(&node) {
                Ok(_) => self.update_connections(&node),
                Err(err) => warn!(%pos, %err, "Unable to create graph for discovered node"),
            }
        }
    }

    /// Recompute one node's links against what it and its partners want.
    ///
    /// New links are made first, merging graphs as needed, then stale links
    /// are removed, and only then is the result split. Observers never see
    /// a half-applied state.
    pub(super) fn update_connections(&mut self, node: &NodePos<N>) {
        let Some(node_graph) = self.graph_for_node(node) else {
            warn!(node = %node, "Tried to update connections of a node with no graph");
            return;
        };

        let old: BTreeSet<HalfLinkOf<N>> = self
            .graphs
            .get(&node_graph)
            .map(|g| g.connections(node).into_iter().collect())
            .unwrap_or_default();

        // Wanted by this node and accepted by the other end.
        let payload = node.node.clone();
        let mut wanted: IndexSet<HalfLinkOf<N>> = IndexSet::new();
        for half in payload.find_connections(node.pos, self) {
            if half.other == *node {
                warn!(node = %node, "Ignoring wanted connection to self");
                continue;
            }
            let other = half.other.node.clone();
            if other.can_connect(half.other.pos, self, &half.reverse(node)) {
                wanted.insert(half);
            }
        }

        let mut new_links = Vec::new();
        for half in &wanted {
            let Some(other_graph) = self.graph_for_node(&half.other) else {
                debug!(node = %node, other = %half.other, "Wanted connection to a node with no graph");
                continue;
            };
            if other_graph != node_graph || !old.contains(half) {
                new_links.push(half.clone());
            }
        }

        let mut removed_links = Vec::new();
        for half in &old {
            let remove = if half.key.is_automatic_removal() {
                !wanted.contains(half)
            } else {
                !self.node_exists(&half.other)
            };
            if remove {
                removed_links.push(half.clone());
            }
        }

        let mut merged = node_graph;
        for half in new_links {
            let Some(other_graph) = self.graph_for_node(&half.other) else {
                continue;
            };
            if other_graph != merged {
                merged = self.merge_graphs(merged, other_graph);
            }
            let entity = half.key.create_entity();
            self.link_in(merged, node, &half.other, half.key, entity);
        }

        let mut any_removed = false;
        for half in &removed_links {
            any_removed |= self.unlink_in(merged, node, &half.other, &half.key);
        }

        if any_removed {
            self.split_graph(merged);
        } else {
            self.fire(merged, GraphEvent::Updated);
        }
    }
}
