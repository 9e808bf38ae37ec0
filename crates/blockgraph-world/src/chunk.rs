//! Per-region index of which graphs occupy which cells.
//!
//! A [`GraphChunk`] answers "which graphs touch this cell" without loading
//! any graph. It stores ids only; questions about node membership resolve
//! through a caller-supplied lookup so the index never holds graph
//! references.

use std::collections::{BTreeMap, BTreeSet};

use blockgraph_store::RegionData;
use blockgraph_types::{BlockPos, GraphId, NodePos};
use serde::{Deserialize, Serialize};

use crate::graph::BlockGraph;
use crate::node::BlockNode;

/// Map from occupied cell to the ids of the graphs with nodes there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ChunkRecord", into = "ChunkRecord")]
pub struct GraphChunk {
    graphs_in_pos: BTreeMap<BlockPos, BTreeSet<GraphId>>,
}

/// Persisted form: JSON object keys must be strings, so cells are listed.
#[derive(Serialize, Deserialize)]
struct ChunkRecord {
    #[serde(default)]
    positions: Vec<PosEntry>,
}

#[derive(Serialize, Deserialize)]
struct PosEntry {
    pos: BlockPos,
    graphs: Vec<GraphId>,
}

impl From<ChunkRecord> for GraphChunk {
    fn from(record: ChunkRecord) -> Self {
        let mut chunk = Self::default();
        for entry in record.positions {
            if entry.graphs.is_empty() {
                continue;
            }
            chunk
                .graphs_in_pos
                .entry(entry.pos)
                .or_default()
                .extend(entry.graphs);
        }
        chunk
    }
}

impl From<GraphChunk> for ChunkRecord {
    fn from(chunk: GraphChunk) -> Self {
        Self {
            positions: chunk
                .graphs_in_pos
                .into_iter()
                .map(|(pos, graphs)| PosEntry {
                    pos,
                    graphs: graphs.into_iter().collect(),
                })
                .collect(),
        }
    }
}

impl RegionData for GraphChunk {
    fn is_empty(&self) -> bool {
        self.graphs_in_pos.is_empty()
    }
}

impl GraphChunk {
    /// Create an empty index.
    pub const fn new() -> Self {
        Self {
            graphs_in_pos: BTreeMap::new(),
        }
    }

    /// Whether no cell is indexed.
    pub fn is_empty(&self) -> bool {
        self.graphs_in_pos.is_empty()
    }

    /// Number of indexed cells.
    pub fn position_count(&self) -> usize {
        self.graphs_in_pos.len()
    }

    /// Ids of the graphs with nodes at the cell.
    pub fn graphs_at(&self, pos: BlockPos) -> impl Iterator<Item = GraphId> + '_ {
        self.graphs_in_pos.get(&pos).into_iter().flatten().copied()
    }

    /// Ids of every graph indexed anywhere in this region.
    pub fn graphs(&self) -> BTreeSet<GraphId> {
        self.graphs_in_pos.values().flatten().copied().collect()
    }

    /// Iterate over the indexed cells.
    pub fn positions(&self) -> impl Iterator<Item = BlockPos> + '_ {
        self.graphs_in_pos.keys().copied()
    }

    /// Record that graph `id` has a node at `node`'s cell.
    ///
    /// Returns `true` if the entry is new.
    pub fn put_graph_with_node<N>(&mut self, id: GraphId, node: &NodePos<N>) -> bool {
        self.put_graph_in_pos(id, node.pos)
    }

    /// Record that graph `id` has a node at the cell.
    ///
    /// Returns `true` if the entry is new.
    pub fn put_graph_in_pos(&mut self, id: GraphId, pos: BlockPos) -> bool {
        self.graphs_in_pos.entry(pos).or_default().insert(id)
    }

    /// Drop graph `id` at `node`'s cell unless the graph still has another
    /// node there.
    ///
    /// `resolver` looks up loaded graphs; an unresolvable id is treated as
    /// having nothing at the cell. Returns `true` if an entry was removed.
    pub fn remove_graph_with_node<'a, N: BlockNode>(
        &mut self,
        id: GraphId,
        node: &NodePos<N>,
        resolver: impl Fn(GraphId) -> Option<&'a BlockGraph<N>>,
    ) -> bool {
        let still_there = resolver(id).is_some_and(|g| g.has_nodes_at(node.pos));
        !still_there && self.remove_graph_in_pos(id, node.pos)
    }

    /// Drop graph `id` at the cell. Returns `true` if an entry was removed.
    pub fn remove_graph_in_pos(&mut self, id: GraphId, pos: BlockPos) -> bool {
        let Some(ids) = self.graphs_in_pos.get_mut(&pos) else {
            return false;
        };
        let removed = ids.remove(&id);
        if ids.is_empty() {
            self.graphs_in_pos.remove(&pos);
        }
        removed
    }

    /// Drop graph `id` at every cell. Returns `true` if any entry was removed.
    pub fn remove_graph(&mut self, id: GraphId) -> bool {
        let mut removed = false;
        self.graphs_in_pos.retain(|_, ids| {
            removed |= ids.remove(&id);
            !ids.is_empty()
        });
        removed
    }

    /// Whether some indexed graph at the node's cell contains the node.
    pub fn contains_node<'a, N: BlockNode>(
        &self,
        node: &NodePos<N>,
        resolver: impl Fn(GraphId) -> Option<&'a BlockGraph<N>>,
    ) -> bool {
        self.graph_for_node(node, resolver).is_some()
    }

    /// The indexed graph at the node's cell that contains the node.
    pub fn graph_for_node<'a, N: BlockNode>(
        &self,
        node: &NodePos<N>,
        resolver: impl Fn(GraphId) -> Option<&'a BlockGraph<N>>,
    ) -> Option<GraphId> {
        self.graphs_at(node.pos)
            .find(|&id| resolver(id).is_some_and(|g| g.contains_node(node)))
    }
}
