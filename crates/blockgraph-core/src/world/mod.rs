//! The graph world: every loaded graph, the region index, and the queues.
//!
//! [`GraphWorld`] is the single owner of all partition state for one
//! universe in one host world. Graphs are addressed by [`GraphId`] through
//! an id-indexed table; the region index maps cells to ids; nothing holds a
//! direct reference to a graph across calls.
//!
//! # Submodules
//!
//! - `query` -- read-side lookups that load regions and graphs on demand,
//!   and the [`NodeView`](blockgraph_world::NodeView) impl handed to
//!   collaborators.
//! - `mutate` -- node and link mutation, merge, split, and the connection
//!   recomputation routine.
//! - `tick` -- the per-tick maintenance cycle.

mod mutate;
mod query;
mod tick;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use blockgraph_store::{GraphFiles, RegionStore, RegionUnloadTimer, StateFile};
use blockgraph_types::{
    BlockPos, GraphId, NodePos, RegionPos, SaveMode, StateRecord, UpdatePos,
};
use blockgraph_world::{BlockGraph, BlockNode, DecodedGraph, GraphChunk};
use indexmap::IndexSet;
use tracing::{debug, error, info, warn};

use crate::config::GraphConfig;
use crate::error::CoreError;
use crate::events::GraphListener;
use crate::universe::GraphUniverse;
use crate::updates::UpdateQueue;

pub use tick::TickSummary;

/// Sizes of the pending-work queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingUpdates {
    /// Queued node rescans.
    pub node_rescans: usize,
    /// Queued connection rescans.
    pub connection_rescans: usize,
    /// Queued connection-change callbacks.
    pub callbacks: usize,
    /// Graphs with unsaved changes.
    pub unsaved_graphs: usize,
}

/// Which listener method to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphEvent {
    Created,
    Updated,
    Unloading,
}

/// All graphs of one universe in one host world.
pub struct GraphWorld<N: BlockNode> {
    universe: Rc<GraphUniverse<N>>,
    root: PathBuf,
    chunks: RegionStore<GraphChunk>,
    timer: RegionUnloadTimer,
    files: GraphFiles,
    state_file: StateFile,
    save_mode: SaveMode,
    save_factor: usize,
    graphs: BTreeMap<GraphId, BlockGraph<N>>,
    unsaved: IndexSet<GraphId>,
    node_updates: UpdateQueue<BlockPos>,
    connection_updates: UpdateQueue<UpdatePos>,
    callback_updates: UpdateQueue<NodePos<N>>,
    listeners: Vec<Box<dyn GraphListener<N>>>,
    prev_graph_id: Option<GraphId>,
    state_dirty: bool,
    closed: bool,
    tick: u64,
}

impl<N: BlockNode> core::fmt::Debug for GraphWorld<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GraphWorld")
            .field("universe", &self.universe.name())
            .field("root", &self.root)
            .field("loaded_graphs", &self.graphs.len())
            .field("unsaved", &self.unsaved.len())
            .field("tick", &self.tick)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<N: BlockNode> GraphWorld<N> {
    /// Open the world's storage under `<storage.root>/<universe name>`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the configuration is invalid, or
    /// [`CoreError::Store`] if the storage directories cannot be created.
    pub fn open(universe: Rc<GraphUniverse<N>>, config: &GraphConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let root = config.storage.root.join(universe.name());
        let files = GraphFiles::new(root.join("graphs"))?;
        let chunks = RegionStore::new(root.join("regions"))?;
        let state_file = StateFile::new(&root);
        let StateRecord { prev_graph_id } = state_file.load();

        info!(
            universe = universe.name(),
            root = %root.display(),
            save_mode = ?config.storage.save_mode,
            prev_graph_id = ?prev_graph_id,
            "Opened graph world"
        );

        Ok(Self {
            universe,
            root,
            chunks,
            timer: RegionUnloadTimer::new(config.unload.max_idle_ticks),
            files,
            state_file,
            save_mode: config.storage.save_mode,
            save_factor: config.storage.incremental_save_factor,
            graphs: BTreeMap::new(),
            unsaved: IndexSet::new(),
            node_updates: UpdateQueue::new(),
            connection_updates: UpdateQueue::new(),
            callback_updates: UpdateQueue::new(),
            listeners: Vec::new(),
            prev_graph_id,
            state_dirty: false,
            closed: false,
            tick: 0,
        })
    }

    /// The universe this world belongs to.
    pub fn universe(&self) -> &Rc<GraphUniverse<N>> {
        &self.universe
    }

    /// The directory this world persists into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of completed ticks.
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Whether [`close`](Self::close) has run.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Register a lifecycle listener.
    pub fn add_listener(&mut self, listener: impl GraphListener<N> + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    /// The host world loaded a region: pin it and load the graphs indexed
    /// there. Ignored after [`close`](Self::close).
    pub fn on_region_load(&mut self, region: RegionPos) {
        if self.closed {
            debug!(%region, "Ignoring region load on closed world");
            return;
        }
        self.timer.on_world_region_load(region);
        let ids = self.chunks.get(region).graphs();
        for id in ids {
            if !self.ensure_graph(id) {
                warn!(graph_id = %id, %region, "Region index names a graph that could not be loaded");
            }
        }
    }

    /// The host world unloaded a region: let it age toward eviction.
    pub fn on_region_unload(&mut self, region: RegionPos) {
        self.timer.on_world_region_unload(region);
    }

    /// Write the state record, every loaded graph touching the region, and
    /// the region's index.
    pub fn save_region(&mut self, region: RegionPos) {
        self.save_state();
        let ids: Vec<GraphId> = self
            .graphs
            .values()
            .filter(|g| g.occupies_region(region))
            .map(BlockGraph::id)
            .collect();
        for id in ids {
            if self.write_graph(id) {
                self.unsaved.shift_remove(&id);
            }
        }
        if let Err(err) = self.chunks.save(region) {
            error!(%region, %err, "Failed to save region index");
        }
    }

    /// Write every loaded graph, the state record, and every dirty region.
    pub fn save_all(&mut self) {
        let ids: Vec<GraphId> = self.graphs.keys().copied().collect();
        let mut failed: usize = 0;
        for id in ids {
            if self.write_graph(id) {
                self.unsaved.shift_remove(&id);
            } else {
                failed = failed.saturating_add(1);
            }
        }
        self.save_state();
        self.chunks.save_all();
        if failed > 0 {
            warn!(failed, "Some graphs could not be saved and remain dirty");
        }
    }

    /// Flush everything and stop accepting region loads. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.save_all();
        info!(
            universe = self.universe.name(),
            loaded_graphs = self.graphs.len(),
            "Closed graph world"
        );
    }

    // -------------------------------------------------------------------
    // Residency
    // -------------------------------------------------------------------

    /// The region index for `region`, loading it and marking it used.
    fn chunk(&mut self, region: RegionPos) -> &GraphChunk {
        self.timer.on_region_use(region);
        self.chunks.get(region)
    }

    /// The region index for `region` for modification.
    fn chunk_mut(&mut self, region: RegionPos) -> &mut GraphChunk {
        self.timer.on_region_use(region);
        self.chunks.get_mut(region)
    }

    /// Make sure graph `id` is resident and mark its regions used. Returns
    /// `false` if no such graph can be loaded.
    fn ensure_graph(&mut self, id: GraphId) -> bool {
        if !self.graphs.contains_key(&id) {
            let Some(DecodedGraph { graph, dropped }) = self.read_graph(id) else {
                return false;
            };
            self.graphs.insert(id, graph);
            if dropped > 0 {
                warn!(graph_id = %id, dropped, "Graph loaded with dropped entries, re-splitting");
                self.mark_dirty(id);
                self.split_graph(id);
            }
        }
        if let Some(graph) = self.graphs.get(&id) {
            for region in graph.regions() {
                self.timer.on_region_use(region);
            }
        }
        true
    }

    /// Read a graph record without inserting it.
    ///
    /// Corrupt or empty records are deleted and the id is left extinct.
    fn read_graph(&mut self, id: GraphId) -> Option<DecodedGraph<N>> {
        let record = match self.files.read(id) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(err) => {
                error!(graph_id = %id, %err, "Unable to load graph, removing it");
                self.delete_graph_file(id);
                return None;
            }
        };
        let decoded = BlockGraph::from_record(id, record);
        if decoded.graph.is_empty() {
            warn!(graph_id = %id, "Loaded empty graph, its nodes probably failed to load; removing it");
            self.delete_graph_file(id);
            return None;
        }
        debug!(graph_id = %id, nodes = decoded.graph.size(), "Loaded graph");
        Some(decoded)
    }

    /// Hand out the next unused graph id.
    fn next_graph_id(&mut self) -> Option<GraphId> {
        let mut candidate = match self.prev_graph_id {
            Some(prev) => prev.checked_next(),
            None => Some(GraphId::FIRST),
        };
        while let Some(id) = candidate {
            if !self.graphs.contains_key(&id) && !self.files.exists(id) {
                break;
            }
            candidate = id.checked_next();
        }
        let Some(id) = candidate else {
            error!("Graph id space exhausted");
            return None;
        };
        self.prev_graph_id = Some(id);
        self.state_dirty = true;
        Some(id)
    }

    // -------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------

    fn mark_dirty(&mut self, id: GraphId) {
        self.unsaved.insert(id);
    }

    /// Write one loaded graph. Returns whether the write succeeded.
    fn write_graph(&self, id: GraphId) -> bool {
        let Some(graph) = self.graphs.get(&id) else {
            return false;
        };
        let record = match graph.to_record() {
            Ok(record) => record,
            Err(err) => {
                error!(graph_id = %id, %err, "Unable to encode graph");
                return false;
            }
        };
        match self.files.write(id, &record) {
            Ok(()) => true,
            Err(err) => {
                error!(graph_id = %id, %err, "Unable to save graph");
                false
            }
        }
    }

    fn delete_graph_file(&self, id: GraphId) {
        if let Err(err) = self.files.delete(id) {
            error!(graph_id = %id, %err, "Error removing graph file");
        }
    }

    /// Write the state record if it changed.
    fn save_state(&mut self) {
        if !self.state_dirty {
            return;
        }
        let state = StateRecord {
            prev_graph_id: self.prev_graph_id,
        };
        match self.state_file.save(&state) {
            Ok(()) => self.state_dirty = false,
            Err(err) => error!(%err, "Error saving graph world state"),
        }
    }

    // -------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------

    fn fire(&mut self, id: GraphId, event: GraphEvent) {
        let Some(graph) = self.graphs.get(&id) else {
            return;
        };
        for listener in &mut self.listeners {
            match event {
                GraphEvent::Created => listener.graph_created(graph),
                GraphEvent::Updated => listener.graph_updated(graph),
                GraphEvent::Unloading => listener.graph_unloading(graph),
            }
        }
    }

    fn fire_destroyed(&mut self, id: GraphId) {
        for listener in &mut self.listeners {
            listener.graph_destroyed(id);
        }
    }
}
