//! The per-tick maintenance cycle.
//!
//! One call to [`GraphWorld::tick`] runs, in order: region ageing, node
//! rescans, connection rescans, connection-change callbacks, eviction of
//! idle regions and the graphs confined to them, and incremental
//! persistence. Work queued during a phase by collaborators lands in the
//! next tick's batch.

use blockgraph_types::{GraphId, NodePos, RegionPos, SaveMode, UpdatePos};
use blockgraph_world::{BlockGraph, BlockNode};
use tracing::{debug, error, warn};

use super::{GraphEvent, GraphWorld};

/// What one maintenance pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick number after this pass.
    pub tick: u64,
    /// Cells whose nodes were rescanned.
    pub node_rescans: usize,
    /// Cells or faces whose connections were recomputed.
    pub connection_rescans: usize,
    /// Connection-change callbacks delivered.
    pub callbacks: usize,
    /// Graphs written and dropped from memory.
    pub graphs_unloaded: usize,
    /// Region indexes written and dropped from memory.
    pub regions_unloaded: usize,
    /// Dirty graphs written.
    pub graphs_saved: usize,
    /// Dirty region indexes written.
    pub regions_saved: usize,
    /// Graphs resident after the pass.
    pub loaded_graphs: usize,
}

impl TickSummary {
    /// Whether the pass rescanned, notified, evicted, or wrote anything.
    pub const fn did_work(&self) -> bool {
        self.node_rescans != 0
            || self.connection_rescans != 0
            || self.callbacks != 0
            || self.graphs_unloaded != 0
            || self.regions_unloaded != 0
            || self.graphs_saved != 0
            || self.regions_saved != 0
    }
}

impl<N: BlockNode> GraphWorld<N> {
    /// Run one maintenance pass. Does nothing after [`close`](Self::close).
    pub fn tick(&mut self) -> TickSummary {
        if self.closed {
            return TickSummary {
                tick: self.tick,
                loaded_graphs: self.graphs.len(),
                ..TickSummary::default()
            };
        }

        self.tick = self.tick.saturating_add(1);
        self.timer.tick();

        let node_rescans = self.run_node_rescans();
        let connection_rescans = self.run_connection_rescans();
        let callbacks = self.run_callbacks();
        let (regions_unloaded, graphs_unloaded) = self.unload_idle();
        let graphs_saved = self.save_unsaved();
        let regions_saved = self.chunks.tick(self.save_mode, self.save_factor);
        if self.save_mode != SaveMode::Unloaded {
            self.save_state();
        }

        let summary = TickSummary {
            tick: self.tick,
            node_rescans,
            connection_rescans,
            callbacks,
            graphs_unloaded,
            regions_unloaded,
            graphs_saved,
            regions_saved,
            loaded_graphs: self.graphs.len(),
        };
        if summary.did_work() {
            debug!(?summary, "Graph world tick");
        }
        summary
    }

    // -------------------------------------------------------------------
    // Phases
    // -------------------------------------------------------------------

    fn run_node_rescans(&mut self) -> usize {
        let batch = self.node_updates.drain();
        let count = batch.len();
        for pos in batch {
            let discovered = self.universe.discover_nodes(pos);
            self.on_nodes_changed(pos, &discovered);
        }
        count
    }

    fn run_connection_rescans(&mut self) -> usize {
        let batch = self.connection_updates.drain();
        let count = batch.len();
        for update in batch {
            let targets: Vec<NodePos<N>> = match update {
                UpdatePos::Block(pos) => self.nodes_at(pos),
                UpdatePos::Sided(sided) => self.nodes_at_side(sided),
            };
            for node in targets {
                // An earlier update in this batch may have removed it.
                if self.node_exists(&node) {
                    self.update_connections(&node);
                }
            }
        }
        count
    }

    fn run_callbacks(&mut self) -> usize {
        let batch = self.callback_updates.drain();
        let count = batch.len();
        for node in batch {
            let NodePos { pos, node } = node;
            node.on_connections_changed(pos, self);
        }
        count
    }

    /// Evict idle regions, then every graph left with no resident region.
    ///
    /// Returns `(regions, graphs)` unloaded.
    fn unload_idle(&mut self) -> (usize, usize) {
        let mut regions_unloaded: usize = 0;
        let mut evicted = false;
        for region in self.timer.regions_to_unload() {
            self.timer.on_region_unload(region);
            match self.chunks.unload(region) {
                Ok(was_resident) => {
                    evicted = true;
                    if was_resident {
                        regions_unloaded = regions_unloaded.saturating_add(1);
                    }
                }
                Err(err) => {
                    error!(%region, %err, "Failed to save region on unload, keeping it resident");
                    self.timer.on_region_use(region);
                }
            }
        }
        if !evicted {
            return (0, 0);
        }

        let orphaned: Vec<GraphId> = self
            .graphs
            .values()
            .filter(|g| !g.regions().any(|r| self.timer.is_region_loaded(r)))
            .map(BlockGraph::id)
            .collect();

        let mut graphs_unloaded: usize = 0;
        for id in orphaned {
            self.fire(id, GraphEvent::Unloading);
            if self.write_graph(id) {
                self.graphs.remove(&id);
                self.unsaved.shift_remove(&id);
                graphs_unloaded = graphs_unloaded.saturating_add(1);
                debug!(graph_id = %id, "Unloaded graph");
            } else {
                warn!(graph_id = %id, "Keeping graph resident after failed save");
                self.mark_dirty(id);
                let regions: Vec<RegionPos> = self
                    .graphs
                    .get(&id)
                    .map(|g| g.regions().collect())
                    .unwrap_or_default();
                for region in regions {
                    self.timer.on_region_use(region);
                }
            }
        }
        (regions_unloaded, graphs_unloaded)
    }

    /// Write part of the dirty graph set as dictated by the save mode.
    fn save_unsaved(&mut self) -> usize {
        let budget = self
            .save_mode
            .writes_this_tick(self.unsaved.len(), self.save_factor);
        let batch: Vec<GraphId> = self.unsaved.iter().take(budget).copied().collect();
        let mut saved: usize = 0;
        for id in batch {
            if !self.graphs.contains_key(&id) {
                self.unsaved.shift_remove(&id);
                continue;
            }
            if self.write_graph(id) {
                self.unsaved.shift_remove(&id);
                saved = saved.saturating_add(1);
            } else if self.unsaved.shift_remove(&id) {
                self.unsaved.insert(id);
            }
        }
        saved
    }
}
