//! Shared fixtures for the `blockgraph-core` integration tests.
//!
//! The test domain is coloured cable: a [`Cable`] fills its cell and wants an
//! automatic link to every face-adjacent cable of the same colour. A manual
//! [`CableKey::Bridge`] can join any two cables and only goes away when an
//! endpoint does. Terrain is a shared map the discoverer reads from.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use blockgraph_core::{GraphConfig, GraphListener, GraphUniverse, GraphWorld};
use blockgraph_types::{BlockPos, GraphId, HalfLink, NodePos, SaveMode};
use blockgraph_world::{BlockGraph, BlockNode, LinkKey, NodeView};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

/// A cable of one colour filling its cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cable {
    /// Only cables of equal colour join automatically.
    pub colour: u8,
}

/// Link keys between cables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CableKey {
    /// Face contact between same-coloured cables.
    Contact,
    /// A manually placed bridge.
    Bridge,
}

impl LinkKey for CableKey {
    type Entity = u32;

    fn is_automatic_removal(&self) -> bool {
        matches!(self, Self::Contact)
    }

    fn create_entity(&self) -> Option<u32> {
        matches!(self, Self::Bridge).then_some(0)
    }
}

thread_local! {
    static CALLBACKS: RefCell<Vec<NodePos<Cable>>> = const { RefCell::new(Vec::new()) };
}

/// Drain the connection-change callbacks delivered on this thread.
pub fn take_callbacks() -> Vec<NodePos<Cable>> {
    CALLBACKS.with(|c| std::mem::take(&mut *c.borrow_mut()))
}

impl BlockNode for Cable {
    type Key = CableKey;
    type Entity = u32;

    fn find_connections(
        &self,
        pos: BlockPos,
        view: &mut dyn NodeView<Self>,
    ) -> Vec<HalfLink<Self, CableKey>> {
        pos.neighbours()
            .into_iter()
            .flat_map(|n| view.nodes_at(n))
            .filter(|other| other.node.colour == self.colour)
            .map(|other| HalfLink::new(CableKey::Contact, other))
            .collect()
    }

    fn can_connect(
        &self,
        pos: BlockPos,
        _view: &mut dyn NodeView<Self>,
        link: &HalfLink<Self, CableKey>,
    ) -> bool {
        match link.key {
            CableKey::Bridge => true,
            CableKey::Contact => {
                link.other.node.colour == self.colour && pos.neighbours().contains(&link.other.pos)
            }
        }
    }

    fn on_connections_changed(&self, pos: BlockPos, _view: &mut dyn NodeView<Self>) {
        CALLBACKS.with(|c| c.borrow_mut().push(NodePos::new(pos, self.clone())));
    }

    fn create_entity(&self, _pos: BlockPos) -> Option<u32> {
        Some(u32::from(self.colour))
    }
}

/// What the discoverer reports per cell.
pub type Terrain = Rc<RefCell<BTreeMap<BlockPos, Vec<Cable>>>>;

/// Shorthand for a cell.
pub const fn p(x: i32, y: i32, z: i32) -> BlockPos {
    BlockPos::new(x, y, z)
}

/// Shorthand for a cable node.
pub const fn cable(pos: BlockPos, colour: u8) -> NodePos<Cable> {
    NodePos::new(pos, Cable { colour })
}

/// A universe whose one discoverer reads `terrain`.
pub fn universe(terrain: &Terrain) -> Rc<GraphUniverse<Cable>> {
    let terrain = Rc::clone(terrain);
    Rc::new(
        GraphUniverse::builder("cables")
            .discoverer(move |pos: BlockPos| terrain.borrow().get(&pos).cloned().unwrap_or_default())
            .build(),
    )
}

/// A world over a temp directory plus the terrain it discovers from.
pub struct Harness {
    /// Keeps the storage directory alive.
    pub dir: TempDir,
    /// Cells and the cables in them.
    pub terrain: Terrain,
    /// The config the world was opened with.
    pub config: GraphConfig,
    /// The world under test.
    pub world: GraphWorld<Cable>,
}

impl Harness {
    /// A world with default settings.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// A world whose config is adjusted by `tweak`.
    pub fn with_config(tweak: impl FnOnce(&mut GraphConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GraphConfig::with_root(dir.path());
        config.storage.save_mode = SaveMode::Unloaded;
        tweak(&mut config);
        let terrain = Terrain::default();
        let world = GraphWorld::open(universe(&terrain), &config).unwrap();
        Self {
            dir,
            terrain,
            config,
            world,
        }
    }

    /// Close the current world and open a fresh one over the same storage.
    pub fn reopen(&mut self) {
        self.world.close();
        self.world = GraphWorld::open(universe(&self.terrain), &self.config).unwrap();
    }

    /// Put a cable in the terrain and queue a rescan of its cell.
    pub fn place(&mut self, pos: BlockPos, colour: u8) {
        self.terrain
            .borrow_mut()
            .entry(pos)
            .or_default()
            .push(Cable { colour });
        self.world.request_node_rescan(pos);
    }

    /// Clear a cell in the terrain and queue a rescan of it.
    pub fn clear(&mut self, pos: BlockPos) {
        self.terrain.borrow_mut().remove(&pos);
        self.world.request_node_rescan(pos);
    }

    /// The graph owning the cable, which must exist.
    pub fn graph_of(&mut self, node: &NodePos<Cable>) -> GraphId {
        self.world
            .graph_for_node(node)
            .unwrap_or_else(|| panic!("no graph for {node}"))
    }

    /// Node sets of every loaded graph.
    pub fn partition(&self) -> Vec<BTreeSet<NodePos<Cable>>> {
        self.world
            .loaded_graphs()
            .map(|g| g.nodes().cloned().collect())
            .collect()
    }
}

/// Records every lifecycle notification in order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    /// Shared log, readable after the world takes ownership of the listener.
    pub log: Rc<RefCell<Vec<Event>>>,
}

/// One notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `graph_created` with the graph's id and size.
    Created(GraphId, usize),
    /// `graph_updated` with the graph's id and size.
    Updated(GraphId, usize),
    /// `graph_destroyed`.
    Destroyed(GraphId),
    /// `graph_unloading`.
    Unloading(GraphId),
}

impl Recorder {
    /// Take the log collected so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.log.borrow_mut())
    }
}

impl GraphListener<Cable> for Recorder {
    fn graph_created(&mut self, graph: &BlockGraph<Cable>) {
        self.log
            .borrow_mut()
            .push(Event::Created(graph.id(), graph.size()));
    }

    fn graph_updated(&mut self, graph: &BlockGraph<Cable>) {
        self.log
            .borrow_mut()
            .push(Event::Updated(graph.id(), graph.size()));
    }

    fn graph_destroyed(&mut self, id: GraphId) {
        self.log.borrow_mut().push(Event::Destroyed(id));
    }

    fn graph_unloading(&mut self, graph: &BlockGraph<Cable>) {
        self.log.borrow_mut().push(Event::Unloading(graph.id()));
    }
}
