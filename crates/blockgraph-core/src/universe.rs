//! The startup configuration object naming a family of graphs.
//!
//! A [`GraphUniverse`] bundles the node discoverers for one kind of graph
//! and names the storage subdirectory its worlds persist into. It is built
//! once at startup and shared by `Rc` with every world that uses it.
//! Discoverers usually read host state behind `Rc<RefCell<..>>`, so a
//! universe and its worlds stay on the thread that drives the ticks.

use blockgraph_types::BlockPos;
use blockgraph_world::{BlockNode, NodeDiscoverer};
use indexmap::IndexSet;

/// Registered discoverers for one family of graphs.
pub struct GraphUniverse<N: BlockNode> {
    name: String,
    discoverers: Vec<Box<dyn NodeDiscoverer<N>>>,
}

impl<N: BlockNode> core::fmt::Debug for GraphUniverse<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GraphUniverse")
            .field("name", &self.name)
            .field("discoverers", &self.discoverers.len())
            .finish()
    }
}

impl<N: BlockNode> GraphUniverse<N> {
    /// Start building a universe with the given name.
    pub fn builder(name: impl Into<String>) -> GraphUniverseBuilder<N> {
        GraphUniverseBuilder {
            name: name.into(),
            discoverers: Vec::new(),
        }
    }

    /// The universe name, also its storage subdirectory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of registered discoverers.
    pub fn discoverer_count(&self) -> usize {
        self.discoverers.len()
    }

    /// Every node any discoverer reports at the cell, in registration
    /// order, without duplicates.
    pub fn discover_nodes(&self, pos: BlockPos) -> IndexSet<N> {
        self.discoverers
            .iter()
            .flat_map(|d| d.discover_nodes(pos))
            .collect()
    }
}

/// Builder for [`GraphUniverse`].
pub struct GraphUniverseBuilder<N: BlockNode> {
    name: String,
    discoverers: Vec<Box<dyn NodeDiscoverer<N>>>,
}

impl<N: BlockNode> GraphUniverseBuilder<N> {
    /// Register a discoverer.
    #[must_use]
    pub fn discoverer(mut self, discoverer: impl NodeDiscoverer<N> + 'static) -> Self {
        self.discoverers.push(Box::new(discoverer));
        self
    }

    /// Finish the universe.
    pub fn build(self) -> GraphUniverse<N> {
        GraphUniverse {
            name: self.name,
            discoverers: self.discoverers,
        }
    }
}
