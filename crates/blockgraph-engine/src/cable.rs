//! The demo's host world: coloured cable on a grid.
//!
//! Each cell holds at most one cable. A cable wants an automatic contact
//! link to every face neighbour of the same colour; bridges are manual links
//! placed by the demo between distant cables of one colour.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use blockgraph_core::GraphUniverse;
use blockgraph_types::{BlockPos, HalfLink};
use blockgraph_world::{BlockNode, LinkKey, NodeView};
use serde::{Deserialize, Serialize};

/// Name of the demo universe, also its storage subdirectory.
pub const UNIVERSE_NAME: &str = "cables";

/// A cable filling one cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cable {
    /// Cables only join automatically when colours match.
    pub colour: u8,
}

/// Link keys between cables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CableKey {
    /// Face contact with a same-coloured neighbour.
    Contact,
    /// A manually placed bridge.
    Bridge,
}

impl LinkKey for CableKey {
    type Entity = ();

    fn is_automatic_removal(&self) -> bool {
        matches!(self, Self::Contact)
    }
}

impl BlockNode for Cable {
    type Key = CableKey;
    type Entity = ();

    fn find_connections(
        &self,
        pos: BlockPos,
        view: &mut dyn NodeView<Self>,
    ) -> Vec<HalfLink<Self, CableKey>> {
        let mut wanted = Vec::new();
        for neighbour in pos.neighbours() {
            for other in view.nodes_at(neighbour) {
                if other.node.colour == self.colour {
                    wanted.push(HalfLink::new(CableKey::Contact, other));
                }
            }
        }
        wanted
    }

    fn can_connect(
        &self,
        pos: BlockPos,
        _view: &mut dyn NodeView<Self>,
        link: &HalfLink<Self, CableKey>,
    ) -> bool {
        match link.key {
            CableKey::Bridge => link.other.node.colour == self.colour,
            CableKey::Contact => {
                link.other.node.colour == self.colour && pos.neighbours().contains(&link.other.pos)
            }
        }
    }
}

/// Cells and the cable in each, shared with the discoverer.
pub type Terrain = Rc<RefCell<BTreeMap<BlockPos, Cable>>>;

/// A universe whose single discoverer reads `terrain`.
pub fn universe(terrain: &Terrain) -> Rc<GraphUniverse<Cable>> {
    let terrain = Rc::clone(terrain);
    Rc::new(
        GraphUniverse::builder(UNIVERSE_NAME)
            .discoverer(move |pos: BlockPos| -> Vec<Cable> {
                terrain.borrow().get(&pos).cloned().into_iter().collect()
            })
            .build(),
    )
}
