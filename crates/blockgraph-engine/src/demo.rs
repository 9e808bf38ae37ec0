//! The scripted demo run.
//!
//! Each cycle makes a few random edits to the cable terrain, reports every
//! edit to the world the way a host would (a node rescan for the cell and a
//! connection rescan for its neighbours), and ticks. Halfway through, a few
//! manual bridges are laid between distant cables of one colour.

use std::path::Path;
use std::time::Duration;

use blockgraph_core::{GraphConfig, GraphWorld, TickSummary};
use blockgraph_types::{BlockPos, NodePos, RegionPos};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info};

use crate::cable::{Cable, CableKey, Terrain, universe};
use crate::error::EngineError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// The `demo` section of `blockgraph-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DemoConfig {
    /// Seed for the edit sequence.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Cells per side of the square edit area.
    #[serde(default = "default_extent")]
    pub extent: i32,

    /// Number of cycles to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Terrain edits per cycle.
    #[serde(default = "default_edits_per_tick")]
    pub edits_per_tick: u32,

    /// Number of distinct cable colours.
    #[serde(default = "default_colours")]
    pub colours: u8,

    /// Manual bridges attempted halfway through the run.
    #[serde(default = "default_bridges")]
    pub bridges: u32,

    /// Pause between cycles; zero runs flat out.
    #[serde(default)]
    pub tick_interval_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            extent: default_extent(),
            ticks: default_ticks(),
            edits_per_tick: default_edits_per_tick(),
            colours: default_colours(),
            bridges: default_bridges(),
            tick_interval_ms: 0,
        }
    }
}

impl DemoConfig {
    /// Read the `demo` section of the config file, or defaults if the file
    /// or section is absent.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::Demo {
            message: format!("failed to read config file: {e}"),
        })?;
        Self::parse(&contents)
    }

    /// Extract and validate the `demo` section from a whole config document.
    pub fn parse(yaml: &str) -> Result<Self, EngineError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| EngineError::Demo {
            message: format!("failed to parse config YAML: {e}"),
        })?;
        let config = match raw.get("demo") {
            Some(value) => {
                serde_yml::from_value(value.clone()).map_err(|e| EngineError::Demo {
                    message: format!("failed to parse demo config: {e}"),
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.extent < 1 {
            return Err(EngineError::Demo {
                message: String::from("demo.extent must be at least 1"),
            });
        }
        if self.colours == 0 {
            return Err(EngineError::Demo {
                message: String::from("demo.colours must be at least 1"),
            });
        }
        Ok(())
    }
}

const fn default_seed() -> u64 {
    42
}

const fn default_extent() -> i32 {
    24
}

const fn default_ticks() -> u64 {
    200
}

const fn default_edits_per_tick() -> u32 {
    4
}

const fn default_colours() -> u8 {
    3
}

const fn default_bridges() -> u32 {
    3
}

// -----------------------------------------------------------------------
// Run
// -----------------------------------------------------------------------

/// Totals for one demo run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemoReport {
    /// Cycles run.
    pub ticks: u64,
    /// Cables placed.
    pub placed: u64,
    /// Cables removed.
    pub removed: u64,
    /// Bridges successfully laid.
    pub bridges: u32,
    /// Cables in the terrain at the end.
    pub cables: usize,
    /// Graphs resident at the end.
    pub graphs: usize,
    /// Graph writes over the run.
    pub graphs_saved: u64,
    /// Region writes over the run.
    pub regions_saved: u64,
    /// Graphs evicted over the run.
    pub graphs_unloaded: u64,
}

impl DemoReport {
    fn absorb(&mut self, summary: &TickSummary) {
        self.ticks = summary.tick;
        self.graphs = summary.loaded_graphs;
        self.graphs_saved = self.graphs_saved.saturating_add(widen(summary.graphs_saved));
        self.regions_saved = self.regions_saved.saturating_add(widen(summary.regions_saved));
        self.graphs_unloaded = self
            .graphs_unloaded
            .saturating_add(widen(summary.graphs_unloaded));
    }
}

fn widen(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Run the demo against a world stored under `config.storage.root`.
pub fn run(config: &GraphConfig, demo: &DemoConfig) -> Result<DemoReport, EngineError> {
    demo.validate()?;
    let terrain = Terrain::default();
    let mut world = GraphWorld::open(universe(&terrain), config)?;
    let mut rng = StdRng::seed_from_u64(demo.seed);
    let mut report = DemoReport::default();

    // The host keeps the edit area loaded; regions around it may age out.
    let regions = area_regions(demo.extent);
    for &region in &regions {
        world.on_region_load(region);
    }
    info!(regions = regions.len(), extent = demo.extent, "Edit area loaded");

    let halfway = demo.ticks / 2;
    for cycle in 0..demo.ticks {
        for _ in 0..demo.edits_per_tick {
            edit(&mut world, &terrain, &mut rng, demo, &mut report);
        }
        if cycle == halfway {
            report.bridges = lay_bridges(&mut world, &terrain, &mut rng, demo.bridges);
            info!(bridges = report.bridges, "Bridges laid");
        }

        let summary = world.tick();
        report.absorb(&summary);

        if demo.tick_interval_ms > 0 {
            std::thread::sleep(Duration::from_millis(demo.tick_interval_ms));
        }
    }

    for &region in &regions {
        world.on_region_unload(region);
    }
    report.cables = terrain.borrow().len();
    report.graphs = world.loaded_graph_count();
    world.close();
    Ok(report)
}

/// Place a cable in an empty cell or remove the one in an occupied cell.
fn edit(
    world: &mut GraphWorld<Cable>,
    terrain: &Terrain,
    rng: &mut impl Rng,
    demo: &DemoConfig,
    report: &mut DemoReport,
) {
    let pos = BlockPos::new(
        rng.random_range(0..demo.extent),
        0,
        rng.random_range(0..demo.extent),
    );
    let occupied = terrain.borrow().contains_key(&pos);
    if occupied {
        terrain.borrow_mut().remove(&pos);
        report.removed = report.removed.saturating_add(1);
        debug!(%pos, "Removed cable");
    } else {
        let colour = rng.random_range(0..demo.colours);
        terrain.borrow_mut().insert(pos, Cable { colour });
        report.placed = report.placed.saturating_add(1);
        debug!(%pos, colour, "Placed cable");
    }

    world.request_node_rescan(pos);
    for neighbour in pos.neighbours() {
        world.request_connection_rescan(neighbour);
    }
}

/// Try to bridge `count` random pairs of same-coloured cables. Returns how
/// many bridges were laid.
fn lay_bridges(
    world: &mut GraphWorld<Cable>,
    terrain: &Terrain,
    rng: &mut impl Rng,
    count: u32,
) -> u32 {
    let cables: Vec<NodePos<Cable>> = terrain
        .borrow()
        .iter()
        .map(|(pos, cable)| NodePos::new(*pos, cable.clone()))
        .collect();
    if cables.len() < 2 {
        return 0;
    }

    let mut laid: u32 = 0;
    for _ in 0..count {
        let (Some(a), Some(b)) = (
            cables.get(rng.random_range(0..cables.len())),
            cables.get(rng.random_range(0..cables.len())),
        ) else {
            continue;
        };
        if a == b || a.node.colour != b.node.colour {
            continue;
        }
        if world.connect_nodes(a, b, CableKey::Bridge).is_some() {
            laid = laid.saturating_add(1);
            debug!(a = %a, b = %b, "Laid bridge");
        }
    }
    laid
}

/// Regions covering the cells `0..extent` on x and z at y = 0.
fn area_regions(extent: i32) -> Vec<RegionPos> {
    let far = BlockPos::new(extent.saturating_sub(1), 0, extent.saturating_sub(1)).region();
    let mut regions = Vec::new();
    for x in 0..=far.x {
        for z in 0..=far.z {
            regions.push(RegionPos::new(x, 0, z));
        }
    }
    regions
}
