//! Demo host binary for the blockgraph partition engine.
//!
//! Stands in for a host world: it owns a synthetic cable terrain, reports
//! region loads and terrain edits to a [`GraphWorld`], and drives the tick
//! loop. Useful for watching merges, splits, and persistence in the logs.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `blockgraph-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load the `demo` section
//! 4. Run the scripted cycle against a fresh terrain
//! 5. Close the world and log the totals
//!
//! [`GraphWorld`]: blockgraph_core::GraphWorld

mod cable;
mod demo;
mod error;

use std::path::Path;

use blockgraph_core::{CONFIG_FILE_NAME, GraphConfig, LoggingConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::demo::DemoConfig;
use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the world's storage
/// cannot be opened.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = Path::new(CONFIG_FILE_NAME);
    let (config, from_file) = load_config(config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("blockgraph-engine starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        root = %config.storage.root.display(),
        save_mode = ?config.storage.save_mode,
        incremental_save_factor = config.storage.incremental_save_factor,
        max_idle_ticks = config.unload.max_idle_ticks,
        "Configuration loaded"
    );

    // 3. Load the demo section.
    let demo_config = DemoConfig::load(config_path)?;
    info!(
        seed = demo_config.seed,
        extent = demo_config.extent,
        ticks = demo_config.ticks,
        edits_per_tick = demo_config.edits_per_tick,
        colours = demo_config.colours,
        "Demo configuration loaded"
    );

    // 4-5. Run and report.
    let report = demo::run(&config, &demo_config)?;
    info!(
        ticks = report.ticks,
        placed = report.placed,
        removed = report.removed,
        bridges = report.bridges,
        cables = report.cables,
        graphs = report.graphs,
        graphs_saved = report.graphs_saved,
        regions_saved = report.regions_saved,
        graphs_unloaded = report.graphs_unloaded,
        "Demo finished"
    );

    Ok(())
}

/// Load graph configuration, falling back to defaults when the file is
/// absent. The flag says whether the file was read.
fn load_config(path: &Path) -> Result<(GraphConfig, bool), EngineError> {
    if path.exists() {
        Ok((GraphConfig::from_file(path)?, true))
    } else {
        Ok((GraphConfig::default(), false))
    }
}

/// Install the global subscriber: `RUST_LOG` wins, then the configured
/// level, then `info`.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
