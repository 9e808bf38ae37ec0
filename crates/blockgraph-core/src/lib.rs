//! Graph world orchestration for the blockgraph partition engine.
//!
//! This crate owns the [`GraphWorld`]: every loaded graph for one universe
//! in one host world, the region index, the pending-work queues, and the
//! tick cycle that drains them, evicts idle regions, and writes dirty data
//! back to disk.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `blockgraph-config.yaml` into
//!   strongly-typed structs.
//! - [`error`] -- [`CoreError`], surfaced by setup and direct mutation.
//! - [`events`] -- [`GraphListener`], graph lifecycle notifications.
//! - [`universe`] -- [`GraphUniverse`], the named set of node discoverers.
//! - [`updates`] -- [`UpdateQueue`], deduplicated pending-work queues.
//! - [`world`] -- [`GraphWorld`] itself: lookups, mutation, merge and
//!   split, and the tick cycle.

pub mod config;
pub mod error;
pub mod events;
pub mod universe;
pub mod updates;
pub mod world;

pub use config::{CONFIG_FILE_NAME, ConfigError, GraphConfig, LoggingConfig, StorageConfig, UnloadConfig};
pub use error::CoreError;
pub use events::{GraphListener, NoOpListener};
pub use universe::{GraphUniverse, GraphUniverseBuilder};
pub use updates::UpdateQueue;
pub use world::{GraphWorld, PendingUpdates, TickSummary};
