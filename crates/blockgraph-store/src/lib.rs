//! Durable storage and residency tracking for blockgraph.
//!
//! Nothing in this crate knows what a graph is. It stores region payloads
//! and graph records as JSON files under a storage root and decides when a
//! region has been idle long enough to evict.
//!
//! # Modules
//!
//! - [`error`] -- [`StoreError`], with the failing path attached.
//! - [`graph_files`] -- [`GraphFiles`], one record file per graph id.
//! - [`region_store`] -- [`RegionStore`], the region-keyed cache with dirty
//!   tracking and save-mode driven write-back.
//! - [`state`] -- [`StateFile`], the last assigned graph id.
//! - [`timer`] -- [`RegionUnloadTimer`], per-region idle ages.

pub mod error;
mod files;
pub mod graph_files;
pub mod region_store;
pub mod state;
pub mod timer;

// Re-export primary types at crate root.
pub use error::StoreError;
pub use graph_files::GraphFiles;
pub use region_store::{RegionData, RegionStore};
pub use state::{STATE_FILE_NAME, StateFile};
pub use timer::{DEFAULT_MAX_IDLE_TICKS, RegionUnloadTimer};
