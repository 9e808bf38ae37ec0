//! Shared type definitions for the blockgraph workspace.
//!
//! Every crate in the workspace speaks in these types: lattice positions,
//! graph ids, node and link identities, and the shapes of persisted records.
//!
//! # Modules
//!
//! - [`pos`] -- Cell positions, faces, and region coordinates
//! - [`ids`] -- Monotonic graph identifiers
//! - [`link`] -- Node, link, and half-link identities; rescan targets
//! - [`enums`] -- Save modes
//! - [`records`] -- On-disk record layouts

pub mod enums;
pub mod ids;
pub mod link;
pub mod pos;
pub mod records;

// Re-export all public types at crate root for convenience.
pub use enums::SaveMode;
pub use ids::GraphId;
pub use link::{HalfLink, LinkPos, NodePos, UpdatePos};
pub use pos::{Axis, BlockPos, Direction, REGION_SHIFT, REGION_SIZE, RegionPos, SidedPos};
pub use records::{GraphRecord, LinkRecord, NodeRecord, StateRecord};
