//! Graph structures for the blockgraph partition engine.
//!
//! This crate holds the in-memory pieces that need no storage or tick loop:
//! one connected component, the per-region index of which components occupy
//! which cells, and the traits through which the domain layer tells the
//! engine what nodes exist and how they connect.
//!
//! # Modules
//!
//! - [`chunk`] -- [`GraphChunk`], the per-region cell to graph-id index.
//! - [`error`] -- Error types for graph mutation.
//! - [`graph`] -- [`BlockGraph`], a single component with merge, split,
//!   and record conversion.
//! - [`node`] -- [`BlockNode`], [`LinkKey`], [`NodeView`], and
//!   [`NodeDiscoverer`], the collaborator contracts.

pub mod chunk;
pub mod error;
pub mod graph;
pub mod node;

// Re-export primary types at crate root.
pub use chunk::GraphChunk;
pub use error::WorldError;
pub use graph::{BlockGraph, DecodedGraph, RemovedNode};
pub use node::{
    BlockNode, HalfLinkOf, LinkEntityOf, LinkKey, LinkOf, NodeDiscoverer, NodeView,
};
