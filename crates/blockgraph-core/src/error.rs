//! Error types for the `blockgraph-core` crate.

use blockgraph_store::StoreError;
use blockgraph_world::WorldError;

use crate::config::ConfigError;

/// Errors surfaced by [`GraphWorld`](crate::GraphWorld) operations.
///
/// Recoverable anomalies during maintenance are logged, not returned; only
/// setup failures and direct misuse of the mutation API reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The storage layer failed during setup.
    #[error("storage error: {source}")]
    Store {
        /// The underlying storage error.
        #[from]
        source: StoreError,
    },

    /// The configuration is invalid.
    #[error("config error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// A graph structure operation failed.
    #[error("graph error: {source}")]
    World {
        /// The underlying graph error.
        #[from]
        source: WorldError,
    },

    /// The node to add already exists.
    #[error("node already exists: {0}")]
    NodeExists(String),

    /// Every graph id has been handed out.
    #[error("graph id space exhausted")]
    GraphIdsExhausted,
}
