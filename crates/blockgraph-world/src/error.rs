//! Error types for the `blockgraph-world` crate.
//!
//! All fallible graph-structure operations return [`WorldError`]. Node and
//! link identities are rendered to strings in the error so the error type
//! does not need to be generic over the node payload.

/// Errors that can occur while mutating a single graph.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A node named by an operation is not a member of the graph.
    #[error("node not found in graph: {0}")]
    NodeNotFound(String),

    /// A node with the same position and payload is already a member.
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    /// A link with the same endpoints and key already exists.
    #[error("link already exists: {0}")]
    LinkExists(String),

    /// A link was requested from a node to itself.
    #[error("cannot link a node to itself: {0}")]
    SelfLink(String),

    /// A graph has more members than its record format can index.
    #[error("graph too large to encode ({count} nodes)")]
    TooLarge {
        /// Number of nodes in the graph.
        count: usize,
    },

    /// A payload, key, or entity could not be encoded.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// Which kind of value failed.
        what: &'static str,
        /// The underlying serializer error.
        source: serde_json::Error,
    },
}
