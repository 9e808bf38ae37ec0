//! Persisted record shapes.
//!
//! These are the logical on-disk layouts: one record per graph, one per
//! region (defined next to the region index), and one small store-wide
//! state record. Node payloads, link keys, and entities are carried as
//! opaque JSON values so that each one can be decoded on its own; a payload
//! that no longer decodes costs only that node, not the whole graph.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::GraphId;
use crate::pos::BlockPos;

/// A serialized graph: its nodes and the links between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Every member node.
    pub nodes: Vec<NodeRecord>,
    /// Every link, with endpoints given as indices into `nodes`.
    pub links: Vec<LinkRecord>,
}

/// One serialized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// The node's cell.
    pub pos: BlockPos,
    /// The encoded node payload.
    pub node: Value,
    /// The encoded node entity, if the node has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Value>,
}

/// One serialized link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Index of the first endpoint in [`GraphRecord::nodes`].
    pub first: u32,
    /// Index of the second endpoint in [`GraphRecord::nodes`].
    pub second: u32,
    /// The encoded link key.
    pub key: Value,
    /// The encoded link entity, if the link has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Value>,
}

/// Store-wide state that survives restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// The last graph id handed out, or `None` if no id was ever assigned.
    #[serde(default)]
    pub prev_graph_id: Option<GraphId>,
}
