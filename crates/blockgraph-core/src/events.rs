//! Graph lifecycle notifications.
//!
//! A [`GraphListener`] registered with
//! [`GraphWorld::add_listener`](crate::GraphWorld::add_listener) is told
//! when graphs are created, changed, destroyed, or about to be evicted.
//! Notifications fire synchronously on the tick thread after the partition
//! is consistent again, never halfway through a merge or split.

use blockgraph_types::GraphId;
use blockgraph_world::{BlockGraph, BlockNode};

/// Receives graph lifecycle notifications. Every method defaults to a no-op.
pub trait GraphListener<N: BlockNode> {
    /// A new graph now exists, either for a new node or split off another.
    fn graph_created(&mut self, _graph: &BlockGraph<N>) {}

    /// A graph's nodes or links changed.
    fn graph_updated(&mut self, _graph: &BlockGraph<N>) {}

    /// A graph was destroyed: it became empty, was absorbed by a merge, or
    /// was removed administratively.
    fn graph_destroyed(&mut self, _id: GraphId) {}

    /// A graph is about to be written and dropped from memory.
    fn graph_unloading(&mut self, _graph: &BlockGraph<N>) {}
}

/// A listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpListener;

impl<N: BlockNode> GraphListener<N> for NoOpListener {}
