//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

/// When dirty graphs and regions are written back to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Write only when data is unloaded, when its region is saved, or on a
    /// full flush.
    Unloaded,
    /// Write a bounded fraction of the dirty set every tick.
    #[default]
    Incremental,
    /// Write the whole dirty set every tick.
    Immediate,
}

impl SaveMode {
    /// Return how many of `dirty` pending writes to perform this tick.
    ///
    /// `factor` is the incremental divisor; the incremental count rounds up
    /// so a non-empty dirty set always makes progress.
    pub fn writes_this_tick(self, dirty: usize, factor: usize) -> usize {
        match self {
            Self::Unloaded => 0,
            Self::Immediate => dirty,
            Self::Incremental => dirty.div_ceil(factor.max(1)),
        }
    }
}
