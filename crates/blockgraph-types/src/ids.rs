//! Graph identifiers.
//!
//! Graph ids are assigned monotonically by a store and are never reused
//! while any in-memory or on-disk reference might still name them. The
//! store persists the last id it handed out, so ids keep increasing across
//! restarts.

use serde::{Deserialize, Serialize};

/// Identifier of one connected component within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub u64);

impl GraphId {
    /// The first id a fresh store hands out.
    pub const FIRST: Self = Self(0);

    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Return the raw id value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// Return the id following this one, or `None` if the id space is
    /// exhausted.
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }
}

impl core::fmt::Display for GraphId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl From<u64> for GraphId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<GraphId> for u64 {
    fn from(id: GraphId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(GraphId::new(0).to_string(), "0000000000000000");
        assert_eq!(GraphId::new(0xBEEF).to_string(), "000000000000BEEF");
    }

    #[test]
    fn checked_next_stops_at_max() {
        assert_eq!(GraphId::new(7).checked_next(), Some(GraphId::new(8)));
        assert_eq!(GraphId::new(u64::MAX).checked_next(), None);
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&GraphId::new(42)).ok();
        assert_eq!(json.as_deref(), Some("42"));
    }
}
