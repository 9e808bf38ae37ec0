//! Store-wide state record.

use std::path::{Path, PathBuf};

use blockgraph_types::StateRecord;
use tracing::warn;

use crate::error::StoreError;
use crate::files;

/// File name of the state record inside the storage root.
pub const STATE_FILE_NAME: &str = "state.json";

/// The small record holding the last assigned graph id.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// The state file inside `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(STATE_FILE_NAME),
        }
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state. A missing or unreadable file yields fresh state.
    pub fn load(&self) -> StateRecord {
        match files::read_optional(&self.path) {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(path = %self.path.display(), %err, "Corrupt state file, starting fresh");
                StateRecord::default()
            }),
            Ok(None) => StateRecord::default(),
            Err(err) => {
                warn!(%err, "Failed to read state file, starting fresh");
                StateRecord::default()
            }
        }
    }

    /// Write the state.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if serialization or the write fails.
    pub fn save(&self, state: &StateRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(state)?;
        files::write_atomic(&self.path, &bytes)
    }
}
