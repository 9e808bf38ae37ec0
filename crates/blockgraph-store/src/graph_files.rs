//! One record file per graph.
//!
//! Graph records live in `<dir>/<id>.json` where `<id>` is the graph id as
//! sixteen upper-case hex digits. Reading distinguishes "no such graph"
//! (`Ok(None)`) from "record exists but is unreadable" (`Err`) so the caller
//! can delete corrupt records.

use std::fs;
use std::path::{Path, PathBuf};

use blockgraph_types::{GraphId, GraphRecord};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::files;

const EXTENSION: &str = "json";

/// Directory of graph record files.
#[derive(Debug, Clone)]
pub struct GraphFiles {
    dir: PathBuf,
}

impl GraphFiles {
    /// Open the directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CreateDir`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        files::ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    /// The directory record files live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a graph is stored in.
    pub fn path(&self, id: GraphId) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }

    /// Whether a record exists for the id.
    pub fn exists(&self, id: GraphId) -> bool {
        self.path(id).is_file()
    }

    /// Read a graph record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read, or
    /// [`StoreError::Serialization`] if it is not a valid record.
    pub fn read(&self, id: GraphId) -> Result<Option<GraphRecord>, StoreError> {
        let Some(text) = files::read_optional(&self.path(id))? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Write a graph record, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if serialization or the write fails; any
    /// previous record is left intact.
    pub fn write(&self, id: GraphId, record: &GraphRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        files::write_atomic(&self.path(id), &bytes)?;
        debug!(graph_id = %id, nodes = record.nodes.len(), "Wrote graph record");
        Ok(())
    }

    /// Delete a graph record. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be removed.
    pub fn delete(&self, id: GraphId) -> Result<bool, StoreError> {
        files::remove_if_exists(&self.path(id))
    }

    /// Ids of every graph with a record on disk, ascending.
    ///
    /// Files whose names are not graph ids are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be listed.
    pub fn list_ids(&self) -> Result<Vec<GraphId>, StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            match parse_id(&path) {
                Some(id) => ids.push(id),
                None if path.extension().is_some_and(|e| e == "tmp") => {}
                None => warn!(path = %path.display(), "Skipping unrecognised file in graph directory"),
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

fn parse_id(path: &Path) -> Option<GraphId> {
    if path.extension()? != EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.len() != 16 {
        return None;
    }
    u64::from_str_radix(stem, 16).ok().map(GraphId::new)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use blockgraph_types::{BlockPos, NodeRecord};

    use super::*;

    fn record() -> GraphRecord {
        GraphRecord {
            nodes: vec![NodeRecord {
                pos: BlockPos::ORIGIN,
                node: serde_json::json!({ "color": 2 }),
                entity: None,
            }],
            links: Vec::new(),
        }
    }

    #[test]
    fn file_name_is_fixed_width_hex() {
        let dir = tempfile::tempdir().unwrap();
        let files = GraphFiles::new(dir.path().join("graphs")).unwrap();
        let path = files.path(GraphId::new(0x2A));
        assert!(path.ends_with("000000000000002A.json"));
    }

    #[test]
    fn write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let files = GraphFiles::new(dir.path()).unwrap();
        let id = GraphId::new(5);
        assert!(files.read(id).unwrap().is_none());
        files.write(id, &record()).unwrap();
        assert!(files.exists(id));
        assert_eq!(files.read(id).unwrap(), Some(record()));
        assert!(files.delete(id).unwrap());
        assert!(!files.delete(id).unwrap());
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = GraphFiles::new(dir.path()).unwrap();
        std::fs::write(files.path(GraphId::new(1)), "{ truncated").unwrap();
        assert!(matches!(
            files.read(GraphId::new(1)),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn list_ids_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = GraphFiles::new(dir.path()).unwrap();
        files.write(GraphId::new(9), &record()).unwrap();
        files.write(GraphId::new(3), &record()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        std::fs::write(dir.path().join("XYZ.json"), "{}").unwrap();
        assert_eq!(
            files.list_ids().unwrap(),
            vec![GraphId::new(3), GraphId::new(9)]
        );
    }
}
