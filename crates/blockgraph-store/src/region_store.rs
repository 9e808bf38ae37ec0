//! Region-keyed persistent cache.
//!
//! A [`RegionStore`] holds one payload per resident region, loads missing
//! regions from `<dir>/<x>.<y>.<z>.json` on first access, and tracks which
//! resident regions have unsaved changes. A missing file is an empty
//! region; an unreadable one is logged and treated as empty. Regions whose
//! payload is empty are saved by deleting their file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use blockgraph_types::{RegionPos, SaveMode};
use indexmap::IndexSet;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::files;

/// A payload stored once per region.
pub trait RegionData: Default + Serialize + DeserializeOwned {
    /// Whether the payload holds nothing worth writing.
    fn is_empty(&self) -> bool;
}

/// Cache of region payloads backed by one file per region.
#[derive(Debug)]
pub struct RegionStore<T: RegionData> {
    dir: PathBuf,
    regions: BTreeMap<RegionPos, T>,
    dirty: IndexSet<RegionPos>,
}

impl<T: RegionData> RegionStore<T> {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CreateDir`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        files::ensure_dir(&dir)?;
        Ok(Self {
            dir,
            regions: BTreeMap::new(),
            dirty: IndexSet::new(),
        })
    }

    /// The directory region files live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a region is stored in.
    pub fn path(&self, region: RegionPos) -> PathBuf {
        self.dir
            .join(format!("{}.{}.{}.json", region.x, region.y, region.z))
    }

    /// Whether the region is resident.
    pub fn is_loaded(&self, region: RegionPos) -> bool {
        self.regions.contains_key(&region)
    }

    /// Whether the region has unsaved changes.
    pub fn is_dirty(&self, region: RegionPos) -> bool {
        self.dirty.contains(&region)
    }

    /// Number of regions with unsaved changes.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Number of resident regions.
    pub fn loaded_count(&self) -> usize {
        self.regions.len()
    }

    /// Iterate over resident regions.
    pub fn loaded_regions(&self) -> impl Iterator<Item = RegionPos> + '_ {
        self.regions.keys().copied()
    }

    /// The region's payload if resident, without loading.
    pub fn peek(&self, region: RegionPos) -> Option<&T> {
        self.regions.get(&region)
    }

    /// The region's payload, loading it if needed.
    pub fn get(&mut self, region: RegionPos) -> &T {
        self.load(region)
    }

    /// The region's payload for modification, loading it if needed. The
    /// region is marked dirty.
    pub fn get_mut(&mut self, region: RegionPos) -> &mut T {
        self.dirty.insert(region);
        self.load(region)
    }

    /// Mark a resident region as having unsaved changes.
    pub fn mark_dirty(&mut self, region: RegionPos) {
        if self.regions.contains_key(&region) {
            self.dirty.insert(region);
        }
    }

    fn load(&mut self, region: RegionPos) -> &mut T {
        if !self.regions.contains_key(&region) {
            let data = self.read(region);
            self.regions.insert(region, data);
        }
        self.regions.entry(region).or_default()
    }

    fn read(&self, region: RegionPos) -> T {
        let path = self.path(region);
        let text = match files::read_optional(&path) {
            Ok(Some(text)) => text,
            Ok(None) => return T::default(),
            Err(err) => {
                error!(%region, %err, "Failed to read region file, treating region as empty");
                return T::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(data) => {
                debug!(%region, "Loaded region");
                data
            }
            Err(err) => {
                warn!(%region, path = %path.display(), %err, "Corrupt region file, treating region as empty");
                T::default()
            }
        }
    }

    /// Write a resident region if it is dirty. Returns whether a write (or
    /// delete of an empty region's file) happened.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the write fails; the region stays dirty.
    pub fn save(&mut self, region: RegionPos) -> Result<bool, StoreError> {
        if !self.dirty.contains(&region) {
            return Ok(false);
        }
        let Some(data) = self.regions.get(&region) else {
            self.dirty.shift_remove(&region);
            return Ok(false);
        };
        let path = self.path(region);
        if data.is_empty() {
            files::remove_if_exists(&path)?;
        } else {
            let bytes = serde_json::to_vec(data)?;
            files::write_atomic(&path, &bytes)?;
        }
        self.dirty.shift_remove(&region);
        Ok(true)
    }

    /// Save the region and drop it from memory.
    ///
    /// Returns `false` if the region was not resident.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the final save fails; the region stays
    /// resident and dirty.
    pub fn unload(&mut self, region: RegionPos) -> Result<bool, StoreError> {
        if !self.regions.contains_key(&region) {
            return Ok(false);
        }
        self.save(region)?;
        self.regions.remove(&region);
        debug!(%region, "Unloaded region");
        Ok(true)
    }

    /// Write part of the dirty set as dictated by the save mode. Returns how
    /// many regions were written.
    ///
    /// Failures are logged and the region is retried on a later pass.
    pub fn tick(&mut self, mode: SaveMode, factor: usize) -> usize {
        let budget = mode.writes_this_tick(self.dirty.len(), factor);
        let batch: Vec<RegionPos> = self.dirty.iter().take(budget).copied().collect();
        self.save_batch(batch)
    }

    /// Write every dirty region. Returns how many were written.
    pub fn save_all(&mut self) -> usize {
        let batch: Vec<RegionPos> = self.dirty.iter().copied().collect();
        self.save_batch(batch)
    }

    fn save_batch(&mut self, batch: Vec<RegionPos>) -> usize {
        let mut saved: usize = 0;
        for region in batch {
            match self.save(region) {
                Ok(true) => saved = saved.saturating_add(1),
                Ok(false) => {}
                Err(err) => {
                    error!(%region, %err, "Failed to save region");
                    // Move to the back so one bad file cannot starve the rest.
                    if self.dirty.shift_remove(&region) {
                        self.dirty.insert(region);
                    }
                }
            }
        }
        saved
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    struct Tags(BTreeSet<u32>);

    impl RegionData for Tags {
        fn is_empty(&self) -> bool {
            self.0.is_empty()
        }
    }

    const R: RegionPos = RegionPos::new(1, -2, 3);

    #[test]
    fn missing_region_is_empty_and_clean() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RegionStore::<Tags>::new(dir.path()).unwrap();
        assert!(store.get(R).is_empty());
        assert!(store.is_loaded(R));
        assert!(!store.is_dirty(R));
        assert!(!store.save(R).unwrap());
    }

    #[test]
    fn save_unload_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RegionStore::<Tags>::new(dir.path()).unwrap();
        store.get_mut(R).0.insert(7);
        assert!(store.unload(R).unwrap());
        assert!(!store.is_loaded(R));
        assert!(store.path(R).ends_with("1.-2.3.json"));
        assert!(store.path(R).exists());
        assert_eq!(store.get(R).0, BTreeSet::from([7]));
    }

    #[test]
    fn emptied_region_deletes_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RegionStore::<Tags>::new(dir.path()).unwrap();
        store.get_mut(R).0.insert(1);
        store.save(R).unwrap();
        assert!(store.path(R).exists());
        store.get_mut(R).0.clear();
        store.save(R).unwrap();
        assert!(!store.path(R).exists());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RegionStore::<Tags>::new(dir.path()).unwrap();
        std::fs::write(store.path(R), "not json").unwrap();
        assert!(store.get(R).is_empty());
    }

    #[test]
    fn incremental_tick_drains_a_fraction() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RegionStore::<Tags>::new(dir.path()).unwrap();
        for x in 0..20 {
            store.get_mut(RegionPos::new(x, 0, 0)).0.insert(1);
        }
        assert_eq!(store.tick(SaveMode::Incremental, 10), 2);
        assert_eq!(store.dirty_count(), 18);
        assert_eq!(store.tick(SaveMode::Unloaded, 10), 0);
        assert_eq!(store.tick(SaveMode::Immediate, 10), 18);
        assert_eq!(store.dirty_count(), 0);
    }

    #[test]
    fn failed_save_keeps_region_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RegionStore::<Tags>::new(dir.path()).unwrap();
        store.get_mut(R).0.insert(3);
        // A directory squatting on the target path makes the rename fail.
        std::fs::create_dir(store.path(R)).unwrap();
        std::fs::write(store.path(R).join("blocker"), "x").unwrap();
        assert_eq!(store.save_all(), 0);
        assert!(store.is_dirty(R));
        assert!(store.unload(R).is_err());
        assert!(store.is_loaded(R));
    }
}
