//! Idle-age tracking for resident regions.
//!
//! Every region the store holds in memory is tracked here. A region the host
//! world reports as loaded is pinned and never ages. Any other region counts
//! ticks since it was last used and becomes eligible for unload once that
//! count exceeds the configured maximum.

use std::collections::BTreeMap;

use blockgraph_types::RegionPos;

/// Default idle threshold: one minute at 20 ticks per second.
pub const DEFAULT_MAX_IDLE_TICKS: u64 = 20 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RegionAge {
    world_loaded: bool,
    idle_ticks: u64,
}

/// Tracks which regions are resident and how long each has been idle.
#[derive(Debug, Clone)]
pub struct RegionUnloadTimer {
    max_idle_ticks: u64,
    regions: BTreeMap<RegionPos, RegionAge>,
}

impl Default for RegionUnloadTimer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE_TICKS)
    }
}

impl RegionUnloadTimer {
    /// Create a timer with the given idle threshold.
    pub const fn new(max_idle_ticks: u64) -> Self {
        Self {
            max_idle_ticks,
            regions: BTreeMap::new(),
        }
    }

    /// The idle threshold in ticks.
    pub const fn max_idle_ticks(&self) -> u64 {
        self.max_idle_ticks
    }

    /// The host world loaded the region: pin it.
    pub fn on_world_region_load(&mut self, region: RegionPos) {
        let age = self.regions.entry(region).or_default();
        age.world_loaded = true;
        age.idle_ticks = 0;
    }

    /// The host world unloaded the region: let it start ageing.
    pub fn on_world_region_unload(&mut self, region: RegionPos) {
        if let Some(age) = self.regions.get_mut(&region) {
            age.world_loaded = false;
            age.idle_ticks = 0;
        }
    }

    /// The region was used: start tracking it if needed and reset its age.
    pub fn on_region_use(&mut self, region: RegionPos) {
        self.regions.entry(region).or_default().idle_ticks = 0;
    }

    /// Age every unpinned region by one tick.
    pub fn tick(&mut self) {
        for age in self.regions.values_mut() {
            if !age.world_loaded {
                age.idle_ticks = age.idle_ticks.saturating_add(1);
            }
        }
    }

    /// Regions that are unpinned and have been idle longer than the
    /// threshold.
    pub fn regions_to_unload(&self) -> Vec<RegionPos> {
        self.regions
            .iter()
            .filter(|(_, age)| !age.world_loaded && age.idle_ticks > self.max_idle_ticks)
            .map(|(region, _)| *region)
            .collect()
    }

    /// The store unloaded the region: stop tracking it.
    pub fn on_region_unload(&mut self, region: RegionPos) {
        self.regions.remove(&region);
    }

    /// Whether the region is tracked as resident.
    pub fn is_region_loaded(&self, region: RegionPos) -> bool {
        self.regions.contains_key(&region)
    }

    /// Whether the host world has the region pinned.
    pub fn is_world_loaded(&self, region: RegionPos) -> bool {
        self.regions.get(&region).is_some_and(|age| age.world_loaded)
    }

    /// Ticks since the region was last used, if tracked.
    pub fn idle_ticks(&self, region: RegionPos) -> Option<u64> {
        self.regions.get(&region).map(|age| age.idle_ticks)
    }

    /// Iterate over every tracked region.
    pub fn tracked_regions(&self) -> impl Iterator<Item = RegionPos> + '_ {
        self.regions.keys().copied()
    }
}
