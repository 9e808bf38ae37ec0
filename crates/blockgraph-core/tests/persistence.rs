//! Integration tests for lazy loading, eviction, and on-disk recovery.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

mod common;

use std::rc::Rc;

use blockgraph_core::{GraphConfig, GraphWorld};
use blockgraph_store::GraphFiles;
use blockgraph_types::{GraphId, RegionPos, SaveMode};
use common::{Cable, CableKey, Event, Harness, Recorder, cable, p, universe};

fn graph_files(h: &Harness) -> GraphFiles {
    GraphFiles::new(h.world.root().join("graphs")).unwrap()
}

#[test]
fn graphs_survive_a_restart() {
    let mut h = Harness::new();
    for x in 0..3 {
        h.place(p(x, 0, 0), 1);
    }
    h.place(p(10, 0, 0), 2);
    h.world.tick();
    let a = cable(p(0, 0, 0), 1);
    let far = cable(p(10, 0, 0), 2);
    let bridge = h.world.connect_nodes(&a, &far, CableKey::Bridge).unwrap();
    *h.world.link_entity_mut(&bridge).unwrap() = 7;
    let id = h.graph_of(&a);
    let highest = h.world.all_graph_ids().into_iter().max().unwrap();

    h.reopen();
    assert_eq!(h.world.loaded_graph_count(), 0);

    assert_eq!(h.graph_of(&a), id);
    assert_eq!(h.graph_of(&far), id);
    assert_eq!(h.world.connections_of(&a).len(), 2);
    assert_eq!(h.world.link_entity(&bridge), Some(&7));
    assert_eq!(h.world.node_entity(&a), Some(&1));
    assert_eq!(h.world.graph(id).map(|g| g.size()), Some(4));

    // Ids keep increasing across the restart.
    h.place(p(0, 8, 0), 5);
    h.world.tick();
    assert!(h.graph_of(&cable(p(0, 8, 0), 5)) > highest);
}

#[test]
fn graph_spanning_regions_loads_from_either_side() {
    let mut h = Harness::new();
    h.place(p(15, 0, 0), 1);
    h.place(p(16, 0, 0), 1);
    h.world.tick();
    let east = cable(p(16, 0, 0), 1);
    let id = h.graph_of(&east);
    assert_eq!(
        h.world.graph(id).map(|g| g.regions().count()),
        Some(2)
    );

    h.reopen();
    assert_eq!(h.graph_of(&east), id);
    assert_eq!(h.world.connections_of(&east).len(), 1);
    assert_eq!(h.world.graph_ids_in_region(RegionPos::new(0, 0, 0)).len(), 1);
}

#[test]
fn idle_regions_evict_their_graphs() {
    let mut h = Harness::with_config(|c| c.unload.max_idle_ticks = 2);
    let recorder = Recorder::default();
    h.world.add_listener(recorder.clone());
    h.place(p(0, 0, 0), 1);
    h.place(p(1, 0, 0), 1);
    h.world.tick();
    let a = cable(p(0, 0, 0), 1);
    let id = h.graph_of(&a);
    recorder.take();

    let mut evicted_on = None;
    for _ in 0..10 {
        let summary = h.world.tick();
        if summary.graphs_unloaded > 0 {
            assert_eq!(summary.graphs_unloaded, 1);
            assert!(summary.regions_unloaded >= 1);
            evicted_on = Some(summary.tick);
            break;
        }
    }
    assert!(evicted_on.is_some());
    assert_eq!(h.world.loaded_graph_count(), 0);
    assert_eq!(recorder.take(), vec![Event::Unloading(id)]);
    assert!(graph_files(&h).exists(id));

    // Lookups bring it back.
    assert_eq!(h.graph_of(&a), id);
    assert_eq!(h.world.loaded_graph_count(), 1);
    assert_eq!(h.world.connections_of(&a).len(), 1);
}

#[test]
fn pinned_regions_never_evict() {
    let mut h = Harness::with_config(|c| c.unload.max_idle_ticks = 2);
    let region = RegionPos::new(0, 0, 0);
    h.world.on_region_load(region);
    h.place(p(3, 3, 3), 1);
    for _ in 0..10 {
        h.world.tick();
    }
    assert_eq!(h.world.loaded_graph_count(), 1);

    h.world.on_region_unload(region);
    for _ in 0..10 {
        h.world.tick();
    }
    assert_eq!(h.world.loaded_graph_count(), 0);
}

#[test]
fn graph_straddling_a_pinned_region_outlives_its_idle_half() {
    let mut h = Harness::with_config(|c| c.unload.max_idle_ticks = 2);
    let pinned = RegionPos::new(0, 0, 0);
    let idle = RegionPos::new(1, 0, 0);
    h.world.on_region_load(pinned);
    for x in 14..18 {
        h.place(p(x, 0, 0), 1);
    }
    h.world.tick();
    let west = cable(p(14, 0, 0), 1);
    let east = cable(p(17, 0, 0), 1);
    let id = h.graph_of(&west);
    assert_eq!(h.graph_of(&east), id);

    for _ in 0..10 {
        h.world.tick();
    }
    assert!(h.world.is_region_resident(pinned));
    assert!(!h.world.is_region_resident(idle));
    assert_eq!(h.world.loaded_graph_count(), 1);
    assert_eq!(h.world.graph(id).map(|g| g.regions().count()), Some(2));

    h.world.on_region_unload(pinned);
    for _ in 0..10 {
        h.world.tick();
    }
    assert_eq!(h.world.loaded_graph_count(), 0);
    assert!(!h.world.is_region_resident(pinned));
    assert!(graph_files(&h).exists(id));

    assert_eq!(h.graph_of(&east), id);
    let graph = h.world.graph(id).unwrap();
    assert_eq!(graph.size(), 4);
    assert_eq!(graph.link_count(), 3);
}

#[test]
fn empty_graph_sweep_keeps_and_heals_readable_records() {
    let mut h = Harness::new();
    for x in 0..3 {
        h.place(p(x, 0, 0), 1);
    }
    h.world.tick();
    let a = cable(p(0, 0, 0), 1);
    let c = cable(p(2, 0, 0), 1);
    let id = h.graph_of(&a);
    h.reopen();

    let path = graph_files(&h).path(id);
    let mut record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    record["nodes"][1]["node"] = serde_json::json!("bogus");
    std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

    assert_eq!(h.world.remove_empty_graphs(), 0);
    assert_eq!(h.world.loaded_graph_count(), 2);
    assert_eq!(h.world.pending_updates().unsaved_graphs, 2);

    h.world.save_all();
    let healed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(healed["nodes"].as_array().map(Vec::len), Some(1));
    assert_eq!(h.graph_of(&a), id);
    assert_ne!(h.graph_of(&c), id);
}

#[test]
fn region_load_brings_graphs_in() {
    let mut h = Harness::new();
    h.place(p(1, 1, 1), 1);
    h.world.tick();
    h.reopen();
    assert_eq!(h.world.loaded_graph_count(), 0);

    h.world.on_region_load(RegionPos::new(0, 0, 0));
    assert_eq!(h.world.loaded_graph_count(), 1);
}

#[test]
fn corrupt_record_is_deleted_and_its_nodes_forgotten() {
    let mut h = Harness::new();
    let a = cable(p(0, 0, 0), 1);
    h.place(a.pos, 1);
    h.world.tick();
    let id = h.graph_of(&a);
    h.reopen();

    let files = graph_files(&h);
    std::fs::write(files.path(id), "{ not json").unwrap();

    assert!(h.world.graph_for_node(&a).is_none());
    assert!(!files.exists(id));
    assert!(h.world.graph_ids_at(a.pos).is_empty());
}

#[test]
fn undecodable_node_drops_out_and_the_rest_resplits() {
    let mut h = Harness::new();
    for x in 0..3 {
        h.place(p(x, 0, 0), 1);
    }
    h.world.tick();
    let a = cable(p(0, 0, 0), 1);
    let b = cable(p(1, 0, 0), 1);
    let c = cable(p(2, 0, 0), 1);
    let id = h.graph_of(&a);
    h.reopen();

    let path = graph_files(&h).path(id);
    let mut record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    record["nodes"][1]["node"] = serde_json::json!("bogus");
    std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

    assert_eq!(h.graph_of(&a), id);
    assert_ne!(h.graph_of(&c), id);
    assert!(!h.world.node_exists(&b));
}

#[test]
fn remove_empty_graphs_clears_unreadable_records() {
    let mut h = Harness::new();
    h.place(p(0, 0, 0), 1);
    h.world.tick();
    h.world.save_all();

    let files = graph_files(&h);
    let junk = GraphId::new(500);
    std::fs::write(files.path(junk), "[]").unwrap();
    let empty = GraphId::new(501);
    std::fs::write(files.path(empty), r#"{"nodes":[],"links":[]}"#).unwrap();

    assert_eq!(h.world.remove_empty_graphs(), 2);
    assert!(!files.exists(junk));
    assert!(!files.exists(empty));
    assert_eq!(h.world.loaded_graph_count(), 1);
    assert_eq!(h.world.remove_empty_graphs(), 0);
}

#[test]
fn immediate_mode_writes_every_tick() {
    let mut h = Harness::with_config(|c| c.storage.save_mode = SaveMode::Immediate);
    let a = cable(p(0, 0, 0), 1);
    h.place(a.pos, 1);
    let summary = h.world.tick();
    let id = h.graph_of(&a);

    assert_eq!(summary.graphs_saved, 1);
    assert!(summary.regions_saved >= 1);
    assert!(graph_files(&h).exists(id));
    assert_eq!(h.world.pending_updates().unsaved_graphs, 0);
    assert!(h.world.root().join("state.json").is_file());
}

#[test]
fn unloaded_mode_defers_writes_until_save() {
    let mut h = Harness::new();
    let a = cable(p(0, 0, 0), 1);
    h.place(a.pos, 1);
    let summary = h.world.tick();
    let id = h.graph_of(&a);

    assert_eq!(summary.graphs_saved, 0);
    assert!(!graph_files(&h).exists(id));

    h.world.save_region(RegionPos::new(0, 0, 0));
    assert!(graph_files(&h).exists(id));
    assert_eq!(h.world.pending_updates().unsaved_graphs, 0);
}

#[test]
fn incremental_mode_drains_a_fraction_per_tick() {
    let mut h = Harness::with_config(|c| {
        c.storage.save_mode = SaveMode::Incremental;
        c.storage.incremental_save_factor = 4;
    });
    for x in 0..8 {
        h.place(p(x * 2, 0, 0), 1);
    }
    let summary = h.world.tick();
    assert_eq!(h.world.loaded_graph_count(), 8);
    assert_eq!(summary.graphs_saved, 2);
    assert_eq!(h.world.pending_updates().unsaved_graphs, 6);
}

#[test]
fn closed_world_ignores_ticks_and_loads() {
    let mut h = Harness::new();
    h.place(p(0, 0, 0), 1);
    h.world.tick();
    h.world.close();
    h.world.close();
    assert!(h.world.is_closed());

    h.place(p(1, 0, 0), 1);
    let summary = h.world.tick();
    assert_eq!(summary.tick, 1);
    assert_eq!(summary.node_rescans, 0);
}

#[test]
fn two_worlds_share_a_root_by_universe_name() {
    let h = Harness::new();
    let config = GraphConfig::with_root(h.dir.path());
    let other = GraphWorld::open(universe(&h.terrain), &config).unwrap();
    assert_eq!(other.root(), h.world.root());
    assert!(h.world.root().ends_with("cables"));
}

#[test]
fn worlds_can_share_one_universe() {
    let h = Harness::new();
    let shared = Rc::clone(h.world.universe());
    let dir = tempfile::tempdir().unwrap();
    let mut other = GraphWorld::open(shared, &GraphConfig::with_root(dir.path())).unwrap();
    assert_eq!(Rc::strong_count(h.world.universe()), 2);

    // Both worlds discover from the same terrain.
    h.terrain.borrow_mut().insert(p(5, 0, 5), vec![Cable { colour: 2 }]);
    other.request_node_rescan(p(5, 0, 5));
    other.tick();
    assert!(other.node_exists(&cable(p(5, 0, 5), 2)));
    assert_eq!(other.universe().name(), h.world.universe().name());
}
