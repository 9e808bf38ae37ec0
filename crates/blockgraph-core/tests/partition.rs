//! Integration tests for merge, split, and link maintenance.
//!
//! Nodes come and go through the discoverer exactly as a host would drive
//! them: change the terrain, queue a rescan, tick.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

mod common;

use std::collections::BTreeSet;

use blockgraph_core::CoreError;
use common::{Cable, CableKey, Event, Harness, Recorder, cable, p, take_callbacks};

#[test]
fn adjacent_cables_join_one_graph() {
    let mut h = Harness::new();
    h.place(p(0, 0, 0), 1);
    h.place(p(1, 0, 0), 1);
    let summary = h.world.tick();

    assert_eq!(summary.node_rescans, 2);
    assert_eq!(h.world.loaded_graph_count(), 1);
    let a = cable(p(0, 0, 0), 1);
    let b = cable(p(1, 0, 0), 1);
    assert_eq!(h.graph_of(&a), h.graph_of(&b));
    assert_eq!(h.world.connections_of(&a).len(), 1);
    assert_eq!(h.world.connections_of(&a)[0].other, b);
}

#[test]
fn different_colours_stay_apart() {
    let mut h = Harness::new();
    h.place(p(0, 0, 0), 1);
    h.place(p(1, 0, 0), 2);
    h.world.tick();

    assert_eq!(h.world.loaded_graph_count(), 2);
    assert!(h.world.connections_of(&cable(p(0, 0, 0), 1)).is_empty());
}

#[test]
fn removing_a_bridge_cell_splits_the_chain() {
    let mut h = Harness::new();
    for x in 0..3 {
        h.place(p(x, 0, 0), 1);
    }
    h.world.tick();
    assert_eq!(h.world.loaded_graph_count(), 1);

    h.clear(p(1, 0, 0));
    h.world.tick();

    let a = cable(p(0, 0, 0), 1);
    let c = cable(p(2, 0, 0), 1);
    assert_eq!(h.world.loaded_graph_count(), 2);
    assert_ne!(h.graph_of(&a), h.graph_of(&c));
    assert!(!h.world.node_exists(&cable(p(1, 0, 0), 1)));
}

#[test]
fn larger_component_keeps_the_id_on_split() {
    let mut h = Harness::new();
    for x in 0..5 {
        h.place(p(x, 0, 0), 1);
    }
    h.world.tick();
    let original = h.graph_of(&cable(p(4, 0, 0), 1));

    h.clear(p(1, 0, 0));
    h.world.tick();

    assert_eq!(h.graph_of(&cable(p(2, 0, 0), 1)), original);
    let split_off = h.graph_of(&cable(p(0, 0, 0), 1));
    assert_ne!(split_off, original);
    assert!(split_off > original);
}

#[test]
fn equal_split_keeps_the_id_on_the_smallest_node() {
    let mut h = Harness::new();
    for x in 0..3 {
        h.place(p(x, 0, 0), 1);
    }
    h.world.tick();
    let original = h.graph_of(&cable(p(0, 0, 0), 1));

    h.clear(p(1, 0, 0));
    h.world.tick();

    assert_eq!(h.graph_of(&cable(p(0, 0, 0), 1)), original);
    assert_ne!(h.graph_of(&cable(p(2, 0, 0), 1)), original);
}

#[test]
fn joining_two_graphs_keeps_the_larger_id() {
    let mut h = Harness::new();
    for x in 0..3 {
        h.place(p(x, 0, 0), 1);
    }
    h.place(p(4, 0, 0), 1);
    h.world.tick();
    let big = h.graph_of(&cable(p(0, 0, 0), 1));
    let small = h.graph_of(&cable(p(4, 0, 0), 1));
    assert_ne!(big, small);

    h.place(p(3, 0, 0), 1);
    h.world.tick();

    assert_eq!(h.world.loaded_graph_count(), 1);
    assert_eq!(h.graph_of(&cable(p(4, 0, 0), 1)), big);
    assert!(h.world.graph(small).is_none());
    assert_eq!(h.world.graph(big).map(|g| g.size()), Some(5));
}

#[test]
fn two_cables_in_one_cell_are_distinct_nodes() {
    let mut h = Harness::new();
    h.place(p(0, 0, 0), 1);
    h.place(p(0, 0, 0), 2);
    h.place(p(1, 0, 0), 2);
    h.world.tick();

    let nodes: BTreeSet<_> = h.world.nodes_at(p(0, 0, 0)).into_iter().collect();
    assert_eq!(
        nodes,
        BTreeSet::from([cable(p(0, 0, 0), 1), cable(p(0, 0, 0), 2)])
    );
    assert_eq!(
        h.graph_of(&cable(p(0, 0, 0), 2)),
        h.graph_of(&cable(p(1, 0, 0), 2))
    );
    assert_ne!(
        h.graph_of(&cable(p(0, 0, 0), 1)),
        h.graph_of(&cable(p(0, 0, 0), 2))
    );
    assert_eq!(h.world.graph_ids_at(p(0, 0, 0)).len(), 2);
}

#[test]
fn manual_link_survives_rescan_but_not_its_endpoint() {
    let mut h = Harness::new();
    h.place(p(0, 0, 0), 1);
    h.place(p(5, 0, 0), 2);
    h.world.tick();
    let a = cable(p(0, 0, 0), 1);
    let b = cable(p(5, 0, 0), 2);

    let link = h.world.connect_nodes(&a, &b, CableKey::Bridge).unwrap();
    assert_eq!(h.graph_of(&a), h.graph_of(&b));
    assert_eq!(h.world.link_entity(&link), Some(&0));

    h.world.request_connection_rescan(a.pos);
    h.world.request_connection_rescan(b.pos);
    h.world.tick();
    assert!(h.world.link_exists(&link));
    assert_eq!(h.graph_of(&a), h.graph_of(&b));

    h.clear(b.pos);
    h.world.tick();
    assert!(!h.world.node_exists(&b));
    assert!(h.world.connections_of(&a).is_empty());
    assert_eq!(h.world.loaded_graph_count(), 1);
}

#[test]
fn unwanted_automatic_link_is_removed_on_rescan() {
    let mut h = Harness::new();
    h.place(p(0, 0, 0), 1);
    h.place(p(5, 0, 0), 1);
    h.world.tick();
    let a = cable(p(0, 0, 0), 1);
    let c = cable(p(5, 0, 0), 1);

    // Neither end would ask for a contact link across a gap.
    let link = h.world.connect_nodes(&a, &c, CableKey::Contact).unwrap();
    assert_eq!(h.graph_of(&a), h.graph_of(&c));

    h.world.request_connection_rescan(a.pos);
    h.world.tick();

    assert!(!h.world.link_exists(&link));
    assert_ne!(h.graph_of(&a), h.graph_of(&c));
}

#[test]
fn connect_rejects_self_links_and_duplicates() {
    let mut h = Harness::new();
    h.place(p(0, 0, 0), 1);
    h.place(p(1, 0, 0), 1);
    h.world.tick();
    let a = cable(p(0, 0, 0), 1);
    let b = cable(p(1, 0, 0), 1);

    assert!(h.world.connect_nodes(&a, &a, CableKey::Bridge).is_none());
    assert!(h.world.connect_nodes(&a, &b, CableKey::Contact).is_none());
    assert!(h.world.connect_nodes(&a, &b, CableKey::Bridge).is_some());
    assert_eq!(h.world.connections_of(&a).len(), 2);
    assert!(
        h.world
            .connect_nodes(&a, &cable(p(9, 9, 9), 1), CableKey::Bridge)
            .is_none()
    );
}

#[test]
fn disconnect_always_runs_the_split_pass() {
    let mut h = Harness::new();
    let recorder = Recorder::default();
    h.world.add_listener(recorder.clone());
    h.place(p(0, 0, 0), 1);
    h.place(p(1, 0, 0), 1);
    h.world.tick();
    let a = cable(p(0, 0, 0), 1);
    let b = cable(p(1, 0, 0), 1);
    let id = h.graph_of(&a);
    recorder.take();

    // No bridge to remove: the graph stays whole but is still re-checked.
    assert!(!h.world.disconnect_nodes(&a, &b, &CableKey::Bridge));
    assert_eq!(recorder.take(), vec![Event::Updated(id, 2)]);
    assert_eq!(h.graph_of(&a), h.graph_of(&b));

    assert!(h.world.disconnect_nodes(&a, &b, &CableKey::Contact));
    assert_ne!(h.graph_of(&a), h.graph_of(&b));
    let events = recorder.take();
    assert_eq!(events.first(), Some(&Event::Updated(id, 1)));
    assert_eq!(events.len(), 2);

    // A connection rescan restores what the predicates want.
    h.world.request_connection_rescan(a.pos);
    h.world.tick();
    assert_eq!(h.graph_of(&a), h.graph_of(&b));
}

#[test]
fn add_and_remove_nodes_directly() {
    let mut h = Harness::new();
    let a = cable(p(0, 0, 0), 3);
    let b = cable(p(0, 1, 0), 3);

    let first = h.world.add_node(a.pos, a.node.clone()).unwrap();
    let second = h.world.add_node(b.pos, b.node.clone()).unwrap();
    assert_ne!(first, second);
    assert_eq!(h.graph_of(&a), second);
    assert_eq!(h.world.node_entity(&a), Some(&3));

    let err = h.world.add_node(a.pos, Cable { colour: 3 }).unwrap_err();
    assert!(matches!(err, CoreError::NodeExists(_)));

    assert!(h.world.remove_node(&a));
    assert!(!h.world.remove_node(&a));
    assert!(h.world.node_exists(&b));
    assert!(h.world.connections_of(&b).is_empty());
}

#[test]
fn node_entity_edits_are_kept() {
    let mut h = Harness::new();
    let a = cable(p(2, 0, 0), 4);
    h.world.add_node(a.pos, a.node.clone()).unwrap();

    *h.world.node_entity_mut(&a).unwrap() = 99;
    assert_eq!(h.world.node_entity(&a), Some(&99));
    assert!(h.world.pending_updates().unsaved_graphs >= 1);
}

#[test]
fn destroy_graph_removes_every_node() {
    let mut h = Harness::new();
    for x in 0..4 {
        h.place(p(x, 0, 0), 1);
    }
    h.world.tick();
    let id = h.graph_of(&cable(p(0, 0, 0), 1));

    assert!(h.world.destroy_graph(id));
    assert!(!h.world.destroy_graph(id));
    for x in 0..4 {
        assert!(!h.world.node_exists(&cable(p(x, 0, 0), 1)));
    }
    assert!(h.world.graph_ids_at(p(0, 0, 0)).is_empty());
    assert_eq!(h.world.loaded_graph_count(), 0);
}

#[test]
fn listeners_see_create_merge_and_destroy() {
    let mut h = Harness::new();
    let recorder = Recorder::default();
    h.world.add_listener(recorder.clone());
    let a = cable(p(0, 0, 0), 1);

    h.place(a.pos, 1);
    h.world.tick();
    let first = h.graph_of(&a);
    assert_eq!(
        recorder.take(),
        vec![Event::Created(first, 1), Event::Updated(first, 1)]
    );

    h.place(p(1, 0, 0), 1);
    h.world.tick();
    let second = h.graph_of(&a);
    assert_ne!(first, second);
    assert_eq!(
        recorder.take(),
        vec![
            Event::Created(second, 1),
            Event::Destroyed(first),
            Event::Updated(second, 2),
        ]
    );

    h.clear(p(1, 0, 0));
    h.world.tick();
    assert_eq!(recorder.take(), vec![Event::Updated(second, 1)]);

    h.clear(a.pos);
    h.world.tick();
    assert_eq!(recorder.take(), vec![Event::Destroyed(second)]);
}

#[test]
fn callbacks_reach_both_ends_including_removed_nodes() {
    let mut h = Harness::new();
    take_callbacks();
    let a = cable(p(0, 0, 0), 1);
    let b = cable(p(1, 0, 0), 1);

    h.place(a.pos, 1);
    let summary = h.world.tick();
    assert_eq!(summary.callbacks, 0);
    assert!(take_callbacks().is_empty());

    h.place(b.pos, 1);
    let summary = h.world.tick();
    assert_eq!(summary.callbacks, 2);
    let seen: BTreeSet<_> = take_callbacks().into_iter().collect();
    assert_eq!(seen, BTreeSet::from([a.clone(), b.clone()]));

    h.clear(b.pos);
    h.world.tick();
    let seen: BTreeSet<_> = take_callbacks().into_iter().collect();
    assert_eq!(seen, BTreeSet::from([a, b]));
}

#[test]
fn rescans_queued_twice_run_once() {
    let mut h = Harness::new();
    h.place(p(0, 0, 0), 1);
    h.world.request_node_rescan(p(0, 0, 0));
    h.world.request_node_rescans([p(0, 0, 0), p(3, 3, 3)]);
    assert_eq!(h.world.pending_updates().node_rescans, 2);

    let summary = h.world.tick();
    assert_eq!(summary.node_rescans, 2);
    assert_eq!(h.world.pending_updates().node_rescans, 0);
    assert_eq!(h.world.loaded_graph_count(), 1);
}
