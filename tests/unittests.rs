use std::time::{Duration, Instant};

use serde_json::{json, Map};
use uuid::Uuid;

use pathflow::flow::changes::{Connection, EdgeChange, NodeChange};
use pathflow::flow::snapshot::{Dimensions, Node, Position, Snapshot, Viewport};
use pathflow::history::oplog::{OperationKind, OperationLog};
use pathflow::history::session::FlowSession;
use pathflow::history::throttle::TriggerThrottle;
use pathflow::persistence::persist::{parse_flow_file, SlotStore};
use pathflow::persistence::settings::EngineSettings;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn node(id: &str) -> Node {
    Node::new(id.to_string(), "dataSchema".to_string(), Position { x: 0.0, y: 0.0 }, Map::new())
}

fn two_node_snapshot() -> Snapshot {
    Snapshot { nodes: vec![node("2"), node("3")], edges: Vec::new() }
}

fn link(source: &str, source_handle: &str, target: &str, target_handle: &str) -> Connection {
    Connection::new(
        source.to_string(),
        source_handle.to_string(),
        target.to_string(),
        target_handle.to_string(),
    )
}

fn move_to(session: &mut FlowSession, id: &str, x: f64, y: f64) {
    session.apply_node_changes(vec![NodeChange::Position {
        id: id.to_string(),
        position: Position { x, y },
        dragging: false,
    }]);
}

fn temp_store(tag: &str) -> SlotStore {
    let dir = std::env::temp_dir().join(format!("pathflow-test-{}-{}", tag, Uuid::now_v7()));
    SlotStore::new(dir)
}

#[test]
fn undo_walks_back_to_the_initial_snapshot() {
    let mut session = FlowSession::new(two_node_snapshot());
    let initial = session.snapshot().clone();

    move_to(&mut session, "2", 100.0, 50.0);
    session.connect(link("2", "Lime", "3", "Ammonia for Fuel"));
    move_to(&mut session, "3", 640.0, 80.0);
    assert_eq!(session.history_len(), 3);

    assert!(session.undo());
    assert!(session.undo());
    assert!(session.undo());
    assert!(!session.undo(), "history exhausted");
    assert_eq!(session.snapshot(), &initial);
    assert_eq!(session.pointer(), -1);
}

#[test]
fn redo_reproduces_the_pre_undo_state() {
    let mut session = FlowSession::new(two_node_snapshot());
    move_to(&mut session, "2", 10.0, 0.0);
    session.connect(link("2", "Lime", "3", "Ammonia for Fuel"));
    move_to(&mut session, "2", 25.0, 5.0);
    let head = session.snapshot().clone();

    assert!(session.undo());
    let mid = session.snapshot().clone();
    assert!(session.undo());

    assert!(session.redo());
    assert_eq!(session.snapshot(), &mid);
    assert!(session.redo());
    assert_eq!(session.snapshot(), &head);
    assert!(!session.redo(), "nothing left to redo");
}

#[test]
fn a_new_edit_after_undo_discards_the_redo_branch() {
    let mut session = FlowSession::new(two_node_snapshot());
    move_to(&mut session, "2", 10.0, 0.0);
    move_to(&mut session, "2", 20.0, 0.0);
    move_to(&mut session, "2", 30.0, 0.0);
    session.undo();
    session.undo();
    assert!(session.can_redo());

    move_to(&mut session, "3", 700.0, 0.0);
    assert!(!session.can_redo());
    assert_eq!(session.history_len(), 2);
    assert!(!session.redo());
    assert_eq!(session.snapshot().node("2").expect("node 2").position.x, 10.0);
    assert_eq!(session.snapshot().node("3").expect("node 3").position.x, 700.0);
}

#[test]
fn eviction_keeps_the_newest_window_and_still_undoes_cleanly() {
    let mut session = FlowSession::with_capacity(two_node_snapshot(), 80);
    for i in 0..80 {
        move_to(&mut session, "2", i as f64, 0.0);
    }
    assert_eq!(session.history_len(), 80);
    let before_overflow = session.snapshot().clone();

    // The 81st operation trips eviction down to the newest 64
    move_to(&mut session, "2", 500.0, 0.0);
    assert_eq!(session.history_len(), 64);
    assert_eq!(session.pointer(), 63);

    assert!(session.undo());
    assert_eq!(session.snapshot(), &before_overflow);
}

#[test]
fn drag_frames_are_applied_but_not_recorded() {
    let mut session = FlowSession::new(two_node_snapshot());
    for i in 1..=5 {
        session.apply_node_changes(vec![NodeChange::Position {
            id: "2".to_string(),
            position: Position { x: i as f64 * 10.0, y: 0.0 },
            dragging: true,
        }]);
    }
    assert_eq!(session.history_len(), 0);
    assert_eq!(session.snapshot().node("2").expect("node 2").position.x, 50.0);

    // The drop arrives with dragging cleared and becomes the one operation
    move_to(&mut session, "2", 60.0, 0.0);
    assert_eq!(session.history_len(), 1);
    assert!(session.undo());
    assert_eq!(session.snapshot().node("2").expect("node 2").position.x, 0.0);
}

#[test]
fn selection_changes_are_never_recorded() {
    let mut session = FlowSession::new(two_node_snapshot());
    let edge_id = session.connect(link("2", "Lime", "3", "Ammonia for Fuel"));
    assert_eq!(session.history_len(), 1);

    session.apply_node_changes(vec![NodeChange::Select { id: "2".to_string(), selected: true }]);
    session.apply_edge_changes(vec![EdgeChange::Select { id: edge_id.clone(), selected: true }]);
    assert_eq!(session.history_len(), 1);
    assert!(session.snapshot().node("2").expect("node 2").selected);
    assert!(session.snapshot().edge(&edge_id).expect("edge").selected);
}

#[test]
fn a_mixed_batch_records_as_one_operation() {
    let mut session = FlowSession::new(two_node_snapshot());
    session.apply_node_changes(vec![
        NodeChange::Select { id: "2".to_string(), selected: true },
        NodeChange::Position { id: "2".to_string(), position: Position { x: 44.0, y: 8.0 }, dragging: false },
        NodeChange::Select { id: "3".to_string(), selected: true },
    ]);
    assert_eq!(session.history_len(), 1);

    // Replay applies the whole batch, selection flips included
    assert!(session.undo());
    assert!(session.redo());
    let n2 = session.snapshot().node("2").expect("node 2");
    assert!(n2.selected);
    assert_eq!(n2.position.x, 44.0);
}

#[test]
fn throttle_drops_triggers_inside_the_interval() {
    let mut gate = TriggerThrottle::new(Duration::from_millis(100));
    let t0 = Instant::now();
    assert!(gate.try_trigger_at(t0));
    assert!(!gate.try_trigger_at(t0 + Duration::from_millis(30)));
    // A dropped trigger does not extend the window
    assert!(gate.try_trigger_at(t0 + Duration::from_millis(101)));

    let mut slow = TriggerThrottle::default();
    let t1 = Instant::now();
    assert!(slow.try_trigger_at(t1));
    assert!(slow.try_trigger_at(t1 + Duration::from_millis(150)));
}

#[test]
fn connection_ids_are_deterministic_with_spaces_dashed() {
    let c = link("A", "Gaseous Hydrogen", "B", "Ammonia for Fuel");
    assert_eq!(c.edge_id(), "eA-Gaseous-Hydrogen-B-Ammonia-for-Fuel");
    let again = link("A", "Gaseous Hydrogen", "B", "Ammonia for Fuel");
    assert_eq!(c.edge_id(), again.edge_id());
}

#[test]
fn connect_then_undo_redo_toggles_the_edge() {
    let mut session = FlowSession::new(two_node_snapshot());
    let id = session.connect(link("2", "Lime", "3", "Ammonia for Fuel"));
    assert_eq!(id, "e2-Lime-3-Ammonia-for-Fuel");
    assert_eq!(session.snapshot().edge_count(), 1);
    assert!(session.can_undo());

    assert!(session.undo());
    assert_eq!(session.snapshot().edge_count(), 0);
    assert!(!session.can_undo());
    assert!(session.can_redo());
    assert!(session.redo());
    assert_eq!(session.snapshot().edge_count(), 1);
    assert_eq!(session.snapshot().edges[0].id, id);
    assert_eq!(session.snapshot().edges[0].source_handle.as_deref(), Some("Lime"));
}

#[test]
fn reconnecting_the_same_handles_never_duplicates_the_edge() {
    let mut session = FlowSession::new(two_node_snapshot());
    let first = session.connect(link("2", "Lime", "3", "Ammonia for Fuel"));
    let second = session.connect(link("2", "Lime", "3", "Ammonia for Fuel"));
    assert_eq!(first, second);
    assert_eq!(session.snapshot().edge_count(), 1);

    // Both connects are on the log; replay stays idempotent
    assert_eq!(session.history_len(), 2);
    assert!(session.undo());
    assert_eq!(session.snapshot().edge_count(), 1);
    assert!(session.undo());
    assert_eq!(session.snapshot().edge_count(), 0);
}

#[test]
fn import_with_missing_edges_is_rejected_and_state_survives() {
    init_logs();
    let mut session = FlowSession::new(two_node_snapshot());
    move_to(&mut session, "2", 15.0, 0.0);

    assert!(session.import_json(r#"{ "nodes": [] }"#).is_err());
    // Nothing was applied and history is intact
    assert_eq!(session.snapshot().node_count(), 2);
    assert_eq!(session.history_len(), 1);
    assert!(session.can_undo());
}

#[test]
fn import_replaces_the_flow_and_starts_a_clean_history() {
    let mut session = FlowSession::new(two_node_snapshot());
    move_to(&mut session, "2", 15.0, 0.0);

    let doc = r#"{
        "nodes": [
            { "id": "9", "type": "dataSchema", "position": { "x": 5.0, "y": 6.0 }, "data": { "label": "Hydro" } }
        ],
        "edges": []
    }"#;
    session.import_json(doc).expect("import ok");

    assert_eq!(session.snapshot().node_count(), 1);
    assert_eq!(session.snapshot().node("9").expect("node 9").data["label"], "Hydro");
    assert_eq!(session.history_len(), 0);
    assert!(!session.can_undo());
    // Missing viewport falls back to origin at zoom 1
    assert_eq!(session.viewport().zoom, 1.0);
    // The imported state is the new baseline, nothing to undo onto
    assert!(!session.undo());
    assert_eq!(session.snapshot().node_count(), 1);
}

#[test]
fn flow_documents_require_node_and_edge_sequences() {
    assert!(parse_flow_file(r#"{ "edges": [] }"#).is_err());
    assert!(parse_flow_file(r#"{ "nodes": 5, "edges": [] }"#).is_err());
    assert!(parse_flow_file("not json").is_err());

    let full = r#"{
        "nodes": [{ "id": "a", "type": "dataSchema", "position": { "x": 0.0, "y": 0.0 } }],
        "edges": [{ "id": "eaa", "source": "a", "target": "a" }],
        "viewport": { "x": 12.0, "y": -3.0, "zoom": 2.0 }
    }"#;
    let flow = parse_flow_file(full).expect("valid document");
    assert_eq!(flow.viewport.zoom, 2.0);
    assert_eq!(flow.nodes.len(), 1);
    assert!(flow.edges[0].source_handle.is_none());
}

#[test]
fn save_moves_the_undo_baseline_to_the_saved_state() {
    let store = temp_store("save-baseline");
    let mut session = FlowSession::new(two_node_snapshot());
    move_to(&mut session, "2", 100.0, 0.0);
    session.save_to(&store, "scene").expect("save ok");
    let saved = session.snapshot().clone();
    assert_eq!(session.history_len(), 0);

    move_to(&mut session, "2", 200.0, 0.0);
    assert!(session.undo());
    // Undo lands on the saved state, not the session seed
    assert_eq!(session.snapshot(), &saved);
    assert!(!session.undo());

    std::fs::remove_dir_all(store.dir()).ok();
}

#[test]
fn slots_round_trip_flow_json_and_strip_runtime_fields() {
    let store = temp_store("slots");
    let mut session = FlowSession::new(two_node_snapshot());
    let edge_id = session.connect(link("2", "Lime", "3", "Ammonia for Fuel"));
    session.apply_node_changes(vec![NodeChange::Select { id: "2".to_string(), selected: true }]);
    session.apply_node_changes(vec![NodeChange::Dimensions {
        id: "2".to_string(),
        dimensions: Dimensions { width: 320.0, height: 180.0 },
    }]);
    session.set_viewport(Viewport { x: 40.0, y: -10.0, zoom: 1.5 });

    let path = session.save_to(&store, "scene").expect("save ok");
    let raw = std::fs::read_to_string(&path).expect("slot file readable");
    assert!(!raw.contains("selected"));
    assert!(!raw.contains("measured"));

    let mut restored = FlowSession::new(Snapshot::new());
    restored.restore_from(&store, "scene").expect("restore ok");
    assert_eq!(restored.snapshot().node_count(), 2);
    assert_eq!(
        restored.snapshot().edge(&edge_id).expect("edge").target_handle.as_deref(),
        Some("Ammonia for Fuel")
    );
    assert!(!restored.snapshot().node("2").expect("node 2").selected);
    assert_eq!(restored.viewport().zoom, 1.5);
    assert_eq!(store.list_slots().expect("list ok"), vec!["scene".to_string()]);

    std::fs::remove_dir_all(store.dir()).ok();
}

#[test]
fn checkpoints_are_timestamped_slots() {
    let store = temp_store("checkpoint");
    let session = FlowSession::new(two_node_snapshot());
    let path = store.save_checkpoint(&session.to_flow_file()).expect("checkpoint ok");
    let name = path.file_name().and_then(|s| s.to_str()).expect("file name");
    assert!(name.starts_with("flow_"));
    assert!(name.ends_with(".json"));
    assert_eq!(store.list_slots().expect("list ok").len(), 1);

    std::fs::remove_dir_all(store.dir()).ok();
}

#[test]
fn skip_next_record_swallows_exactly_one_batch() {
    let mut session = FlowSession::new(two_node_snapshot());
    session.skip_next_record();
    // An insignificant batch is never a record candidate, the flag waits
    session.apply_node_changes(vec![NodeChange::Select { id: "3".to_string(), selected: true }]);
    // The echoed measurement batch applies but is not recorded
    session.apply_node_changes(vec![NodeChange::Dimensions {
        id: "2".to_string(),
        dimensions: Dimensions { width: 200.0, height: 120.0 },
    }]);
    assert_eq!(session.history_len(), 0);
    assert!(session.snapshot().node("2").expect("node 2").measured.is_some());

    move_to(&mut session, "2", 5.0, 5.0);
    assert_eq!(session.history_len(), 1);
}

#[test]
fn removing_a_node_cascades_to_its_edges_and_both_are_undoable() {
    let mut session = FlowSession::new(two_node_snapshot());
    let edge_id = session.connect(link("2", "Lime", "3", "Ammonia for Fuel"));
    assert_eq!(session.snapshot().edge_ids_touching("2"), vec![edge_id.clone()]);

    session.remove_nodes(&["2".to_string()]);
    assert_eq!(session.snapshot().node_count(), 1);
    assert_eq!(session.snapshot().edge_count(), 0);
    assert!(session.snapshot().edge_ids_touching("2").is_empty());
    // connect, then the edge cascade, then the node removal
    assert_eq!(session.history_len(), 3);

    assert!(session.undo());
    assert_eq!(session.snapshot().node_count(), 2);
    assert_eq!(session.snapshot().edge_count(), 0);
    assert!(session.undo());
    assert_eq!(session.snapshot().edge_count(), 1);
    assert_eq!(session.snapshot().edge(&edge_id).expect("edge").source, "2");
}

#[test]
fn data_patches_merge_into_the_existing_payload() {
    let mut data = Map::new();
    data.insert("label".to_string(), json!("Ammonia"));
    data.insert("bgColor".to_string(), json!("#bfdbff"));
    let seed = Snapshot {
        nodes: vec![Node::new("2".to_string(), "dataSchema".to_string(), Position { x: 0.0, y: 0.0 }, data)],
        edges: Vec::new(),
    };
    let mut session = FlowSession::new(seed);

    let mut patch = Map::new();
    patch.insert("label".to_string(), json!("Ammonia (updated)"));
    patch.insert("isExpanded".to_string(), json!(false));
    session.apply_node_changes(vec![NodeChange::Data { id: "2".to_string(), patch }]);

    let node = session.snapshot().node("2").expect("node 2");
    assert_eq!(node.data["label"], "Ammonia (updated)");
    assert_eq!(node.data["bgColor"], "#bfdbff");
    assert_eq!(node.data["isExpanded"], false);
    assert_eq!(session.history_len(), 1);
}

#[test]
fn set_all_expanded_patches_every_node_in_one_operation() {
    let mut session = FlowSession::new(two_node_snapshot());
    session.set_all_expanded(true);
    assert_eq!(session.history_len(), 1);
    assert_eq!(session.snapshot().node("2").expect("node 2").data["isExpanded"], true);
    assert_eq!(session.snapshot().node("3").expect("node 3").data["isExpanded"], true);

    session.set_all_expanded(false);
    assert_eq!(session.history_len(), 2);
    assert!(session.undo());
    assert_eq!(session.snapshot().node("3").expect("node 3").data["isExpanded"], true);
}

#[test]
fn duplicating_nodes_offsets_the_copies_and_is_one_undoable_operation() {
    let mut session = FlowSession::new(two_node_snapshot());
    let new_ids = session.duplicate_nodes(&["2".to_string(), "ghost".to_string()]);
    assert_eq!(new_ids.len(), 1, "unknown ids are skipped");
    assert_eq!(session.snapshot().node_count(), 3);

    let copy = session.snapshot().node(&new_ids[0]).expect("copy");
    assert_eq!(copy.position.x, 40.0);
    assert_eq!(copy.position.y, 40.0);
    assert_eq!(copy.kind, "dataSchema");

    assert_eq!(session.history_len(), 1);
    assert!(session.undo());
    assert_eq!(session.snapshot().node_count(), 2);
}

#[test]
fn add_node_generates_fresh_ids_and_records() {
    let mut session = FlowSession::new(Snapshot::new());
    let a = session.add_node("dataSchema".to_string(), Position { x: 1.0, y: 2.0 }, Map::new());
    let b = session.add_node("dataSchema".to_string(), Position { x: 3.0, y: 4.0 }, Map::new());
    assert_ne!(a, b);
    assert_eq!(session.snapshot().node_count(), 2);
    assert_eq!(session.history_len(), 2);
    assert_eq!(session.snapshot().node(&a).expect("node a").position.y, 2.0);
}

#[test]
fn oplog_truncates_evicts_and_resets() {
    let mut log = OperationLog::new();
    for _ in 0..5 {
        assert!(log.record(OperationKind::EdgesChange(Vec::new())));
    }
    assert!(log.step_back());
    assert!(log.step_back());
    assert_eq!(log.pointer(), 2);

    // Recording from the middle truncates the undone tail
    assert!(log.record(OperationKind::EdgesChange(Vec::new())));
    assert_eq!(log.len(), 4);
    assert_eq!(log.pointer(), 3);

    let evicted = log.evict_if_oversized(3);
    assert_eq!(evicted.len(), 2);
    assert_eq!(log.len(), 2);
    assert_eq!(log.pointer(), 1);
    assert!(!log.can_redo());

    log.skip_next_record();
    assert!(!log.record(OperationKind::EdgesChange(Vec::new())));
    assert_eq!(log.len(), 2);

    log.reset();
    assert_eq!(log.len(), 0);
    assert_eq!(log.pointer(), -1);
    assert!(!log.can_undo());
}

#[test]
fn changes_for_unknown_ids_are_skipped_without_aborting() {
    init_logs();
    let mut session = FlowSession::new(two_node_snapshot());
    session.apply_node_changes(vec![
        NodeChange::Position { id: "ghost".to_string(), position: Position { x: 9.0, y: 9.0 }, dragging: false },
        NodeChange::Remove { id: "missing".to_string() },
    ]);
    // The batch is significant so it is recorded, it just has no effect
    assert_eq!(session.history_len(), 1);
    assert_eq!(session.snapshot().node_count(), 2);
    assert!(session.undo());
    assert_eq!(session.snapshot().node_count(), 2);
}

#[test]
fn settings_defaults_track_the_engine_constants() {
    let settings = EngineSettings::default();
    assert_eq!(settings.max_history, 80);
    assert_eq!(settings.throttle_interval(), Duration::from_millis(100));
    assert!(settings.slot_override.is_none());
}

#[test]
fn dimension_reports_are_recorded_and_replayed() {
    let mut session = FlowSession::new(two_node_snapshot());
    session.apply_node_changes(vec![NodeChange::Dimensions {
        id: "3".to_string(),
        dimensions: Dimensions { width: 260.0, height: 140.0 },
    }]);
    assert_eq!(session.history_len(), 1);
    assert!(session.undo());
    assert!(session.snapshot().node("3").expect("node 3").measured.is_none());
    assert!(session.redo());
    assert_eq!(
        session.snapshot().node("3").expect("node 3").measured,
        Some(Dimensions { width: 260.0, height: 140.0 })
    );
}
