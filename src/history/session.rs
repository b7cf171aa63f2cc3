use std::path::PathBuf;

use anyhow::Result;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::flow::changes::{self, Connection, EdgeChange, NodeChange};
use crate::flow::snapshot::{Node, Position, Snapshot, Viewport};
use crate::persistence::persist::{parse_flow_file, FlowFile, SlotStore};

use super::classify;
use super::oplog::{OperationKind, OperationLog};
use super::replay::reconstruct;

pub const DEFAULT_MAX_HISTORY: usize = 80;

// Offset applied to duplicated nodes so the copies don't stack exactly
const DUPLICATE_OFFSET: f64 = 40.0;

/// One editing session: the live snapshot, its operation log and the replay
/// baseline the log is relative to.
///
/// The baseline starts as the seed snapshot and moves forward when history
/// is reset (after a save or an import) or when old operations are evicted,
/// so replaying the applied prefix over it always reproduces the live
/// state. All session state lives in this value; two sessions are fully
/// independent.
pub struct FlowSession {
    baseline: Snapshot,
    live: Snapshot,
    viewport: Viewport,
    log: OperationLog,
    max_history: usize,
}

impl FlowSession {
    pub fn new(initial: Snapshot) -> Self {
        Self::with_capacity(initial, DEFAULT_MAX_HISTORY)
    }

    pub fn with_capacity(initial: Snapshot, max_history: usize) -> Self {
        FlowSession {
            baseline: initial.clone(),
            live: initial,
            viewport: Viewport::default(),
            log: OperationLog::new(),
            max_history,
        }
    }

    pub fn snapshot(&self) -> &Snapshot { &self.live }
    pub fn viewport(&self) -> Viewport { self.viewport }
    pub fn set_viewport(&mut self, viewport: Viewport) { self.viewport = viewport; }

    // Fast path: classify, record when significant, always patch the live
    // snapshot directly. No replay happens for forward edits.
    pub fn apply_node_changes(&mut self, changes: Vec<NodeChange>) {
        let significant = classify::significant_node_changes(&changes);
        changes::apply_node_changes(&mut self.live, &changes);
        if significant {
            self.record(OperationKind::NodesChange(changes));
        }
    }

    pub fn apply_edge_changes(&mut self, changes: Vec<EdgeChange>) {
        let significant = classify::significant_edge_changes(&changes);
        changes::apply_edge_changes(&mut self.live, &changes);
        if significant {
            self.record(OperationKind::EdgesChange(changes));
        }
    }

    // Record and apply a connection; returns its deterministic edge id.
    pub fn connect(&mut self, connection: Connection) -> String {
        let id = changes::apply_connect(&mut self.live, &connection);
        self.record(OperationKind::Connect(connection));
        id
    }

    fn record(&mut self, kind: OperationKind) {
        if !self.log.record(kind) {
            return;
        }
        let evicted = self.log.evict_if_oversized(self.max_history);
        if !evicted.is_empty() {
            // Fold the dropped prefix into the baseline so replays of the
            // retained window still start from the right state.
            self.baseline = reconstruct(&self.baseline, &evicted);
        }
    }

    pub fn undo(&mut self) -> bool {
        if !self.log.step_back() {
            return false;
        }
        self.live = reconstruct(&self.baseline, self.log.applied());
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.log.step_forward() {
            return false;
        }
        self.live = reconstruct(&self.baseline, self.log.applied());
        true
    }

    pub fn can_undo(&self) -> bool { self.log.can_undo() }
    pub fn can_redo(&self) -> bool { self.log.can_redo() }
    pub fn history_len(&self) -> usize { self.log.len() }
    pub fn pointer(&self) -> i64 { self.log.pointer() }

    // Clear history and make the current live state the new undo baseline.
    // Undoing back to an empty log afterwards lands here, not on the
    // session seed.
    pub fn reset_history(&mut self) {
        self.log.reset();
        self.baseline = self.live.clone();
    }

    // Arm the log to swallow the next record call. For hosts whose renderer
    // echoes a change batch (typically re-measured dimensions) after a
    // programmatic snapshot replacement; the echoed batch still applies to
    // the live state, it just doesn't become an operation.
    pub fn skip_next_record(&mut self) {
        self.log.skip_next_record();
    }

    // Create a node with a fresh id and record it.
    pub fn add_node(&mut self, kind: String, position: Position, data: Map<String, Value>) -> String {
        let id = Uuid::now_v7().to_string();
        let node = Node::new(id.clone(), kind, position, data);
        self.apply_node_changes(vec![NodeChange::Add { node }]);
        id
    }

    // Remove nodes and every edge touching them. The cascade arrives as its
    // own edge batch, matching the two change events a renderer emits for
    // one deletion.
    pub fn remove_nodes(&mut self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        let edge_removals: Vec<EdgeChange> = self
            .live
            .edges
            .iter()
            .filter_map(|e| {
                if ids.contains(&e.source) || ids.contains(&e.target) {
                    Some(EdgeChange::Remove { id: e.id.clone() })
                } else {
                    None
                }
            })
            .collect();
        if !edge_removals.is_empty() {
            self.apply_edge_changes(edge_removals);
        }
        let node_removals: Vec<NodeChange> = ids
            .iter()
            .map(|id| NodeChange::Remove { id: id.clone() })
            .collect();
        self.apply_node_changes(node_removals);
    }

    // Copy nodes under fresh ids, offset so the copies are visible.
    // Returns the new ids in input order; unknown ids are skipped.
    pub fn duplicate_nodes(&mut self, ids: &[String]) -> Vec<String> {
        let mut adds = Vec::new();
        let mut new_ids = Vec::new();
        for id in ids {
            if let Some(node) = self.live.node(id) {
                let mut copy = node.clone();
                copy.id = Uuid::now_v7().to_string();
                copy.position.x += DUPLICATE_OFFSET;
                copy.position.y += DUPLICATE_OFFSET;
                copy.selected = false;
                copy.measured = None;
                new_ids.push(copy.id.clone());
                adds.push(NodeChange::Add { node: copy });
            }
        }
        if !adds.is_empty() {
            self.apply_node_changes(adds);
        }
        new_ids
    }

    // Expand or collapse every node via its data payload, as one operation.
    pub fn set_all_expanded(&mut self, expanded: bool) {
        let mut patch = Map::new();
        patch.insert("isExpanded".to_string(), Value::Bool(expanded));
        let changes: Vec<NodeChange> = self
            .live
            .nodes
            .iter()
            .map(|n| NodeChange::Data { id: n.id.clone(), patch: patch.clone() })
            .collect();
        if !changes.is_empty() {
            self.apply_node_changes(changes);
        }
    }

    pub fn to_flow_file(&self) -> FlowFile {
        FlowFile::from_runtime(&self.live, self.viewport)
    }

    // Accept a flow document only when it parses fully; the session is
    // untouched on a format error. A successful import starts with a clean
    // history over the imported state.
    pub fn import_json(&mut self, text: &str) -> Result<()> {
        let flow = parse_flow_file(text)?;
        self.load_flow(flow);
        Ok(())
    }

    // Adopt an already parsed flow document; same reset semantics as import.
    pub fn load_flow(&mut self, flow: FlowFile) {
        let (snapshot, viewport) = flow.to_runtime();
        self.live = snapshot;
        self.viewport = viewport;
        self.reset_history();
    }

    // Save to a named slot; the saved state becomes the new undo baseline.
    pub fn save_to(&mut self, store: &SlotStore, name: &str) -> Result<PathBuf> {
        let path = store.save(name, &self.to_flow_file())?;
        self.reset_history();
        Ok(path)
    }

    pub fn restore_from(&mut self, store: &SlotStore, name: &str) -> Result<()> {
        let flow = store.load(name)?;
        self.load_flow(flow);
        Ok(())
    }
}
