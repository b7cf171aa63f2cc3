use log::warn;
use serde_json::{Map, Value};

use super::snapshot::{Dimensions, Edge, Node, Position, Snapshot};

// Raw change descriptors reported across the render boundary. A batch of
// these is one user-visible gesture; the history layer decides whether the
// batch is worth recording.
#[derive(Clone, Debug)]
pub enum NodeChange {
    Add { node: Node },
    Remove { id: String },
    Position { id: String, position: Position, dragging: bool },
    Select { id: String, selected: bool },
    Dimensions { id: String, dimensions: Dimensions },
    Data { id: String, patch: Map<String, Value> },
}

#[derive(Clone, Debug)]
pub enum EdgeChange {
    Add { edge: Edge },
    Remove { id: String },
    Select { id: String, selected: bool },
}

// A pending connection between two named handles.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
}

impl Connection {
    pub fn new(source: String, source_handle: String, target: String, target_handle: String) -> Self {
        Connection { source, source_handle, target, target_handle }
    }

    // Deterministic id: reconnecting the same two handles always yields the
    // same edge id, so repeated connects cannot pile up duplicates.
    pub fn edge_id(&self) -> String {
        format!(
            "e{}-{}-{}-{}",
            self.source,
            self.source_handle.replace(' ', "-"),
            self.target,
            self.target_handle.replace(' ', "-")
        )
    }

    pub fn to_edge(&self) -> Edge {
        Edge {
            id: self.edge_id(),
            source: self.source.clone(),
            target: self.target.clone(),
            source_handle: Some(self.source_handle.clone()),
            target_handle: Some(self.target_handle.clone()),
            selected: false,
        }
    }
}

// Structural patch of the node sequence. Untouched nodes keep their slot;
// a descriptor naming an unknown id is skipped with a warning so replay
// never aborts.
pub fn apply_node_changes(snapshot: &mut Snapshot, changes: &[NodeChange]) {
    for change in changes {
        match change {
            NodeChange::Add { node } => {
                if snapshot.node(&node.id).is_none() {
                    snapshot.nodes.push(node.clone());
                } else {
                    warn!("add for already present node {}", node.id);
                }
            }
            NodeChange::Remove { id } => {
                let before = snapshot.nodes.len();
                snapshot.nodes.retain(|n| n.id != *id);
                if snapshot.nodes.len() == before {
                    warn!("remove for unknown node {}", id);
                }
            }
            NodeChange::Position { id, position, .. } => {
                if let Some(node) = snapshot.node_mut(id) {
                    node.position = *position;
                } else {
                    warn!("position change for unknown node {}", id);
                }
            }
            NodeChange::Select { id, selected } => {
                if let Some(node) = snapshot.node_mut(id) {
                    node.selected = *selected;
                } else {
                    warn!("select change for unknown node {}", id);
                }
            }
            NodeChange::Dimensions { id, dimensions } => {
                if let Some(node) = snapshot.node_mut(id) {
                    node.measured = Some(*dimensions);
                } else {
                    warn!("dimensions change for unknown node {}", id);
                }
            }
            NodeChange::Data { id, patch } => {
                // merge keys into the payload rather than replacing it
                if let Some(node) = snapshot.node_mut(id) {
                    for (key, value) in patch {
                        node.data.insert(key.clone(), value.clone());
                    }
                } else {
                    warn!("data change for unknown node {}", id);
                }
            }
        }
    }
}

pub fn apply_edge_changes(snapshot: &mut Snapshot, changes: &[EdgeChange]) {
    for change in changes {
        match change {
            EdgeChange::Add { edge } => {
                if snapshot.edge(&edge.id).is_none() {
                    snapshot.edges.push(edge.clone());
                } else {
                    warn!("add for already present edge {}", edge.id);
                }
            }
            EdgeChange::Remove { id } => {
                let before = snapshot.edges.len();
                snapshot.edges.retain(|e| e.id != *id);
                if snapshot.edges.len() == before {
                    warn!("remove for unknown edge {}", id);
                }
            }
            EdgeChange::Select { id, selected } => {
                if let Some(edge) = snapshot.edge_mut(id) {
                    edge.selected = *selected;
                } else {
                    warn!("select change for unknown edge {}", id);
                }
            }
        }
    }
}

// Append the connection's edge unless that id is already present.
// Returns the deterministic edge id either way.
pub fn apply_connect(snapshot: &mut Snapshot, connection: &Connection) -> String {
    let id = connection.edge_id();
    if snapshot.edge(&id).is_none() {
        snapshot.edges.push(connection.to_edge());
    }
    id
}
