use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

// Pan/zoom state reported by the renderer; carried through save/restore,
// never recorded in history.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    // Rendering variant tag, e.g. "dataSchema"
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Position,
    #[serde(default)]
    pub data: Map<String, Value>,
    // Runtime-only fields; they never cross the storage boundary
    #[serde(skip)]
    pub selected: bool,
    #[serde(skip)]
    pub measured: Option<Dimensions>,
}

impl Node {
    pub fn new(id: String, kind: String, position: Position, data: Map<String, Value>) -> Self {
        Node { id, kind, position, data, selected: false, measured: None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "sourceHandle", default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(rename = "targetHandle", default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(skip)]
    pub selected: bool,
}

// The complete graph state at one point in time. Node and edge order is
// preserved by every patch; edges reference nodes by id only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot { nodes: Vec::new(), edges: Vec::new() }
    }

    pub fn node(&self, id: &str) -> Option<&Node> { self.nodes.iter().find(|n| n.id == id) }
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> { self.nodes.iter_mut().find(|n| n.id == id) }
    pub fn edge(&self, id: &str) -> Option<&Edge> { self.edges.iter().find(|e| e.id == id) }
    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> { self.edges.iter_mut().find(|e| e.id == id) }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }

    // Edges with either endpoint on the given node
    pub fn edge_ids_touching(&self, node_id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter_map(|e| {
                if e.source == node_id || e.target == node_id { Some(e.id.clone()) } else { None }
            })
            .collect()
    }
}
