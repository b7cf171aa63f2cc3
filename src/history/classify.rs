use crate::flow::changes::{EdgeChange, NodeChange};

// A batch is worth recording when any descriptor in it is; the whole raw
// batch then goes into the log as one operation.
pub fn significant_node_changes(changes: &[NodeChange]) -> bool {
    changes.iter().any(node_change_significant)
}

pub fn significant_edge_changes(changes: &[EdgeChange]) -> bool {
    changes.iter().any(edge_change_significant)
}

// Positions count only at drag end, never per intermediate frame; selection
// is transient noise.
fn node_change_significant(change: &NodeChange) -> bool {
    match change {
        NodeChange::Position { dragging, .. } => !dragging,
        NodeChange::Select { .. } => false,
        NodeChange::Add { .. }
        | NodeChange::Remove { .. }
        | NodeChange::Dimensions { .. }
        | NodeChange::Data { .. } => true,
    }
}

fn edge_change_significant(change: &EdgeChange) -> bool {
    match change {
        EdgeChange::Select { .. } => false,
        EdgeChange::Add { .. } | EdgeChange::Remove { .. } => true,
    }
}
