use crate::flow::changes::{apply_connect, apply_edge_changes, apply_node_changes};
use crate::flow::snapshot::Snapshot;

use super::oplog::{Operation, OperationKind};

/// Replay an operation prefix over a copy of `baseline`.
///
/// Pure with respect to the live snapshot: the result depends only on the
/// baseline and the slice (usually `OperationLog::applied`), which is what
/// lets the same function rebuild state for undo/redo and fold evicted
/// operations into a new baseline. An empty slice returns the baseline
/// unchanged. Replay never aborts; descriptors naming unknown ids are
/// skipped with a warning inside the appliers.
pub fn reconstruct(baseline: &Snapshot, operations: &[Operation]) -> Snapshot {
    let mut snapshot = baseline.clone();
    for op in operations {
        match &op.kind {
            OperationKind::NodesChange(changes) => apply_node_changes(&mut snapshot, changes),
            OperationKind::EdgesChange(changes) => apply_edge_changes(&mut snapshot, changes),
            OperationKind::Connect(connection) => {
                apply_connect(&mut snapshot, connection);
            }
        }
    }
    snapshot
}
