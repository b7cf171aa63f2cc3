use log::debug;
use time::OffsetDateTime;

use crate::flow::changes::{Connection, EdgeChange, NodeChange};

// One recorded, replayable user edit.
#[derive(Clone, Debug)]
pub struct Operation {
    pub kind: OperationKind,
    // Wall-clock record time. Advisory only; ordering comes from log indices.
    pub timestamp_ms: i64,
}

#[derive(Clone, Debug)]
pub enum OperationKind {
    NodesChange(Vec<NodeChange>),
    EdgesChange(Vec<EdgeChange>),
    Connect(Connection),
}

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

// Ordered operation sequence with a traversal cursor. The cursor counts
// applied operations, so the -1-based pointer of the public API is
// cursor - 1. Invariant: 0 <= cursor <= operations.len().
#[derive(Debug, Default)]
pub struct OperationLog {
    operations: Vec<Operation>,
    cursor: usize,
    skip_next: bool,
}

impl OperationLog {
    pub fn new() -> Self {
        OperationLog { operations: Vec::new(), cursor: 0, skip_next: false }
    }

    // Append after truncating any undone tail. Returns false when the
    // skip-next-record flag swallowed the call.
    pub fn record(&mut self, kind: OperationKind) -> bool {
        if self.skip_next {
            self.skip_next = false;
            return false;
        }
        if self.cursor < self.operations.len() {
            debug!("truncating {} undone operations", self.operations.len() - self.cursor);
            self.operations.truncate(self.cursor);
        }
        self.operations.push(Operation { kind, timestamp_ms: now_ms() });
        self.cursor = self.operations.len();
        true
    }

    // Drop the oldest operations once the log outgrows `max`, keeping the
    // newest floor(max * 0.8). Returns the dropped prefix so the caller can
    // fold it into its replay baseline; otherwise later replays of the
    // retained window would start from the wrong state.
    pub fn evict_if_oversized(&mut self, max: usize) -> Vec<Operation> {
        if self.operations.len() <= max {
            return Vec::new();
        }
        let keep = (max as f64 * 0.8).floor() as usize;
        let dropped = self.operations.len() - keep;
        let evicted: Vec<Operation> = self.operations.drain(..dropped).collect();
        self.cursor = if self.cursor >= dropped { self.cursor - dropped } else { keep };
        debug!("evicted {} operations, {} retained", dropped, keep);
        evicted
    }

    pub fn reset(&mut self) {
        self.operations.clear();
        self.cursor = 0;
        self.skip_next = false;
    }

    // Arm the flag consumed by the next record call.
    pub fn skip_next_record(&mut self) {
        self.skip_next = true;
    }

    pub fn step_back(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    pub fn step_forward(&mut self) -> bool {
        if self.cursor < self.operations.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn can_undo(&self) -> bool { self.cursor > 0 }
    pub fn can_redo(&self) -> bool { self.cursor < self.operations.len() }
    pub fn len(&self) -> usize { self.operations.len() }
    pub fn is_empty(&self) -> bool { self.operations.is_empty() }

    // Index of the last applied operation, -1 when nothing is applied.
    pub fn pointer(&self) -> i64 { self.cursor as i64 - 1 }

    // The applied prefix, i.e. what replay needs to rebuild the live state.
    pub fn applied(&self) -> &[Operation] { &self.operations[..self.cursor] }
}
