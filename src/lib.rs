//! Undo-aware editing engine for node-flow canvases: a live snapshot of
//! nodes and edges, an operation log with pointer traversal, and pure
//! replay over a moving baseline for undo/redo.

pub mod flow;
pub mod history;
pub mod persistence;
