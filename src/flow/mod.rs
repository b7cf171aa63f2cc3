pub mod changes;
pub mod snapshot;
