pub mod classify;
pub mod oplog;
pub mod replay;
pub mod session;
pub mod throttle;
