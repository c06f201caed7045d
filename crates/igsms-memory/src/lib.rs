//! # igsms-memory
//!
//! Persistent state for igsms (SQLite-backed): the monitor's key-value
//! state and an audit trail of every SMS in and out.

pub mod audit;
pub mod store;

pub use audit::AuditLogger;
pub use store::{StateSnapshot, Store};
