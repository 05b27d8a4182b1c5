//! # blotter-oms
//!
//! The authoritative record of every client order. [`OrderStore`] owns the
//! order map and its insertion-order index behind one lock; the audit log
//! appends a durable line for every state change; persistence snapshots the
//! whole store to disk and restores it at startup.

pub mod audit;
pub mod persistence;
pub mod store;

pub use audit::{AuditEvent, AuditLog};
pub use persistence::Persistence;
pub use store::OrderStore;
