//! Core types for the blotter gateway.
//!
//! Everything a component needs to describe an order or a simulated market:
//! sides, order types, lifecycle statuses, the order record itself, blotter
//! statistics, and synthetic book structures.

pub mod book;
pub mod order;

// Re-export primary types for convenient access via `blotter_core::types::*`.
pub use book::{BookLevel, MarketTick, SyntheticBook};
pub use order::{OrdType, OrderRecord, OrderStats, OrderStatus, Side};
