//! # blotter-sim
//!
//! Market simulator: a seeded pseudo-random walk per symbol, partial-fill
//! arbitration for the fill loop, and a synthetic two-sided book for the
//! order-book endpoint. Identical seeds and call sequences produce
//! bitwise-identical outputs.

pub mod market;

pub use market::{FillResult, MarketSim};
