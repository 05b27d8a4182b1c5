//! Synthetic market data structures: book levels, two-sided books, and
//! price ticks published on the market-data stream.

use serde::{Deserialize, Serialize};

/// A single price level of the synthetic book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: i64,
}

/// A synthesized two-sided book for one symbol.
///
/// Bids are sorted best-first (highest price at index 0), asks best-first
/// (lowest price at index 0). The best bid is always strictly below the
/// best ask.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticBook {
    pub symbol: String,
    /// Sorted high to low.
    pub bids: Vec<BookLevel>,
    /// Sorted low to high.
    pub asks: Vec<BookLevel>,
    pub last_price: f64,
    pub spread: f64,
}

/// One price observation published on the market-data stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTick {
    pub symbol: String,
    /// Rounded to cents for display.
    pub price: f64,
    /// ISO-8601 UTC.
    pub timestamp: String,
}
