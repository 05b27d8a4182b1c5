//! Order-related types: side, order type, lifecycle status, the order
//! record, and aggregate blotter statistics.
//!
//! The [`OrderRecord`] is the unit the Order Store owns. It serializes with
//! camelCase keys so the snapshot JSON, the persistence file, and the REST
//! surface all share one shape.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy / long.
    Buy,
    /// Sell / short.
    Sell,
}

impl Side {
    /// FIX tag 54 encoding ('1' = Buy, '2' = Sell).
    pub const fn fix_char(&self) -> char {
        match self {
            Side::Buy => '1',
            Side::Sell => '2',
        }
    }

    /// Decode from FIX tag 54. Returns `None` for any other value.
    pub fn from_fix(c: char) -> Option<Self> {
        match c {
            '1' => Some(Side::Buy),
            '2' => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrdType {
    /// Market order, priced at the current mark on admission.
    Market,
    /// Limit order with a client-specified price.
    Limit,
}

impl fmt::Display for OrdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrdType::Market => write!(f, "Market"),
            OrdType::Limit => write!(f, "Limit"),
        }
    }
}

/// Order lifecycle status.
///
/// Legal transitions: New -> Partial -> Partial, New/Partial -> Filled,
/// New/Partial -> Canceled. Rejected is only reachable at admission.
/// Filled, Rejected, and Canceled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Admitted, nothing executed yet.
    New,
    /// Some quantity executed, some remains open.
    Partial,
    /// Fully executed; terminal.
    Filled,
    /// Failed pre-trade validation; terminal.
    Rejected,
    /// Canceled by the client; terminal.
    Canceled,
}

impl OrderStatus {
    /// Returns `true` if this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Rejected | Self::Canceled)
    }

    /// Returns `true` if the order can still fill (New or Partial).
    pub fn is_open(&self) -> bool {
        matches!(self, Self::New | Self::Partial)
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::New, OrderStatus::Partial)
                | (OrderStatus::New, OrderStatus::Filled)
                | (OrderStatus::New, OrderStatus::Canceled)
                | (OrderStatus::Partial, OrderStatus::Partial)
                | (OrderStatus::Partial, OrderStatus::Filled)
                | (OrderStatus::Partial, OrderStatus::Canceled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Canceled => "CANCELED",
        };
        write!(f, "{}", s)
    }
}

/// A single client order as tracked by the Order Store.
///
/// Invariant: `leaves_qty + cum_qty == quantity` while the order is open;
/// `leaves_qty == 0` in any terminal state. `reject_reason` is non-empty
/// iff `status == Rejected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Client-chosen identifier, unique for the store's lifetime.
    pub cl_ord_id: String,
    /// Server-assigned identifier (`ORD{n}` over FIX, `UI_ORD{n}` via REST).
    pub order_id: String,
    /// Instrument symbol, 1-16 uppercase alphanumerics.
    pub symbol: String,
    pub side: Side,
    pub order_type: OrdType,
    /// Limit price; for Market orders, the mark at admission time.
    pub price: f64,
    /// Original order size.
    pub quantity: i64,
    /// Remaining unfilled quantity.
    pub leaves_qty: i64,
    /// Cumulative executed quantity.
    pub cum_qty: i64,
    /// Volume-weighted average fill price; zero until the first fill.
    pub avg_px: f64,
    pub status: OrderStatus,
    /// Populated only for rejected orders.
    #[serde(default)]
    pub reject_reason: String,
    /// ISO-8601 UTC of the last state change.
    pub transact_time: String,
    /// Microseconds since the epoch when the order was received.
    #[serde(default)]
    pub submit_time_us: i64,
    /// Microseconds when the first ack was produced.
    #[serde(default)]
    pub ack_time_us: i64,
    /// Microseconds when the order reached Filled.
    #[serde(default)]
    pub fill_time_us: i64,
    /// Submit-to-ack latency in microseconds.
    #[serde(default)]
    pub latency_us: i64,
}

/// Aggregate statistics over the whole store, computed on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: i64,
    pub new_orders: i64,
    pub partial_orders: i64,
    pub filled_orders: i64,
    pub rejected_orders: i64,
    pub canceled_orders: i64,
    /// Arithmetic mean of observed latencies, integer microseconds.
    pub avg_latency_us: i64,
    pub min_latency_us: i64,
    pub max_latency_us: i64,
    /// Latency at the floor of the 99th percentile index, clamped.
    pub p99_latency_us: i64,
    /// Sum of `price * quantity` across all orders.
    pub total_notional: f64,
    /// Sum of `avg_px * cum_qty` across Filled and Partial orders.
    pub filled_notional: f64,
}
