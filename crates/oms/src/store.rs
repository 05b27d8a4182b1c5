//! The Order Store: single source of truth for every order's state.
//!
//! All mutations are serialized under one store-wide lock. Readers receive
//! copies, never references into the map, so no caller can observe a
//! half-applied mutation. An insertion-order index keeps snapshots stable:
//! orders appear in the order they were first admitted, regardless of later
//! updates.

use std::collections::HashMap;

use parking_lot::Mutex;

use blotter_core::time::utc_now_iso;
use blotter_core::types::{OrderRecord, OrderStats, OrderStatus};

struct Inner {
    orders: HashMap<String, OrderRecord>,
    /// clOrdIds in first-admission order.
    index: Vec<String>,
}

/// Thread-safe, indexed record of every order seen this session.
///
/// Operations are infallible from the caller's view: updates against an
/// unknown `clOrdId` are silent no-ops.
pub struct OrderStore {
    inner: Mutex<Inner>,
}

impl OrderStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                orders: HashMap::new(),
                index: Vec::new(),
            }),
        }
    }

    /// Insert the record if absent (appending to the insertion index), or
    /// overwrite it in place preserving its index position.
    pub fn upsert(&self, record: OrderRecord) {
        let mut inner = self.inner.lock();
        if !inner.orders.contains_key(&record.cl_ord_id) {
            inner.index.push(record.cl_ord_id.clone());
        }
        inner.orders.insert(record.cl_ord_id.clone(), record);
    }

    /// Set status, leaves, cum, and average price atomically.
    ///
    /// Refreshes `transact_time`; the transition into Filled also stamps
    /// `fill_time_us`. No-op when `cl_ord_id` is unknown.
    pub fn update_status(
        &self,
        cl_ord_id: &str,
        status: OrderStatus,
        leaves_qty: i64,
        cum_qty: i64,
        avg_px: f64,
    ) {
        let mut inner = self.inner.lock();
        if let Some(order) = inner.orders.get_mut(cl_ord_id) {
            if status == OrderStatus::Filled && order.status != OrderStatus::Filled {
                order.fill_time_us = blotter_core::time::now_micros();
            }
            order.status = status;
            order.leaves_qty = leaves_qty;
            order.cum_qty = cum_qty;
            order.avg_px = avg_px;
            order.transact_time = utc_now_iso();
        }
    }

    /// Mark the order Rejected and store the reason. No-op when unknown.
    pub fn reject(&self, cl_ord_id: &str, reason: &str) {
        let mut inner = self.inner.lock();
        if let Some(order) = inner.orders.get_mut(cl_ord_id) {
            order.status = OrderStatus::Rejected;
            order.reject_reason = reason.to_string();
            order.transact_time = utc_now_iso();
        }
    }

    /// Re-key a record under a new `clOrdId`, preserving its position in
    /// the insertion index. Used by the amend path.
    ///
    /// Returns `false` (and changes nothing) when the original is unknown
    /// or the new key is already taken by another order.
    pub fn rename(&self, orig_cl_ord_id: &str, record: OrderRecord) -> bool {
        let mut inner = self.inner.lock();
        if !inner.orders.contains_key(orig_cl_ord_id) {
            return false;
        }
        if record.cl_ord_id != orig_cl_ord_id && inner.orders.contains_key(&record.cl_ord_id) {
            return false;
        }
        inner.orders.remove(orig_cl_ord_id);
        if let Some(slot) = inner.index.iter_mut().find(|id| *id == orig_cl_ord_id) {
            *slot = record.cl_ord_id.clone();
        }
        inner.orders.insert(record.cl_ord_id.clone(), record);
        true
    }

    /// Return a copy of the record, or `None` when unknown.
    pub fn get(&self, cl_ord_id: &str) -> Option<OrderRecord> {
        self.inner.lock().orders.get(cl_ord_id).cloned()
    }

    /// Membership test.
    pub fn exists(&self, cl_ord_id: &str) -> bool {
        self.inner.lock().orders.contains_key(cl_ord_id)
    }

    /// Copies of all records that can still fill (New or Partial).
    /// Order unspecified.
    pub fn open_orders(&self) -> Vec<OrderRecord> {
        self.inner
            .lock()
            .orders
            .values()
            .filter(|o| o.status.is_open())
            .cloned()
            .collect()
    }

    /// Number of records tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().orders.len()
    }

    /// Returns `true` when no orders are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate statistics from a full scan under the lock.
    pub fn stats(&self) -> OrderStats {
        let inner = self.inner.lock();
        let mut stats = OrderStats::default();
        let mut latencies: Vec<i64> = Vec::with_capacity(inner.orders.len());

        for order in inner.orders.values() {
            stats.total_orders += 1;
            match order.status {
                OrderStatus::New => stats.new_orders += 1,
                OrderStatus::Partial => stats.partial_orders += 1,
                OrderStatus::Filled => stats.filled_orders += 1,
                OrderStatus::Rejected => stats.rejected_orders += 1,
                OrderStatus::Canceled => stats.canceled_orders += 1,
            }

            stats.total_notional += order.price * order.quantity as f64;
            if matches!(order.status, OrderStatus::Filled | OrderStatus::Partial) {
                stats.filled_notional += order.avg_px * order.cum_qty as f64;
            }

            if order.latency_us > 0 {
                latencies.push(order.latency_us);
            }
        }

        if !latencies.is_empty() {
            latencies.sort_unstable();
            let sum: i64 = latencies.iter().sum();
            stats.avg_latency_us = sum / latencies.len() as i64;
            stats.min_latency_us = latencies[0];
            stats.max_latency_us = latencies[latencies.len() - 1];

            let mut p99_idx = (latencies.len() as f64 * 0.99) as usize;
            if p99_idx >= latencies.len() {
                p99_idx = latencies.len() - 1;
            }
            stats.p99_latency_us = latencies[p99_idx];
        }

        stats
    }

    /// Structured JSON array of all records in first-admission order.
    pub fn snapshot(&self) -> serde_json::Value {
        let inner = self.inner.lock();
        let rows: Vec<serde_json::Value> = inner
            .index
            .iter()
            .filter_map(|id| inner.orders.get(id))
            .map(|o| serde_json::to_value(o).expect("order record serializes"))
            .collect();
        serde_json::Value::Array(rows)
    }

    /// The snapshot rendered as a JSON string, ready for the event bus.
    pub fn snapshot_string(&self) -> String {
        self.snapshot().to_string()
    }
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}
