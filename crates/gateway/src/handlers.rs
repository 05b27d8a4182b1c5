//! UI command handlers: validate and admit order, cancel, and amend
//! requests arriving over REST.
//!
//! Handlers return `Err(message)` with no state written when a request is
//! refused; the HTTP layer maps that to a 4xx. Accepted commands mutate the
//! store, write an audit record, and publish a fresh snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Deserialize;

use blotter_bus::EventBus;
use blotter_core::time::{now_micros, utc_now_iso};
use blotter_core::types::{OrdType, OrderRecord, OrderStatus, Side};
use blotter_oms::{AuditEvent, AuditLog, OrderStore};
use blotter_risk::RiskLimits;
use blotter_sim::MarketSim;

const MAX_CL_ORD_ID_LEN: usize = 64;
const MAX_SYMBOL_LEN: usize = 16;

/// `POST /order` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub cl_ord_id: String,
    pub symbol: String,
    /// `"Buy"`/`"1"` or `"Sell"`/`"2"`.
    pub side: String,
    pub quantity: i64,
    #[serde(default)]
    pub price: f64,
    /// `"Market"`/`"1"` or `"Limit"`/`"2"`; defaults to Limit.
    #[serde(default)]
    pub order_type: Option<String>,
}

/// `POST /cancel` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub orig_cl_ord_id: String,
    #[serde(default)]
    pub cl_ord_id: Option<String>,
}

/// `POST /amend` body. Quantity may only be reduced.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendRequest {
    pub orig_cl_ord_id: String,
    #[serde(default)]
    pub cl_ord_id: Option<String>,
    pub quantity: i64,
}

/// Admission and lifecycle commands from the UI surface.
pub struct UiHandlers {
    store: Arc<OrderStore>,
    market: Arc<MarketSim>,
    bus: Arc<EventBus>,
    audit: Arc<AuditLog>,
    limits: RiskLimits,
    order_counter: AtomicU64,
}

impl UiHandlers {
    pub fn new(
        store: Arc<OrderStore>,
        market: Arc<MarketSim>,
        bus: Arc<EventBus>,
        audit: Arc<AuditLog>,
        limits: RiskLimits,
    ) -> Self {
        Self {
            store,
            market,
            bus,
            audit,
            limits,
            order_counter: AtomicU64::new(1),
        }
    }

    fn next_order_id(&self) -> String {
        format!("UI_ORD{}", self.order_counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Validate and admit a new order. Fills are left to the fill loop.
    pub fn submit_order(&self, req: &OrderRequest) -> Result<(), String> {
        let submit_time_us = now_micros();

        if !is_valid_cl_ord_id(&req.cl_ord_id) {
            return Err("Invalid clOrdId: must be 1-64 alphanumeric characters".to_string());
        }
        if !is_valid_symbol(&req.symbol) {
            return Err("Invalid symbol: must be 1-16 uppercase alphanumeric characters".to_string());
        }
        let side = parse_side(&req.side).ok_or("Invalid side (must be Buy or Sell)")?;
        let order_type = parse_order_type(req.order_type.as_deref());
        if req.quantity <= 0 {
            return Err("Quantity must be positive".to_string());
        }
        // Market orders are priced at the current mark; limit orders carry
        // the client's price.
        let price = match order_type {
            OrdType::Limit => {
                if req.price <= 0.0 {
                    return Err("Price must be positive".to_string());
                }
                req.price
            }
            OrdType::Market => self.market.mark(&req.symbol),
        };
        if req.quantity > self.limits.max_order_qty {
            return Err(format!(
                "Order quantity exceeds limit ({})",
                self.limits.max_order_qty
            ));
        }
        if req.quantity as f64 * price > self.limits.max_notional {
            return Err(format!(
                "Notional exceeds limit (${})",
                self.limits.max_notional as i64
            ));
        }
        if self.store.exists(&req.cl_ord_id) {
            return Err("Duplicate ClOrdID".to_string());
        }

        let order_id = self.next_order_id();
        let ack_time_us = now_micros();
        let record = OrderRecord {
            cl_ord_id: req.cl_ord_id.clone(),
            order_id: order_id.clone(),
            symbol: req.symbol.clone(),
            side,
            order_type,
            price,
            quantity: req.quantity,
            leaves_qty: req.quantity,
            cum_qty: 0,
            avg_px: 0.0,
            status: OrderStatus::New,
            reject_reason: String::new(),
            transact_time: utc_now_iso(),
            submit_time_us,
            ack_time_us,
            fill_time_us: 0,
            latency_us: ack_time_us - submit_time_us,
        };
        self.store.upsert(record);

        tracing::info!(
            cl_ord_id = %req.cl_ord_id,
            %order_id,
            symbol = %req.symbol,
            %side,
            qty = req.quantity,
            price,
            "UI order admitted"
        );
        self.audit(
            AuditEvent::OrderNew,
            &req.cl_ord_id,
            &format!(
                "symbol={},side={},qty={},px={}",
                req.symbol, side, req.quantity, price
            ),
        );
        self.publish_snapshot();
        Ok(())
    }

    /// Cancel an open order.
    pub fn cancel_order(&self, req: &CancelRequest) -> Result<(), String> {
        let cancel_cl_ord_id = req
            .cl_ord_id
            .clone()
            .unwrap_or_else(|| format!("{}_CXL", req.orig_cl_ord_id));
        if !is_valid_cl_ord_id(&req.orig_cl_ord_id) || !is_valid_cl_ord_id(&cancel_cl_ord_id) {
            return Err("Invalid clOrdId format".to_string());
        }

        let Some(record) = self.store.get(&req.orig_cl_ord_id) else {
            return Err(format!("Unknown order: {}", req.orig_cl_ord_id));
        };

        match record.status {
            OrderStatus::Filled => Err("Cannot cancel filled order".to_string()),
            OrderStatus::Canceled => Err("Order already canceled".to_string()),
            OrderStatus::Rejected => Err("Cannot cancel rejected order".to_string()),
            OrderStatus::New | OrderStatus::Partial => {
                self.store
                    .update_status(&req.orig_cl_ord_id, OrderStatus::Canceled, 0, 0, 0.0);
                tracing::info!(orig_cl_ord_id = %req.orig_cl_ord_id, "UI order canceled");
                self.audit(
                    AuditEvent::OrderCanceled,
                    &req.orig_cl_ord_id,
                    &format!("cancelClOrdId={}", cancel_cl_ord_id),
                );
                self.publish_snapshot();
                Ok(())
            }
        }
    }

    /// Amend an open order: reduce quantity and re-key to a new clOrdId.
    pub fn amend_order(&self, req: &AmendRequest) -> Result<(), String> {
        let new_cl_ord_id = req
            .cl_ord_id
            .clone()
            .unwrap_or_else(|| format!("{}_AMD", req.orig_cl_ord_id));
        if !is_valid_cl_ord_id(&req.orig_cl_ord_id) || !is_valid_cl_ord_id(&new_cl_ord_id) {
            return Err("Invalid clOrdId format".to_string());
        }

        let refuse = |reason: String, this: &Self| -> Result<(), String> {
            this.audit(
                AuditEvent::ReplaceRejected,
                &req.orig_cl_ord_id,
                &format!("reason={}", reason),
            );
            Err(reason)
        };

        let Some(record) = self.store.get(&req.orig_cl_ord_id) else {
            return refuse(format!("Unknown order: {}", req.orig_cl_ord_id), self);
        };

        if !record.status.is_open() {
            return refuse(format!("Cannot amend order in status {}", record.status), self);
        }
        if req.quantity <= 0 {
            return refuse("Quantity must be positive".to_string(), self);
        }
        if req.quantity > record.quantity {
            return refuse("Quantity may only be reduced".to_string(), self);
        }
        if req.quantity < record.cum_qty {
            return refuse("Quantity cannot be below filled quantity".to_string(), self);
        }
        if req.quantity as f64 * record.price > self.limits.max_notional {
            return refuse(
                format!("Notional exceeds limit (${})", self.limits.max_notional as i64),
                self,
            );
        }
        if new_cl_ord_id != req.orig_cl_ord_id && self.store.exists(&new_cl_ord_id) {
            return refuse("Duplicate ClOrdID".to_string(), self);
        }

        let old_qty = record.quantity;
        let mut amended = record;
        amended.cl_ord_id = new_cl_ord_id.clone();
        amended.quantity = req.quantity;
        amended.leaves_qty = req.quantity - amended.cum_qty;
        amended.transact_time = utc_now_iso();

        if !self.store.rename(&req.orig_cl_ord_id, amended) {
            return refuse("Unknown order".to_string(), self);
        }

        tracing::info!(
            orig_cl_ord_id = %req.orig_cl_ord_id,
            new_cl_ord_id = %new_cl_ord_id,
            old_qty,
            new_qty = req.quantity,
            "UI order replaced"
        );
        self.audit(
            AuditEvent::OrderReplaced,
            &req.orig_cl_ord_id,
            &format!(
                "newClOrdId={},oldQty={},newQty={}",
                new_cl_ord_id, old_qty, req.quantity
            ),
        );
        self.publish_snapshot();
        Ok(())
    }

    fn publish_snapshot(&self) {
        self.bus.orders.publish(&self.store.snapshot_string());
    }

    fn audit(&self, event: AuditEvent, cl_ord_id: &str, details: &str) {
        if let Err(e) = self.audit.record(event, cl_ord_id, details) {
            tracing::error!(error = %e, "audit write failed");
        }
    }
}

fn parse_side(side: &str) -> Option<Side> {
    match side {
        "Buy" | "1" => Some(Side::Buy),
        "Sell" | "2" => Some(Side::Sell),
        _ => None,
    }
}

fn parse_order_type(order_type: Option<&str>) -> OrdType {
    match order_type {
        Some("Market") | Some("1") => OrdType::Market,
        _ => OrdType::Limit,
    }
}

fn is_valid_cl_ord_id(cl_ord_id: &str) -> bool {
    !cl_ord_id.is_empty()
        && cl_ord_id.len() <= MAX_CL_ORD_ID_LEN
        && cl_ord_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
