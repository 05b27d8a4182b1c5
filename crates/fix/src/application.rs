//! The order-entry application: admission, synchronous fill check, and
//! cancel legality.
//!
//! `handle` is a pure dispatch over the two inbound message types. Every
//! path that changes an order's state writes an audit record and publishes
//! a fresh blotter snapshot on the event bus after the store mutation has
//! completed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use blotter_bus::EventBus;
use blotter_core::time::utc_now_iso;
use blotter_core::types::{OrdType, OrderRecord, OrderStatus, Side};
use blotter_oms::{AuditEvent, AuditLog, OrderStore};
use blotter_risk::{AdmissionContext, AdmissionIntent, AdmissionPipeline, RiskLimits};
use blotter_sim::MarketSim;

use crate::fields::{cxl_rej_reason, exec_type, ord_status};
use crate::messages::{
    AppMessage, ExecutionReport, NewOrderSingle, OrderCancelReject, OrderCancelRequest, Outbound,
};

/// FIX-side order-entry handler.
pub struct FixApplication {
    store: Arc<OrderStore>,
    market: Arc<MarketSim>,
    bus: Arc<EventBus>,
    audit: Arc<AuditLog>,
    pipeline: AdmissionPipeline,
    limits: RiskLimits,
    order_counter: AtomicU64,
    exec_counter: AtomicU64,
}

impl FixApplication {
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
            pipeline: AdmissionPipeline::standard(),
            limits,
            order_counter: AtomicU64::new(1),
            exec_counter: AtomicU64::new(1),
        }
    }

    fn next_order_id(&self) -> String {
        format!("ORD{}", self.order_counter.fetch_add(1, Ordering::Relaxed))
    }

    fn next_exec_id(&self) -> String {
        format!("EXEC{}", self.exec_counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Dispatch one inbound application message, returning the responses
    /// to send back on the session.
    pub fn handle(&self, msg: AppMessage) -> Vec<Outbound> {
        match msg {
            AppMessage::NewOrderSingle(nos) => self.on_new_order_single(nos),
            AppMessage::OrderCancelRequest(cxl) => self.on_cancel_request(cxl),
        }
    }

    fn on_new_order_single(&self, msg: NewOrderSingle) -> Vec<Outbound> {
        let side = Side::from_fix(msg.side);
        let intent = AdmissionIntent {
            cl_ord_id: &msg.cl_ord_id,
            symbol: &msg.symbol,
            side,
            quantity: msg.order_qty,
            price: msg.price,
        };
        let ctx = AdmissionContext {
            store: &self.store,
            limits: &self.limits,
        };

        // ── Reject path ──
        if let Err(reject) = self.pipeline.evaluate(&intent, &ctx) {
            let order_id = self.next_order_id();
            let exec_id = self.next_exec_id();
            let reason = reject.to_string();

            tracing::warn!(
                cl_ord_id = %msg.cl_ord_id,
                symbol = %msg.symbol,
                %reason,
                "order rejected pre-trade"
            );

            let report = ExecutionReport {
                order_id: order_id.clone(),
                exec_id,
                exec_type: exec_type::REJECTED,
                ord_status: ord_status::REJECTED,
                side: msg.side,
                leaves_qty: 0,
                cum_qty: 0,
                avg_px: 0.0,
                cl_ord_id: msg.cl_ord_id.clone(),
                orig_cl_ord_id: None,
                symbol: msg.symbol.clone(),
                order_qty: Some(msg.order_qty),
                price: None,
                last_qty: None,
                last_px: None,
                ord_rej_reason: Some(reject.code().tag_103()),
                text: Some(reason.clone()),
            };

            // A duplicate must not clobber the live record it collided
            // with; every other rejection is recorded for UI visibility.
            if !self.store.exists(&msg.cl_ord_id) {
                self.store.upsert(OrderRecord {
                    cl_ord_id: msg.cl_ord_id.clone(),
                    order_id,
                    symbol: msg.symbol.clone(),
                    side: side.unwrap_or(Side::Buy),
                    order_type: if msg.price.is_some() {
                        OrdType::Limit
                    } else {
                        OrdType::Market
                    },
                    price: msg.price.unwrap_or(0.0),
                    quantity: msg.order_qty,
                    leaves_qty: 0,
                    cum_qty: 0,
                    avg_px: 0.0,
                    status: OrderStatus::Rejected,
                    reject_reason: reason.clone(),
                    transact_time: utc_now_iso(),
                    submit_time_us: 0,
                    ack_time_us: 0,
                    fill_time_us: 0,
                    latency_us: 0,
                });
            }

            self.audit(AuditEvent::OrderRejected, &msg.cl_ord_id, &reason);
            self.publish_snapshot();
            return vec![Outbound::ExecutionReport(report)];
        }

        // ── Ack path ──
        let side = side.expect("side validated by admission");
        let order_id = self.next_order_id();
        let exec_id = self.next_exec_id();

        let ack = ExecutionReport {
            order_id: order_id.clone(),
            exec_id,
            exec_type: exec_type::NEW,
            ord_status: ord_status::NEW,
            side: msg.side,
            leaves_qty: msg.order_qty,
            cum_qty: 0,
            avg_px: 0.0,
            cl_ord_id: msg.cl_ord_id.clone(),
            orig_cl_ord_id: None,
            symbol: msg.symbol.clone(),
            order_qty: Some(msg.order_qty),
            price: msg.price,
            last_qty: None,
            last_px: None,
            ord_rej_reason: None,
            text: None,
        };

        self.store.upsert(OrderRecord {
            cl_ord_id: msg.cl_ord_id.clone(),
            order_id: order_id.clone(),
            symbol: msg.symbol.clone(),
            side,
            order_type: if msg.price.is_some() {
                OrdType::Limit
            } else {
                OrdType::Market
            },
            price: msg.price.unwrap_or(0.0),
            quantity: msg.order_qty,
            leaves_qty: msg.order_qty,
            cum_qty: 0,
            avg_px: 0.0,
            status: OrderStatus::New,
            reject_reason: String::new(),
            transact_time: utc_now_iso(),
            submit_time_us: 0,
            ack_time_us: 0,
            fill_time_us: 0,
            latency_us: 0,
        });

        tracing::info!(
            cl_ord_id = %msg.cl_ord_id,
            %order_id,
            symbol = %msg.symbol,
            %side,
            qty = msg.order_qty,
            "order admitted"
        );
        self.audit(
            AuditEvent::OrderNew,
            &msg.cl_ord_id,
            &format!(
                "symbol={},side={},qty={},px={}",
                msg.symbol,
                side,
                msg.order_qty,
                msg.price.unwrap_or(0.0)
            ),
        );
        self.audit(AuditEvent::OrderAck, &msg.cl_ord_id, &format!("orderId={}", order_id));

        let mut out = vec![Outbound::ExecutionReport(ack)];

        // ── Synchronous fill check (priced orders only) ──
        if let Some(px) = msg.price {
            if self.market.should_fill(&msg.symbol, side, px) {
                let fill_exec_id = self.next_exec_id();
                out.push(Outbound::ExecutionReport(ExecutionReport {
                    order_id: order_id.clone(),
                    exec_id: fill_exec_id,
                    exec_type: exec_type::TRADE,
                    ord_status: ord_status::FILLED,
                    side: msg.side,
                    leaves_qty: 0,
                    cum_qty: msg.order_qty,
                    avg_px: px,
                    cl_ord_id: msg.cl_ord_id.clone(),
                    orig_cl_ord_id: None,
                    symbol: msg.symbol.clone(),
                    order_qty: Some(msg.order_qty),
                    price: Some(px),
                    last_qty: Some(msg.order_qty),
                    last_px: Some(px),
                    ord_rej_reason: None,
                    text: None,
                }));

                self.store
                    .update_status(&msg.cl_ord_id, OrderStatus::Filled, 0, msg.order_qty, px);
                self.audit(
                    AuditEvent::OrderFilled,
                    &msg.cl_ord_id,
                    &format!("qty={},px={}", msg.order_qty, px),
                );
            }
        }

        self.publish_snapshot();
        out
    }

    fn on_cancel_request(&self, msg: OrderCancelRequest) -> Vec<Outbound> {
        let existing = self.store.get(&msg.orig_cl_ord_id);

        let Some(record) = existing else {
            self.audit(
                AuditEvent::CancelRejected,
                &msg.orig_cl_ord_id,
                "reason=unknown order",
            );
            return vec![Outbound::OrderCancelReject(OrderCancelReject {
                order_id: "UNKNOWN".to_string(),
                cl_ord_id: msg.cl_ord_id,
                orig_cl_ord_id: msg.orig_cl_ord_id,
                ord_status: ord_status::REJECTED,
                cxl_rej_reason: cxl_rej_reason::UNKNOWN_ORDER,
            })];
        };

        let order_id = if record.order_id.is_empty() {
            "UNKNOWN".to_string()
        } else {
            record.order_id.clone()
        };

        match record.status {
            OrderStatus::Filled => {
                self.audit(
                    AuditEvent::CancelRejected,
                    &msg.orig_cl_ord_id,
                    "reason=too late to cancel",
                );
                vec![Outbound::OrderCancelReject(OrderCancelReject {
                    order_id,
                    cl_ord_id: msg.cl_ord_id,
                    orig_cl_ord_id: msg.orig_cl_ord_id,
                    ord_status: ord_status::FILLED,
                    cxl_rej_reason: cxl_rej_reason::TOO_LATE_TO_CANCEL,
                })]
            }
            OrderStatus::Canceled => {
                self.audit(
                    AuditEvent::CancelRejected,
                    &msg.orig_cl_ord_id,
                    "reason=already canceled",
                );
                vec![Outbound::OrderCancelReject(OrderCancelReject {
                    order_id,
                    cl_ord_id: msg.cl_ord_id,
                    orig_cl_ord_id: msg.orig_cl_ord_id,
                    ord_status: ord_status::CANCELED,
                    cxl_rej_reason: cxl_rej_reason::DUPLICATE_CL_ORD_ID,
                })]
            }
            OrderStatus::Rejected => {
                // Rejected is terminal; there is nothing live to cancel.
                self.audit(
                    AuditEvent::CancelRejected,
                    &msg.orig_cl_ord_id,
                    "reason=order was rejected",
                );
                vec![Outbound::OrderCancelReject(OrderCancelReject {
                    order_id,
                    cl_ord_id: msg.cl_ord_id,
                    orig_cl_ord_id: msg.orig_cl_ord_id,
                    ord_status: ord_status::REJECTED,
                    cxl_rej_reason: cxl_rej_reason::TOO_LATE_TO_CANCEL,
                })]
            }
            OrderStatus::New | OrderStatus::Partial => {
                let exec_id = self.next_exec_id();
                let report = ExecutionReport {
                    order_id: msg.orig_cl_ord_id.clone(),
                    exec_id,
                    exec_type: exec_type::CANCELED,
                    ord_status: ord_status::CANCELED,
                    side: msg.side,
                    leaves_qty: 0,
                    cum_qty: 0,
                    avg_px: 0.0,
                    cl_ord_id: msg.cl_ord_id.clone(),
                    orig_cl_ord_id: Some(msg.orig_cl_ord_id.clone()),
                    symbol: msg.symbol.clone(),
                    order_qty: None,
                    price: None,
                    last_qty: None,
                    last_px: None,
                    ord_rej_reason: None,
                    text: None,
                };

                self.store
                    .update_status(&msg.orig_cl_ord_id, OrderStatus::Canceled, 0, 0, 0.0);
                tracing::info!(orig_cl_ord_id = %msg.orig_cl_ord_id, "order canceled");
                self.audit(
                    AuditEvent::OrderCanceled,
                    &msg.orig_cl_ord_id,
                    &format!("cancelClOrdId={}", msg.cl_ord_id),
                );
                self.publish_snapshot();

                vec![Outbound::ExecutionReport(report)]
            }
        }
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
