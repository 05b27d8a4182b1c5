//! Ordered pre-trade admission checks.
//!
//! Check order is part of the contract: the first failure wins and its
//! text/code pair is what the client sees:
//!
//! 1. symbol present
//! 2. side valid
//! 3. quantity positive
//! 4. price positive (priced orders only)
//! 5. quantity within limit
//! 6. notional within limit (priced orders only)
//! 7. clOrdId not a duplicate

use blotter_core::types::Side;
use blotter_oms::OrderStore;

/// FIX 4.4 OrdRejReason values (tag 103).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    UnknownSymbol,
    ExceedsLimit,
    DuplicateOrder,
    Other,
}

impl RejectCode {
    /// Numeric value carried in tag 103.
    pub const fn tag_103(&self) -> u32 {
        match self {
            RejectCode::UnknownSymbol => 1,
            RejectCode::ExceedsLimit => 3,
            RejectCode::DuplicateOrder => 6,
            RejectCode::Other => 99,
        }
    }
}

/// A pre-trade rejection: display text goes to FIX tag 58, [`RejectCode`]
/// to tag 103.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdmissionReject {
    #[error("Symbol is required")]
    MissingSymbol,
    #[error("Invalid side (must be 1=Buy or 2=Sell)")]
    InvalidSide,
    #[error("OrderQty must be positive")]
    NonPositiveQty,
    #[error("Price must be positive for limit orders")]
    NonPositivePrice,
    #[error("Order quantity exceeds limit ({0})")]
    QtyExceedsLimit(i64),
    #[error("Notional exceeds limit (${0})")]
    NotionalExceedsLimit(i64),
    #[error("Duplicate ClOrdID")]
    DuplicateClOrdId,
}

impl AdmissionReject {
    /// The OrdRejReason paired with this rejection.
    pub const fn code(&self) -> RejectCode {
        match self {
            AdmissionReject::MissingSymbol => RejectCode::UnknownSymbol,
            AdmissionReject::InvalidSide
            | AdmissionReject::NonPositiveQty
            | AdmissionReject::NonPositivePrice => RejectCode::Other,
            AdmissionReject::QtyExceedsLimit(_) | AdmissionReject::NotionalExceedsLimit(_) => {
                RejectCode::ExceedsLimit
            }
            AdmissionReject::DuplicateClOrdId => RejectCode::DuplicateOrder,
        }
    }
}

/// Static pre-trade limits.
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    pub max_order_qty: i64,
    pub max_notional: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_qty: 10_000,
            max_notional: 1_000_000.0,
        }
    }
}

/// The fields of an order that admission inspects.
///
/// `side` is `None` when the wire value was not a legal side; `price` is
/// `None` when the message carried no price tag.
#[derive(Debug, Clone)]
pub struct AdmissionIntent<'a> {
    pub cl_ord_id: &'a str,
    pub symbol: &'a str,
    pub side: Option<Side>,
    pub quantity: i64,
    pub price: Option<f64>,
}

/// Context available to checks.
pub struct AdmissionContext<'a> {
    pub store: &'a OrderStore,
    pub limits: &'a RiskLimits,
}

/// One pre-trade check.
pub trait AdmissionCheck: Send + Sync {
    /// Name for logging and diagnostics.
    fn name(&self) -> &str;

    fn check(
        &self,
        intent: &AdmissionIntent<'_>,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionReject>;
}

struct SymbolPresent;
impl AdmissionCheck for SymbolPresent {
    fn name(&self) -> &str {
        "symbol_present"
    }
    fn check(
        &self,
        intent: &AdmissionIntent<'_>,
        _ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionReject> {
        if intent.symbol.is_empty() {
            return Err(AdmissionReject::MissingSymbol);
        }
        Ok(())
    }
}

struct SideValid;
impl AdmissionCheck for SideValid {
    fn name(&self) -> &str {
        "side_valid"
    }
    fn check(
        &self,
        intent: &AdmissionIntent<'_>,
        _ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionReject> {
        if intent.side.is_none() {
            return Err(AdmissionReject::InvalidSide);
        }
        Ok(())
    }
}

struct QtyPositive;
impl AdmissionCheck for QtyPositive {
    fn name(&self) -> &str {
        "qty_positive"
    }
    fn check(
        &self,
        intent: &AdmissionIntent<'_>,
        _ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionReject> {
        if intent.quantity <= 0 {
            return Err(AdmissionReject::NonPositiveQty);
        }
        Ok(())
    }
}

struct PricePositive;
impl AdmissionCheck for PricePositive {
    fn name(&self) -> &str {
        "price_positive"
    }
    fn check(
        &self,
        intent: &AdmissionIntent<'_>,
        _ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionReject> {
        if matches!(intent.price, Some(px) if px <= 0.0) {
            return Err(AdmissionReject::NonPositivePrice);
        }
        Ok(())
    }
}

struct QtyWithinLimit;
impl AdmissionCheck for QtyWithinLimit {
    fn name(&self) -> &str {
        "qty_within_limit"
    }
    fn check(
        &self,
        intent: &AdmissionIntent<'_>,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionReject> {
        if intent.quantity > ctx.limits.max_order_qty {
            return Err(AdmissionReject::QtyExceedsLimit(ctx.limits.max_order_qty));
        }
        Ok(())
    }
}

struct NotionalWithinLimit;
impl AdmissionCheck for NotionalWithinLimit {
    fn name(&self) -> &str {
        "notional_within_limit"
    }
    fn check(
        &self,
        intent: &AdmissionIntent<'_>,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionReject> {
        if let Some(px) = intent.price {
            if intent.quantity as f64 * px > ctx.limits.max_notional {
                return Err(AdmissionReject::NotionalExceedsLimit(
                    ctx.limits.max_notional as i64,
                ));
            }
        }
        Ok(())
    }
}

struct NotDuplicate;
impl AdmissionCheck for NotDuplicate {
    fn name(&self) -> &str {
        "not_duplicate"
    }
    fn check(
        &self,
        intent: &AdmissionIntent<'_>,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionReject> {
        if ctx.store.exists(intent.cl_ord_id) {
            return Err(AdmissionReject::DuplicateClOrdId);
        }
        Ok(())
    }
}

/// Runs the admission checks in order; the first failure short-circuits.
pub struct AdmissionPipeline {
    checks: Vec<Box<dyn AdmissionCheck>>,
}

impl AdmissionPipeline {
    /// The standard seven-check pipeline in contract order.
    pub fn standard() -> Self {
        Self {
            checks: vec![
                Box::new(SymbolPresent),
                Box::new(SideValid),
                Box::new(QtyPositive),
                Box::new(PricePositive),
                Box::new(QtyWithinLimit),
                Box::new(NotionalWithinLimit),
                Box::new(NotDuplicate),
            ],
        }
    }

    /// Evaluate all checks against the intent.
    pub fn evaluate(
        &self,
        intent: &AdmissionIntent<'_>,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionReject> {
        for check in &self.checks {
            check.check(intent, ctx)?;
        }
        Ok(())
    }

    /// Number of registered checks.
    pub fn check_count(&self) -> usize {
        self.checks.len()
    }
}

impl Default for AdmissionPipeline {
    fn default() -> Self {
        Self::standard()
    }
}
