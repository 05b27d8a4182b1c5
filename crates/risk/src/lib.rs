//! # blotter-risk
//!
//! Pre-trade admission. Every inbound order passes through an ordered
//! sequence of checks before it may enter the store; the first failure
//! short-circuits and carries both the human-readable reject text (FIX
//! tag 58) and the OrdRejReason code (tag 103).

pub mod admission;

pub use admission::{
    AdmissionCheck, AdmissionContext, AdmissionIntent, AdmissionPipeline, AdmissionReject,
    RejectCode, RiskLimits,
};
