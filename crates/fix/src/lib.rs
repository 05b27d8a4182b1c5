//! # blotter-fix
//!
//! The FIX 4.4 order-entry surface: a tag=value codec, typed application
//! messages (NewOrderSingle in, ExecutionReport out), the admission and
//! cancel handler, and a thin TCP acceptor that speaks just enough of the
//! session layer (Logon, Heartbeat, TestRequest, Logout) to drive the
//! application. Sequence-number recovery and resend are deliberately not
//! handled.

pub mod application;
pub mod codec;
pub mod fields;
pub mod messages;
pub mod session;

pub use application::FixApplication;
pub use codec::{extract_frame, CodecError, RawMessage};
pub use messages::{AppMessage, ExecutionReport, NewOrderSingle, OrderCancelReject, OrderCancelRequest, Outbound};
