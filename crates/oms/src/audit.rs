//! Append-only audit trail.
//!
//! One pipe-delimited line per state-changing event:
//!
//! ```text
//! 2024-01-23T10:15:30.123Z|ORDER_NEW|abc-123|symbol=AAPL,side=Buy,qty=500
//! ```
//!
//! Every write is flushed before `record` returns, so a line that was
//! written survives a process kill intact. Writes are serialized under a
//! single lock; the file is opened in append mode so the trail accumulates
//! across restarts.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use blotter_core::time::utc_now_iso_millis;

/// The closed set of auditable order events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    OrderNew,
    OrderAck,
    OrderFilled,
    OrderPartial,
    OrderRejected,
    OrderCanceled,
    CancelRejected,
    OrderReplaced,
    ReplaceRejected,
    SysStart,
    SysStop,
    FixLogon,
    FixLogout,
}

impl AuditEvent {
    /// The wire tag written to the audit file.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::OrderNew => "ORDER_NEW",
            AuditEvent::OrderAck => "ORDER_ACK",
            AuditEvent::OrderFilled => "ORDER_FILLED",
            AuditEvent::OrderPartial => "ORDER_PARTIAL",
            AuditEvent::OrderRejected => "ORDER_REJECTED",
            AuditEvent::OrderCanceled => "ORDER_CANCELED",
            AuditEvent::CancelRejected => "CANCEL_REJECTED",
            AuditEvent::OrderReplaced => "ORDER_REPLACED",
            AuditEvent::ReplaceRejected => "REPLACE_REJECTED",
            AuditEvent::SysStart => "SYS_START",
            AuditEvent::SysStop => "SYS_STOP",
            AuditEvent::FixLogon => "FIX_LOGON",
            AuditEvent::FixLogout => "FIX_LOGOUT",
        }
    }
}

/// Append-only, flushed, timestamped event trail.
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl AuditLog {
    /// Open (or create) the audit file in append mode.
    ///
    /// Failure here is fatal at boot: a gateway without an audit trail must
    /// not accept orders.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open audit log at {}", path.display()))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one order event. The write is flushed before returning.
    pub fn record(&self, event: AuditEvent, cl_ord_id: &str, details: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        writeln!(
            writer,
            "{}|{}|{}|{}",
            utc_now_iso_millis(),
            event.as_str(),
            cl_ord_id,
            details
        )
        .context("failed to write audit record")?;
        writer.flush().context("failed to flush audit log")?;
        Ok(())
    }

    /// Append a system-level event (`SYSTEM|<event>|<details>` form).
    pub fn system(&self, event: &str, details: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        writeln!(
            writer,
            "{}|SYSTEM|{}|{}",
            utc_now_iso_millis(),
            event,
            details
        )
        .context("failed to write audit record")?;
        writer.flush().context("failed to flush audit log")?;
        Ok(())
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
