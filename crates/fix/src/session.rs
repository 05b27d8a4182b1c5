//! TCP acceptor with a minimal session layer.
//!
//! Enough FIX session handling to drive the application from a real
//! initiator: Logon is answered and audited, TestRequest gets a Heartbeat
//! echoing the TestReqID, idle gaps produce Heartbeats, Logout is
//! confirmed. Sequence numbers are assigned monotonically on the way out
//! and ignored on the way in; resend and gap recovery are a session
//! library's job, not this gateway's.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use blotter_core::config::FixConfig;
use blotter_oms::{AuditEvent, AuditLog};

use crate::application::FixApplication;
use crate::codec::{encode, extract_frame, RawMessage};
use crate::fields::{msg_type, tags};
use crate::messages::AppMessage;

/// Bind the acceptor socket. Called at startup so a bind failure is
/// fatal at boot rather than a background log line.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind FIX acceptor on port {}", port))?;
    tracing::info!(port, "FIX acceptor listening");
    Ok(listener)
}

/// Accept FIX initiator connections until cancelled.
pub async fn run_acceptor(
    listener: TcpListener,
    cfg: FixConfig,
    app: Arc<FixApplication>,
    audit: Arc<AuditLog>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!(%peer, "FIX connection accepted");
                        let cfg = cfg.clone();
                        let app = Arc::clone(&app);
                        let audit = Arc::clone(&audit);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            if let Err(e) = run_session(stream, cfg, app, audit, cancel).await {
                                tracing::warn!(%peer, error = %e, "FIX session ended with error");
                            } else {
                                tracing::info!(%peer, "FIX session closed");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                }
            }
        }
    }

    Ok(())
}

struct SessionState {
    out_seq: u64,
}

impl SessionState {
    fn next_seq(&mut self) -> u64 {
        let seq = self.out_seq;
        self.out_seq += 1;
        seq
    }
}

async fn run_session(
    mut stream: TcpStream,
    cfg: FixConfig,
    app: Arc<FixApplication>,
    audit: Arc<AuditLog>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(8 * 1024);
    let mut state = SessionState { out_seq: 1 };
    let heartbeat = Duration::from_secs(cfg.heartbeat_secs);
    let mut ticker = tokio::time::interval(heartbeat);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.reset();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                send(&mut stream, &cfg, &mut state, msg_type::LOGOUT, &[]).await?;
                break;
            }
            _ = ticker.tick() => {
                send(&mut stream, &cfg, &mut state, msg_type::HEARTBEAT, &[]).await?;
            }
            read = stream.read_buf(&mut buf) => {
                let n = read.context("read from FIX peer failed")?;
                if n == 0 {
                    break;
                }

                while let Some(frame) = extract_frame(&mut buf) {
                    let raw = match RawMessage::parse(&frame) {
                        Ok(raw) => raw,
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping unparseable FIX frame");
                            continue;
                        }
                    };

                    if handle_frame(&mut stream, &cfg, &mut state, &app, &audit, &raw).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Handle one inbound message. Returns `true` when the session should end.
async fn handle_frame(
    stream: &mut TcpStream,
    cfg: &FixConfig,
    state: &mut SessionState,
    app: &FixApplication,
    audit: &AuditLog,
    raw: &RawMessage,
) -> Result<bool> {
    match raw.msg_type() {
        Some(msg_type::LOGON) => {
            if let Err(e) = audit.record(
                AuditEvent::FixLogon,
                raw.get(tags::SENDER_COMP_ID).unwrap_or("?"),
                "",
            ) {
                tracing::error!(error = %e, "audit write failed");
            }
            let body = vec![
                (tags::ENCRYPT_METHOD, "0".to_string()),
                (tags::HEART_BT_INT, cfg.heartbeat_secs.to_string()),
            ];
            send(stream, cfg, state, msg_type::LOGON, &body).await?;
            Ok(false)
        }
        Some(msg_type::HEARTBEAT) => Ok(false),
        Some(msg_type::TEST_REQUEST) => {
            let body = match raw.get(tags::TEST_REQ_ID) {
                Some(id) => vec![(tags::TEST_REQ_ID, id.to_string())],
                None => vec![],
            };
            send(stream, cfg, state, msg_type::HEARTBEAT, &body).await?;
            Ok(false)
        }
        Some(msg_type::LOGOUT) => {
            if let Err(e) = audit.record(
                AuditEvent::FixLogout,
                raw.get(tags::SENDER_COMP_ID).unwrap_or("?"),
                "",
            ) {
                tracing::error!(error = %e, "audit write failed");
            }
            send(stream, cfg, state, msg_type::LOGOUT, &[]).await?;
            Ok(true)
        }
        Some(msg_type::NEW_ORDER_SINGLE) | Some(msg_type::ORDER_CANCEL_REQUEST) => {
            match AppMessage::decode(raw) {
                Ok(Some(msg)) => {
                    for outbound in app.handle(msg) {
                        let fields = outbound.to_fields();
                        send(stream, cfg, state, outbound.msg_type(), &fields).await?;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed application message");
                }
            }
            Ok(false)
        }
        other => {
            tracing::debug!(msg_type = ?other, "ignoring unsupported message type");
            Ok(false)
        }
    }
}

async fn send(
    stream: &mut TcpStream,
    cfg: &FixConfig,
    state: &mut SessionState,
    msg_type: &str,
    body: &[(u32, String)],
) -> Result<()> {
    let bytes = encode(
        msg_type,
        &cfg.sender_comp_id,
        &cfg.target_comp_id,
        state.next_seq(),
        body,
    );
    stream
        .write_all(&bytes)
        .await
        .context("write to FIX peer failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blotter_bus::EventBus;
    use blotter_oms::OrderStore;
    use blotter_risk::RiskLimits;
    use blotter_sim::MarketSim;

    async fn start_test_acceptor() -> (u16, CancellationToken, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::open(dir.path().join("audit.log")).unwrap());
        let store = Arc::new(OrderStore::new());
        let market = Arc::new(MarketSim::with_seed(42));
        let bus = Arc::new(EventBus::new());
        let app = Arc::new(FixApplication::new(
            store,
            market,
            bus,
            Arc::clone(&audit),
            RiskLimits::default(),
        ));

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let cfg = FixConfig {
            port,
            sender_comp_id: "BLOTTER".to_string(),
            target_comp_id: "CLIENT".to_string(),
            heartbeat_secs: 30,
        };

        let cancel = CancellationToken::new();
        let acceptor_cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = run_acceptor(listener, cfg, app, audit, acceptor_cancel).await;
        });
        (port, cancel, dir)
    }

    async fn read_one_message(stream: &mut TcpStream, buf: &mut BytesMut) -> RawMessage {
        loop {
            if let Some(frame) = extract_frame(buf) {
                return RawMessage::parse(&frame).unwrap();
            }
            let n = stream.read_buf(buf).await.unwrap();
            assert!(n > 0, "peer closed before a full frame arrived");
        }
    }

    #[tokio::test]
    async fn test_logon_then_order_then_logout() {
        let (port, cancel, _dir) = start_test_acceptor().await;
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut buf = BytesMut::new();

        // Logon
        let logon = encode(
            msg_type::LOGON,
            "CLIENT",
            "BLOTTER",
            1,
            &[
                (tags::ENCRYPT_METHOD, "0".to_string()),
                (tags::HEART_BT_INT, "30".to_string()),
            ],
        );
        stream.write_all(&logon).await.unwrap();
        let reply = read_one_message(&mut stream, &mut buf).await;
        assert_eq!(reply.msg_type(), Some("A"));

        // New order (buy limit far below market: plain ack, no fill)
        let order = encode(
            msg_type::NEW_ORDER_SINGLE,
            "CLIENT",
            "BLOTTER",
            2,
            &[
                (tags::CL_ORD_ID, "wire-1".to_string()),
                (tags::SYMBOL, "AAPL".to_string()),
                (tags::SIDE, "1".to_string()),
                (tags::ORDER_QTY, "100".to_string()),
                (tags::PRICE, "1.0".to_string()),
                (tags::ORD_TYPE, "2".to_string()),
            ],
        );
        stream.write_all(&order).await.unwrap();
        let ack = read_one_message(&mut stream, &mut buf).await;
        assert_eq!(ack.msg_type(), Some("8"));
        assert_eq!(ack.get(tags::CL_ORD_ID), Some("wire-1"));
        assert_eq!(ack.get(tags::EXEC_TYPE), Some("0"));
        assert_eq!(ack.get(tags::LEAVES_QTY), Some("100"));

        // Logout
        let logout = encode(msg_type::LOGOUT, "CLIENT", "BLOTTER", 3, &[]);
        stream.write_all(&logout).await.unwrap();
        let bye = read_one_message(&mut stream, &mut buf).await;
        assert_eq!(bye.msg_type(), Some("5"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_test_request_echoes_heartbeat() {
        let (port, cancel, _dir) = start_test_acceptor().await;
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut buf = BytesMut::new();

        let test_req = encode(
            msg_type::TEST_REQUEST,
            "CLIENT",
            "BLOTTER",
            1,
            &[(tags::TEST_REQ_ID, "ping-1".to_string())],
        );
        stream.write_all(&test_req).await.unwrap();

        let reply = read_one_message(&mut stream, &mut buf).await;
        assert_eq!(reply.msg_type(), Some("0"));
        assert_eq!(reply.get(tags::TEST_REQ_ID), Some("ping-1"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_cancel_reject_over_the_wire() {
        let (port, cancel, _dir) = start_test_acceptor().await;
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut buf = BytesMut::new();

        let cxl = encode(
            msg_type::ORDER_CANCEL_REQUEST,
            "CLIENT",
            "BLOTTER",
            1,
            &[
                (tags::ORIG_CL_ORD_ID, "never-existed".to_string()),
                (tags::CL_ORD_ID, "cxl-1".to_string()),
                (tags::SYMBOL, "AAPL".to_string()),
                (tags::SIDE, "1".to_string()),
            ],
        );
        stream.write_all(&cxl).await.unwrap();

        let reply = read_one_message(&mut stream, &mut buf).await;
        assert_eq!(reply.msg_type(), Some("9"));
        assert_eq!(reply.get(tags::ORDER_ID), Some("UNKNOWN"));
        assert_eq!(reply.get(tags::CXL_REJ_REASON), Some("1"));

        cancel.cancel();
    }
}
