//! Engine wiring and lifecycle.
//!
//! [`Gateway::new`] builds every component from configuration; startup
//! failures there (audit log, config) are fatal and surface as exit code 1.
//! [`Gateway::run`] restores persisted state, starts the workers and the
//! two network surfaces, then blocks until SIGINT/SIGTERM and shuts
//! everything down in reverse order, finishing with a final snapshot save.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use blotter_bus::EventBus;
use blotter_core::config::AppConfig;
use blotter_fix::FixApplication;
use blotter_oms::{AuditLog, OrderStore, Persistence};
use blotter_risk::RiskLimits;
use blotter_sim::MarketSim;

use crate::feed::MarketDataFeed;
use crate::fill_loop::FillLoop;
use crate::handlers::UiHandlers;
use crate::server::{self, ServerState};

/// The assembled gateway.
pub struct Gateway {
    config: AppConfig,
    store: Arc<OrderStore>,
    market: Arc<MarketSim>,
    bus: Arc<EventBus>,
    audit: Arc<AuditLog>,
    persistence: Arc<Persistence>,
    handlers: Arc<UiHandlers>,
    fix_app: Arc<FixApplication>,
    cancel: CancellationToken,
}

impl Gateway {
    /// Build all components. Fails fast when the audit log cannot open.
    pub fn new(config: AppConfig) -> Result<Self> {
        if let Some(dir) = config.audit.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }

        let audit = Arc::new(AuditLog::open(&config.audit.path)?);
        let store = Arc::new(OrderStore::new());
        let market = Arc::new(MarketSim::new(
            config.sim.seed,
            config.sim.start_price,
            config.sim.step,
        ));
        let bus = Arc::new(EventBus::new());
        let persistence = Arc::new(Persistence::new(
            config.persistence.path.clone(),
            Duration::from_secs(config.persistence.save_interval_secs),
        ));

        let limits = RiskLimits {
            max_order_qty: config.risk.max_order_qty,
            max_notional: config.risk.max_notional,
        };

        let handlers = Arc::new(UiHandlers::new(
            Arc::clone(&store),
            Arc::clone(&market),
            Arc::clone(&bus),
            Arc::clone(&audit),
            limits,
        ));
        let fix_app = Arc::new(FixApplication::new(
            Arc::clone(&store),
            Arc::clone(&market),
            Arc::clone(&bus),
            Arc::clone(&audit),
            limits,
        ));

        Ok(Self {
            config,
            store,
            market,
            bus,
            audit,
            persistence,
            handlers,
            fix_app,
            cancel: CancellationToken::new(),
        })
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(self) -> Result<()> {
        // ── Restore persisted orders ─────────────────────────────
        {
            let store = Arc::clone(&self.store);
            self.persistence
                .load(move |record| store.upsert(record))
                .context("failed to load persisted snapshot")?;
        }

        if let Err(e) = self.audit.system(
            "SYS_START",
            &format!(
                "http_port={},fix_port={}",
                self.config.http.port, self.config.fix.port
            ),
        ) {
            tracing::error!(error = %e, "audit write failed");
        }

        // ── Workers ──────────────────────────────────────────────
        self.persistence.start(Arc::clone(&self.store));

        let fill_loop = Arc::new(FillLoop::new(
            Arc::clone(&self.store),
            Arc::clone(&self.market),
            Arc::clone(&self.bus),
            Arc::clone(&self.audit),
            Duration::from_millis(self.config.feed.fill_interval_ms),
        ));
        fill_loop.start();

        let feed = Arc::new(MarketDataFeed::new(
            Arc::clone(&self.market),
            Arc::clone(&self.bus),
            self.config.feed.symbols.clone(),
            Duration::from_millis(self.config.feed.tick_interval_ms),
        ));
        feed.start();

        // ── Network surfaces ─────────────────────────────────────
        let server_state = Arc::new(ServerState {
            store: Arc::clone(&self.store),
            market: Arc::clone(&self.market),
            bus: Arc::clone(&self.bus),
            handlers: Arc::clone(&self.handlers),
        });
        let http_port = self.config.http.port;
        let http_cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = server::run_server(server_state, http_port, http_cancel).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        });

        let fix_listener = blotter_fix::session::bind(self.config.fix.port)
            .await
            .context("FIX acceptor startup failed")?;
        let fix_cfg = self.config.fix.clone();
        let fix_app = Arc::clone(&self.fix_app);
        let fix_audit = Arc::clone(&self.audit);
        let fix_cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = blotter_fix::session::run_acceptor(
                fix_listener,
                fix_cfg,
                fix_app,
                fix_audit,
                fix_cancel,
            )
            .await
            {
                tracing::error!(error = %e, "FIX acceptor failed");
            }
        });

        tracing::info!(
            http_port = self.config.http.port,
            fix_port = self.config.fix.port,
            symbols = ?self.config.feed.symbols,
            "gateway started"
        );

        // ── Wait for shutdown ────────────────────────────────────
        wait_for_shutdown(&self.cancel).await;
        tracing::info!("shutdown signal received");

        // ── Orderly teardown: stop intake, then workers, then the
        //    final snapshot save.
        self.cancel.cancel();
        feed.stop();
        fill_loop.stop();
        self.persistence.stop();

        if let Err(e) = self.audit.system("SYS_STOP", "gateway shutting down") {
            tracing::error!(error = %e, "audit write failed");
        }

        tracing::info!("gateway stopped");
        Ok(())
    }
}

async fn wait_for_shutdown(cancel: &CancellationToken) {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
            _ = cancel.cancelled() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = cancel.cancelled() => {}
        }
    }
}
