//! Layered configuration for the blotter gateway.
//!
//! Configuration is loaded in layers with increasing priority:
//! 1. Compiled-in defaults (local ports, conservative risk limits)
//! 2. TOML configuration file (if provided)
//! 3. Environment variable overrides (prefix `BLOTTER_`, nested with `__`,
//!    e.g. `BLOTTER_RISK__MAX_NOTIONAL=500000`)

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

// ── Default value functions ────────────────────────────────────────────

/// Default HTTP port: 8080.
fn default_http_port() -> u16 {
    8080
}

/// Default FIX acceptor port: 5001.
fn default_fix_port() -> u16 {
    5001
}

/// Default FIX heartbeat interval: 30 s.
fn default_heartbeat_secs() -> u64 {
    30
}

/// Default simulator seed: 42.
fn default_sim_seed() -> u64 {
    42
}

/// Default starting price for unknown tickers: 100.0.
fn default_start_price() -> f64 {
    100.0
}

/// Default random-walk step: 0.05.
fn default_step() -> f64 {
    0.05
}

/// Default maximum order quantity: 10 000 shares.
fn default_max_order_qty() -> i64 {
    10_000
}

/// Default maximum notional: 1 000 000 currency units.
fn default_max_notional() -> f64 {
    1_000_000.0
}

/// Default persistence save interval: 5 s.
fn default_save_interval_secs() -> u64 {
    5
}

/// Default market-data tick interval: 250 ms (4 Hz).
fn default_tick_interval_ms() -> u64 {
    250
}

/// Default fill-loop interval: 500 ms.
fn default_fill_interval_ms() -> u64 {
    500
}

// ── Configuration structs ──────────────────────────────────────────────

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    pub http: HttpConfig,
    /// FIX acceptor settings.
    pub fix: FixConfig,
    /// Market simulator parameters.
    pub sim: SimConfig,
    /// Pre-trade risk limits.
    pub risk: RiskConfig,
    /// Snapshot persistence settings.
    pub persistence: PersistenceConfig,
    /// Audit trail settings.
    pub audit: AuditConfig,
    /// Market-data feed and fill-loop cadence.
    pub feed: FeedConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// FIX acceptor configuration.
///
/// The session layer here is deliberately thin: one acceptor port, fixed
/// CompIDs, heartbeat interval. Sequence-number recovery is not handled.
#[derive(Debug, Clone, Deserialize)]
pub struct FixConfig {
    #[serde(default = "default_fix_port")]
    pub port: u16,
    /// Our CompID (tag 49 on outbound messages).
    pub sender_comp_id: String,
    /// The counterparty CompID (tag 56 on outbound messages).
    pub target_comp_id: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

/// Market simulator parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// RNG seed. Identical seeds produce identical price paths.
    #[serde(default = "default_sim_seed")]
    pub seed: u64,
    #[serde(default = "default_start_price")]
    pub start_price: f64,
    #[serde(default = "default_step")]
    pub step: f64,
}

/// Pre-trade risk limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Maximum single-order quantity.
    #[serde(default = "default_max_order_qty")]
    pub max_order_qty: i64,
    /// Maximum order notional (price * quantity) at admission.
    #[serde(default = "default_max_notional")]
    pub max_notional: f64,
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Canonical snapshot file; `<path>.tmp` is reserved by the writer.
    pub path: PathBuf,
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,
}

/// Audit trail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Append-only audit file. Failure to open is fatal at boot.
    pub path: PathBuf,
}

/// Feed cadence and symbol universe.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Symbols the market-data feed ticks.
    pub symbols: Vec<String>,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_fill_interval_ms")]
    pub fill_interval_ms: u64,
}

impl AppConfig {
    /// Load configuration using layered sources.
    ///
    /// 1. Compiled-in defaults.
    /// 2. TOML file at `config_path` (if `Some`).
    /// 3. Environment variable overrides with prefix `BLOTTER_` and `__` as
    ///    the nesting separator (e.g., `BLOTTER_HTTP__PORT=9090`).
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder()
            // ── Layer 1: compiled-in defaults ───────────────────────
            .set_default("http.port", default_http_port() as i64)?
            .set_default("fix.port", default_fix_port() as i64)?
            .set_default("fix.sender_comp_id", "BLOTTER")?
            .set_default("fix.target_comp_id", "CLIENT")?
            .set_default("fix.heartbeat_secs", default_heartbeat_secs() as i64)?
            .set_default("sim.seed", default_sim_seed() as i64)?
            .set_default("sim.start_price", default_start_price())?
            .set_default("sim.step", default_step())?
            .set_default("risk.max_order_qty", default_max_order_qty())?
            .set_default("risk.max_notional", default_max_notional())?
            .set_default("persistence.path", "data/orders.json")?
            .set_default(
                "persistence.save_interval_secs",
                default_save_interval_secs() as i64,
            )?
            .set_default("audit.path", "data/audit.log")?
            .set_default(
                "feed.symbols",
                vec!["AAPL", "GOOGL", "MSFT", "NVDA", "TSLA", "AMZN"],
            )?
            .set_default("feed.tick_interval_ms", default_tick_interval_ms() as i64)?
            .set_default("feed.fill_interval_ms", default_fill_interval_ms() as i64)?;

        // ── Layer 2: TOML file ─────────────────────────────────────
        if let Some(path) = config_path {
            let path_str = path.to_str().context("config path is not valid UTF-8")?;
            builder = builder.add_source(File::with_name(path_str).required(true));
        }

        // ── Layer 3: env var overrides (BLOTTER_ prefix) ───────────
        // The prefix separator must be set explicitly to `_` because the
        // `config` crate defaults it to the nesting separator when one is
        // provided.
        builder = builder.add_source(
            Environment::with_prefix("BLOTTER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate configuration invariants.
    fn validate(&self) -> Result<()> {
        if self.risk.max_order_qty <= 0 {
            bail!("risk.max_order_qty must be positive");
        }
        if self.risk.max_notional <= 0.0 {
            bail!("risk.max_notional must be positive");
        }
        if self.sim.step <= 0.0 {
            bail!("sim.step must be positive");
        }
        if self.sim.start_price <= 0.0 {
            bail!("sim.start_price must be positive");
        }
        if self.feed.symbols.is_empty() {
            bail!("feed.symbols must not be empty");
        }
        if self.feed.tick_interval_ms == 0 || self.feed.fill_interval_ms == 0 {
            bail!("feed intervals must be positive");
        }
        if self.fix.heartbeat_secs == 0 {
            bail!("fix.heartbeat_secs must be positive");
        }
        Ok(())
    }
}
