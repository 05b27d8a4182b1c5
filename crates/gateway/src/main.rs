//! Blotter gateway binary.
//!
//! Loads configuration, initializes tracing, and runs the [`Gateway`]
//! until SIGINT/SIGTERM. Exits 0 on a clean shutdown, 1 on any
//! unrecoverable startup or runtime error.

use std::path::PathBuf;

use clap::Parser;

use blotter_core::config::AppConfig;
use blotter_gateway::engine::Gateway;

/// Simulated equity-order gateway: FIX 4.4 acceptor + REST/SSE blotter.
#[derive(Parser, Debug)]
#[command(name = "blotter-gateway", about = "Simulated equity-order gateway")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config)?;

    blotter_core::logging::init_tracing(true);

    tracing::info!(
        http_port = config.http.port,
        fix_port = config.fix.port,
        seed = config.sim.seed,
        "starting blotter-gateway"
    );

    let gateway = Gateway::new(config)?;
    gateway.run().await
}
