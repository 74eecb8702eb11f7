//! Gatekeeper: adaptive access gate.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────────────┐
//!                     │                        GATEKEEPER                         │
//!                     │                                                           │
//!   Client Request    │  ┌────────┐   ┌──────────────────────────────────────┐    │
//!   ──────────────────┼─▶│  http  │──▶│ gate pipeline                        │    │
//!                     │  │ server │   │ blacklist → lockout → inspector →    │    │
//!                     │  └────────┘   │ rate limit → authentication          │    │
//!                     │               └──────────────┬───────────────────────┘    │
//!                     │                              │ pass                       │
//!   Client Response   │  ┌────────┐   ┌──────────────▼───┐                        │
//!   ◀─────────────────┼──│response│◀──│ upstream forward │◀───────────────────────┼──── Admin panel
//!                     │  └────────┘   └──────────────────┘                        │
//!                     │                                                           │
//!                     │  ┌─────────────────────────────────────────────────────┐  │
//!                     │  │ audit queue → worker ─┐                             │  │
//!                     │  │ blacklist refresh ────┼──▶ store (REST or memory)   │  │
//!                     │  │ admin API ────────────┘                             │  │
//!                     │  └─────────────────────────────────────────────────────┘  │
//!                     └───────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use gatekeeper::config::loader::load_config;
use gatekeeper::lifecycle::startup;
use gatekeeper::observability::logging;
use gatekeeper::GateConfig;

#[derive(Parser)]
#[command(name = "gatekeeper", version, about = "Adaptive access gate")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gatekeeper starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        store = ?config.store.backend,
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    startup::run(config).await?;
    Ok(())
}
