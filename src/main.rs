//! z/VM FCP Manager
//!
//! Serves the FCP Multipath Template & Device Allocation Engine over REST.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zvm_fcp_manager::{
    ApiServer, ApiServerConfig, DatabaseBackend, EngineConfig, Error, FcpEngine, Result,
    SelectionStrategy,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// z/VM FCP Manager - FCP multipath templates and device allocation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Engine configuration file (YAML)
    #[arg(long, env = "CONFIG")]
    config: Option<PathBuf>,

    /// Persist the FCP store to this JSON file
    #[arg(long, env = "DB_PATH")]
    db_path: Option<PathBuf>,

    /// YAML list of the FCP devices the fleet reports
    #[arg(long, env = "FCP_INVENTORY")]
    inventory: Option<PathBuf>,

    /// Pick every path's device at the same index
    #[arg(long, env = "FCP_SAME_INDEX")]
    same_index: bool,

    /// Fixed seed for device selection
    #[arg(long, env = "FCP_RNG_SEED")]
    rng_seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting z/VM FCP Manager");
    info!("  Version: {}", zvm_fcp_manager::VERSION);
    info!("  REST API: {}", args.api_addr);

    let config = load_config(&args)?;
    info!("  Selection strategy: {}", config.allocation.strategy);

    let engine = FcpEngine::from_config(&config)?;

    if engine.has_inventory() {
        match engine.sync_fcp_devices() {
            Ok(report) => info!(
                "Initial FCP sync: {} added, {} updated, {} deleted, {} not found",
                report.added.len(),
                report.updated.len(),
                report.deleted.len(),
                report.marked_notfound.len()
            ),
            Err(e) => warn!("Initial FCP sync failed: {}", e),
        }
    }

    let api_config = ApiServerConfig {
        rest_addr: args.api_addr.parse().map_err(|e| {
            Error::Configuration(format!("Invalid REST API address: {}", e))
        })?,
    };
    let api_server = std::sync::Arc::new(ApiServer::new(api_config, engine.clone()));

    let signal_server = api_server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let served = api_server.run().await;
    engine.close()?;
    served?;

    info!("FCP manager shutdown complete");
    Ok(())
}

/// Configuration file (or defaults) with command-line overrides applied
fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    if let Some(path) = &args.db_path {
        config.database.backend = DatabaseBackend::File { path: path.clone() };
    }
    if let Some(path) = &args.inventory {
        config.inventory_path = Some(path.clone());
    }
    if args.same_index {
        config.allocation.strategy = SelectionStrategy::SameIndex;
    }
    if args.rng_seed.is_some() {
        config.allocation.rng_seed = args.rng_seed;
    }
    Ok(config)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "tower=warn", "tower_http=info", "axum=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
