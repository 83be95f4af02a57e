//! # Gatekeeper - Verification Gate & Stock Bot Core
//!
//! Runs the verification state machine (captcha challenge -> role grant,
//! attempt limits, timed expiry) and the account stock distributor behind
//! an abstract chat-platform boundary.
//!
//! ## Architecture
//! ```text
//! Platform events -> Intent -> Bot -> Verifier -> Session Store
//!                                  -> Outcome Executor -> Platform
//!                                  -> Stock Store
//! ```

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod bot;
mod config;
mod intent;
mod logsink;
mod platform;
mod stock;
mod verify;

use bot::Bot;
use config::AppConfig;
use gatekeeper_common::{ChannelId, RoleId};
use logsink::EventLog;
use platform::{Capability, MemoryPlatform, run_console_loop};
use stock::StockStore;
use verify::{ChallengeCatalog, OutcomeExecutor, Verifier};

/// Gatekeeper - verification gate and stock bot core
#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gatekeeper.toml")]
    config: String,

    /// Session window in milliseconds (overrides config)
    #[arg(long, env = "WINDOW_MS")]
    window_ms: Option<u64>,

    /// Attempt cap (overrides config)
    #[arg(long, env = "MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Gatekeeper v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!(
        window_secs = config.window().as_secs(),
        max_attempts = config.max_attempts,
        catalog = config.catalog.len(),
        "Configuration loaded"
    );

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Console platform stands in for the host chat connection
    let platform = Arc::new(MemoryPlatform::rendering());
    let verified_role = RoleId(config.roles.verified.clone());
    let publisher_role = RoleId(config.roles.publisher.clone());
    let premium_role = RoleId(config.roles.premium.clone());
    platform.define_role(verified_role.clone(), 1);
    platform.define_role(premium_role.clone(), 2);
    platform.define_role(publisher_role.clone(), 5);
    platform.set_bot_rank(10);
    platform.allow(Capability::ManageRoles);
    platform.allow(Capability::KickMembers);

    // Assemble the core
    let log = Arc::new(EventLog::new(
        platform.clone(),
        config.log_channel.clone().map(ChannelId),
    ));
    let verifier = Arc::new(Verifier::new(
        ChallengeCatalog::new(config.catalog.clone()),
        config.window(),
        config.max_attempts,
        log.clone(),
    ));
    let executor = OutcomeExecutor::new(platform.clone(), verified_role.clone(), log.clone());
    let stock = StockStore::new(config.cooldown(), config.premium_cooldown());

    let bot = Arc::new(Bot::new(
        platform.clone(),
        verifier,
        executor,
        stock,
        log,
        verified_role,
        publisher_role,
        premium_role,
    ));

    // Drive the bot from the console surface
    let console = tokio::spawn(run_console_loop(
        bot,
        platform,
        shutdown_tx.subscribe(),
    ));

    info!("Gatekeeper ready");

    // Handle graceful shutdown
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        }
        _ = console => {}
    }

    info!("Gatekeeper shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
