//! Tycoon server entry point: loads configuration, installs logging, and
//! serves the room until a shutdown signal arrives.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::Context;
use clap::Parser;
use cli::CliArgs;
use config::AppConfig;
use std::time::Duration;
use tracing::{error, info};
use tycoon_server::TycoonServer;

/// Upper bound on how long shutdown waits for the accept loop to stop.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path).await?;
    config.apply_cli(&args);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    logging::setup_logging(&config.logging)?;

    let server_config = config.to_server_config()?;
    info!("🎲 Tycoon server v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration Summary:");
    info!("  🌐 Bind address: {}", server_config.bind_address);
    info!(
        "  👥 Connections per address: {}",
        server_config.max_connections_per_address
    );
    info!("  ⏱️ Idle timeout: {}s", server_config.idle_timeout_secs);
    info!(
        "  💰 Starting cash: ${} | Players: {}-{}",
        server_config.rules.starting_cash,
        server_config.rules.min_players,
        server_config.rules.max_players
    );

    let server = std::sync::Arc::new(TycoonServer::new(server_config)?);
    let listener = server.bind().context("binding listener")?;

    let serving = server.clone();
    let mut server_handle = tokio::spawn(async move { serving.serve(listener).await });

    info!("🛑 Press Ctrl+C to shut down");
    let signalled = tokio::select! {
        result = signals::wait_for_shutdown() => {
            result.context("installing signal handlers")?;
            true
        }
        joined = &mut server_handle => {
            joined.context("server task panicked")??;
            false
        }
    };

    if signalled {
        info!("🛑 Shutdown signal received, closing connections...");
        server.shutdown();
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server_handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!("❌ Server error during shutdown: {}", e),
            Ok(Err(e)) => error!("❌ Server task failed: {}", e),
            Err(_) => {
                error!("Accept loop did not stop in time");
                server_handle.abort();
            }
        }
    }

    info!("👋 Tycoon server stopped");
    Ok(())
}
