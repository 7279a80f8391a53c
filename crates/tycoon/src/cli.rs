//! Command-line interface for the Tycoon server.

use clap::Parser;
use std::path::PathBuf;

/// Command line arguments. Every option except `--config` overrides the
/// matching value from the configuration file.
#[derive(Debug, Clone, Parser)]
#[command(name = "tycoon", version, about = "Multiplayer property-trading board game server")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long = "config", value_name = "FILE", default_value = "config.toml")]
    pub config_path: PathBuf,

    /// Bind address (e.g., 0.0.0.0:8000)
    #[arg(short, long = "bind", value_name = "ADDRESS")]
    pub bind_address: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Live connections allowed from one client address
    #[arg(long = "max-per-address", value_name = "COUNT")]
    pub max_connections_per_address: Option<usize>,
}
