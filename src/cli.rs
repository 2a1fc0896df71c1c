//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Minimal item-tracking service with an optional shared-secret gate
#[derive(Parser, Debug)]
#[command(name = "itemtrack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "ITEMTRACK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Enforce the API key even if the config leaves the gate disabled
    #[arg(long)]
    pub require_key: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "ITEMTRACK_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "ITEMTRACK_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the server (default)
    Serve,

    /// Print the effective configuration as YAML (API key redacted)
    Config,
}
