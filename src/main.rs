//! itemtrack - minimal item-tracking service

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use itemtrack::{
    cli::{Cli, Command},
    config::Config,
    gateway::Server,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::Config) => print_config(&config),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Load the config file/environment and apply CLI overrides
fn load_config(cli: &Cli) -> itemtrack::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    if cli.require_key {
        config.auth.enabled = true;
    }

    Ok(config)
}

/// Print the effective configuration
fn print_config(config: &Config) -> ExitCode {
    match config.to_redacted_yaml() {
        Ok(yaml) => {
            print!("{yaml}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to render configuration: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the server
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        auth = config.auth.enabled,
        "Starting itemtrack"
    );

    let server = match Server::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
