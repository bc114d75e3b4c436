// splitstore - Versioned edits for records split across two PostgreSQL stores
// Copyright (c) 2025 Splitstore Contributors
// Licensed under the MIT License

use splitstore::cli::{Cli, Commands};
use splitstore::config::{config_path, LoggingConfig};
use splitstore::logging::init_logging;
use clap::Parser;
use std::path::Path;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Console-only logging for the CLI
    let log_level = cli.log_level.as_deref().unwrap_or("info");
    let _guard = match init_logging(log_level, &LoggingConfig::default()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "splitstore");

    let config = config_path(cli.config.as_deref());
    let exit_code = match execute_command(&cli, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5
        }
    };

    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, config: &Path) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Show(args) => args.execute(config).await,
        Commands::History(args) => args.execute(config).await,
        Commands::Demo(args) => args.execute(config).await,
        Commands::Edit(args) => args.execute(config).await,
        Commands::Pending(args) => args.execute(config).await,
        Commands::Init(args) => args.execute(config).await,
        Commands::ValidateConfig(args) => args.execute(config).await,
    }
}
