// Pseudonym - Personal Data Pseudonymization for Legal Documents
// Copyright (c) 2025 Pseudonym Contributors
// Licensed under the MIT License

use clap::Parser;
use pseudonym::cli::{exit_code_for, Cli, Commands, EXIT_CONFIG, EXIT_LOGGING};
use pseudonym::config::{load_or_default, PseudonymConfig};
use pseudonym::log_error_with_context;
use pseudonym::logging::init_logging;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // validate-config and init report on the file themselves
    let config = if cli.command.is_standalone() {
        PseudonymConfig::default()
    } else {
        match load_or_default(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                process::exit(EXIT_CONFIG);
            }
        }
    };

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.application.log_level.clone());
    let guard = match init_logging(&log_level, &config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(EXIT_LOGGING);
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Pseudonym");

    let exit_code = match execute_command(&cli, &config).await {
        Ok(code) => code,
        Err(e) => {
            log_error_with_context!(format!("{e:#}"), "Command execution failed");
            eprintln!("Error: {e:#}");
            exit_code_for(&e)
        }
    };

    // process::exit skips destructors; flush the file writer first
    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, config: &PseudonymConfig) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Analyze(args) => args.execute(config).await,
        Commands::Anonymize(args) => args.execute(config).await,
        Commands::Run(args) => args.execute(config).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Init(args) => args.execute().await,
    }
}
