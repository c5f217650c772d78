//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Pseudonym using clap.

pub mod commands;

use crate::domain::PseudonymError;
use clap::{Parser, Subcommand};

/// Command completed
pub const EXIT_SUCCESS: i32 = 0;
/// Operation failed (I/O, unknown session, detector setup)
pub const EXIT_FAILURE: i32 = 1;
/// The replacement plan failed its integrity check; nothing was written
pub const EXIT_INTEGRITY: i32 = 2;
/// Configuration could not be loaded or is invalid
pub const EXIT_CONFIG: i32 = 4;
/// Logging could not be initialized
pub const EXIT_LOGGING: i32 = 5;

/// Pseudonym - personal data pseudonymization for legal documents
#[derive(Parser, Debug)]
#[command(name = "pseudonym")]
#[command(version, about, long_about = None)]
#[command(author = "Pseudonym Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "pseudonym.toml", env = "PSEUDONYM_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PSEUDONYM_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect entities in a document and store them in a review session
    Analyze(commands::analyze::AnalyzeArgs),

    /// Rewrite the document of a reviewed session
    Anonymize(commands::anonymize::AnonymizeArgs),

    /// Analyze and rewrite in one step, replacing every detected entity
    Run(commands::run::RunArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

impl Commands {
    /// Whether the command runs without a loaded configuration
    pub fn is_standalone(&self) -> bool {
        matches!(self, Commands::ValidateConfig(_) | Commands::Init(_))
    }
}

/// Map a command error to its process exit code
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    let domain = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<PseudonymError>());

    match domain {
        Some(e) if e.is_integrity_failure() => EXIT_INTEGRITY,
        Some(PseudonymError::Configuration(_)) => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}
