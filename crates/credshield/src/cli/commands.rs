//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Expose command arguments.
#[derive(Debug, Args)]
pub struct ExposeCommand {
    /// JSON file holding the record to expose
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// The record was just created; bring the keyboard forward if configured
    #[arg(long)]
    pub close_after_create: bool,

    /// Clipboard timeout in seconds (0 never clears), overriding the configuration
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the exposed channels as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        file: Option<PathBuf>,
    },
}
