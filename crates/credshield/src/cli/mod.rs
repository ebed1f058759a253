//! Command-line interface for credshield.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{ConfigCommand, ExposeCommand};

/// credshield - Expose a credential record, then take it back
///
/// Offers a record's username and password as notifications and on the
/// clipboard, and its fields to the keyboard bridge, until every exposure is
/// dismissed, the clipboard timeout elapses, or the session is interrupted.
#[derive(Debug, Parser)]
#[command(name = "credshield")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Expose a record and wait until it is fully retracted
    Expose(ExposeCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Config(ConfigCommand::Path),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "credshield");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_expose() {
        let cli = Cli::try_parse_from(["credshield", "expose", "record.json"]).unwrap();
        let Command::Expose(cmd) = cli.command else {
            panic!("expected expose");
        };
        assert_eq!(cmd.file, PathBuf::from("record.json"));
        assert!(!cmd.close_after_create);
        assert!(cmd.timeout.is_none());
    }

    #[test]
    fn test_parse_expose_options() {
        let cli = Cli::try_parse_from([
            "credshield",
            "expose",
            "record.json",
            "--close-after-create",
            "--timeout",
            "5",
            "--json",
        ])
        .unwrap();
        let Command::Expose(cmd) = cli.command else {
            panic!("expected expose");
        };
        assert!(cmd.close_after_create);
        assert_eq!(cmd.timeout, Some(5));
        assert!(cmd.json);
    }

    #[test]
    fn test_parse_expose_requires_file() {
        assert!(Cli::try_parse_from(["credshield", "expose"]).is_err());
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from(["credshield", "config", "validate", "/tmp/c.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = Cli::try_parse_from(["credshield", "-c", "/custom/config.toml", "config", "show"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose_and_quiet() {
        let cli = Cli::try_parse_from(["credshield", "-vv", "config", "path"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["credshield", "-q", "config", "path"]).unwrap();
        assert!(cli.quiet);
    }
}
