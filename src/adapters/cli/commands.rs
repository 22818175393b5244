//! CLI Command Definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const DEFAULT_CONFIG: &str = "config/monad.toml";

/// capwatch - sell a token once its market cap crosses a threshold
#[derive(Parser, Debug)]
#[command(
    name = "capwatch",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Market-cap trigger bot for EVM lens markets",
    long_about = "capwatch polls a price lens for a set of tokens, converts each quote to a \
                  USD market cap, and sells the wallet's whole balance of a token once its \
                  market cap reaches the configured threshold. At most one sell per token \
                  per run."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the monitoring loop
    Run(RunCmd),

    /// Print the reference price and one snapshot per token, then exit
    Status(StatusCmd),

    /// Load and validate the configuration file
    CheckConfig(CheckConfigCmd),
}

impl Command {
    /// Configuration file the command reads
    pub fn config_path(&self) -> &PathBuf {
        match self {
            Command::Run(cmd) => &cmd.config,
            Command::Status(cmd) => &cmd.config,
            Command::CheckConfig(cmd) => &cmd.config,
        }
    }
}

/// Start monitoring loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Paper mode: quote sells but never submit transactions
    #[arg(short, long)]
    pub paper: bool,
}

/// One read-only cycle
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

/// Validate configuration
#[derive(Parser, Debug)]
pub struct CheckConfigCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        CliApp::command().debug_assert();
    }

    #[test]
    fn test_parse_run_paper() {
        let app = CliApp::parse_from(["capwatch", "run", "--paper", "-c", "bot.toml"]);
        match app.command {
            Command::Run(cmd) => {
                assert!(cmd.paper);
                assert_eq!(cmd.config, PathBuf::from("bot.toml"));
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_default_config_path() {
        let app = CliApp::parse_from(["capwatch", "--verbose", "status"]);
        assert!(app.verbose);
        match app.command {
            Command::Status(cmd) => assert_eq!(cmd.config, PathBuf::from(DEFAULT_CONFIG)),
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[test]
    fn test_check_config_subcommand_name() {
        let app = CliApp::parse_from(["capwatch", "check-config"]);
        assert!(matches!(app.command, Command::CheckConfig(_)));
    }
}
