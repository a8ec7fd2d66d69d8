// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command line of `edge-gateway`.
//!
//! Global flags (`-c`, `-l`, `--log-format`, `-q`, `-v`) apply to every
//! subcommand. With no subcommand the gateway runs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use edge_config::{LogFormat, LogLevel, LoggingConfig};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Parsed command line.
#[derive(Parser, Debug)]
#[command(
    name = "edge-gateway",
    author = "Sylvex <contact@sylvex.io>",
    version = edge_core::VERSION,
    about = "OPC UA edge protocol gateway",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// YAML, TOML or JSON configuration file
    #[arg(short, long, default_value = "edge.yaml", env = "EDGE_CONFIG", global = true)]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); the configured level when absent
    #[arg(short, long, env = "EDGE_LOG_LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Log format (text, json, compact); the configured format when absent
    #[arg(long, env = "EDGE_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What to do; `run` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the server and auto-start client sessions, then wait for a signal
    Run(RunArgs),

    /// Load and check the configuration without opening any session
    Validate(ValidateArgs),

    /// Print crate versions and supported security policies
    Version(VersionArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Do not send START_CLIENT for auto-start endpoints
    #[arg(long)]
    pub skip_connect: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Also print the resolved configuration
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `version` command.
#[derive(Args, Debug, Clone, Default)]
pub struct VersionArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// How `validate` and `version` print their result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

// =============================================================================
// Effective Settings
// =============================================================================

impl Cli {
    /// Parses `std::env::args`, exiting on usage errors.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand, or `run` with default arguments.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Level after applying `-q`, `-v` and `-l` over the configured one.
    pub fn effective_log_level(&self, logging: &LoggingConfig) -> LogLevel {
        if self.quiet {
            LogLevel::Warn
        } else if self.verbose {
            LogLevel::Debug
        } else {
            self.log_level.unwrap_or(logging.level)
        }
    }

    /// Format after applying `--log-format` over the configured one.
    pub fn effective_log_format(&self, logging: &LoggingConfig) -> LogFormat {
        self.log_format.unwrap_or(logging.format)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["edge-gateway"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from(["edge-gateway", "run", "--skip-connect"]);
        match cli.command {
            Some(Commands::Run(args)) => assert!(args.skip_connect),
            other => panic!("Expected Run command, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["edge-gateway", "validate", "--show-config", "-f", "json"]);
        match cli.command {
            Some(Commands::Validate(args)) => {
                assert!(args.show_config);
                assert_eq!(args.format, OutputFormat::Json);
            }
            other => panic!("Expected Validate command, got {other:?}"),
        }
    }

    #[test]
    fn test_version_command() {
        let cli = Cli::parse_from(["edge-gateway", "version", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Version(VersionArgs { format: OutputFormat::Json }))
        ));
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["edge-gateway", "-c", "/etc/edge/edge.toml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/edge/edge.toml"));
    }

    #[test]
    fn test_log_overrides() {
        let logging = LoggingConfig::default();

        let cli = Cli::parse_from(["edge-gateway", "-l", "debug", "--log-format", "json"]);
        assert_eq!(cli.effective_log_level(&logging), LogLevel::Debug);
        assert_eq!(cli.effective_log_format(&logging), LogFormat::Json);

        let cli = Cli::parse_from(["edge-gateway", "-q", "-l", "trace"]);
        assert_eq!(cli.effective_log_level(&logging), LogLevel::Warn);

        let cli = Cli::parse_from(["edge-gateway", "-v"]);
        assert_eq!(cli.effective_log_level(&logging), LogLevel::Debug);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert!(Cli::try_parse_from(["edge-gateway", "-l", "loud"]).is_err());
    }
}
