// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the gateway binary.
//!
//! Every variant maps to a process exit code:
//!
//! | code | cause                                   |
//! |------|-----------------------------------------|
//! | 1    | configuration missing, unreadable or invalid |
//! | 2    | logging or signal handler setup         |
//! | 3    | summary output                          |
//! | 5    | protocol manager                        |

use thiserror::Error;

/// Result type alias for edge-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the gateway binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Neither a config file nor an in-memory config was given.
    #[error("No configuration provided")]
    MissingConfig,

    /// Loading or validating the configuration failed.
    #[error("Config error: {0}")]
    Config(#[from] edge_config::ConfigError),

    /// The tracing subscriber could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// An OS signal handler could not be registered.
    #[error("Cannot listen for {signal}: {source}")]
    Signal {
        /// Signal name.
        signal: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing a command's output failed.
    #[error("Output error: {0}")]
    Output(String),

    /// The protocol manager failed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] edge_opcua::OpcUaError),

    /// Another error with a description of what was being done.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a logging setup error.
    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }

    /// Creates a signal registration error.
    pub fn signal(signal: &'static str, source: std::io::Error) -> Self {
        Self::Signal { signal, source }
    }

    /// Creates an output error.
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingConfig | Self::Config(_) => 1,
            Self::Logging(_) | Self::Signal { .. } => 2,
            Self::Output(_) => 3,
            Self::Protocol(_) => 5,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Prints an error and its causes on stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {cause}");
        source = cause.source();
    }
}

/// Reports an error and exits with its code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_config::ConfigError;

    #[test]
    fn test_context_keeps_exit_code() {
        let err = BinError::from(ConfigError::file_not_found("edge.yaml")).with_context("failed to load edge.yaml");
        assert!(err.to_string().starts_with("failed to load edge.yaml: Config error:"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::MissingConfig.exit_code(), 1);
        assert_eq!(BinError::logging("already set").exit_code(), 2);
        let io = std::io::Error::other("denied");
        assert_eq!(BinError::signal("SIGTERM", io).exit_code(), 2);
        assert_eq!(BinError::output("broken pipe").exit_code(), 3);
        assert_eq!(
            BinError::from(edge_opcua::OpcUaError::invalid_request("x")).exit_code(),
            5
        );
    }

    #[test]
    fn test_signal_error_has_source() {
        let err = BinError::signal("SIGINT", std::io::Error::other("denied"));
        assert_eq!(err.to_string(), "Cannot listen for SIGINT: denied");
        assert!(std::error::Error::source(&err).is_some());
    }
}
