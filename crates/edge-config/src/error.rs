// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while reading a gateway configuration.
//!
//! Loading fails at one of three stages and the variants follow them:
//!
//! ```text
//! locate file ──► FileNotFound / UnsupportedFormat / Io
//! parse text  ──► Parse / InvalidEnvVar
//! validate    ──► Validation (field is a dotted path, e.g. endpoints[1].uri)
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Gateway configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file is not valid YAML/TOML or does not match the schema.
    #[error("cannot parse {path}: {message}")]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A parsed value breaks a gateway rule.
    #[error("invalid value at {field}: {message}")]
    Validation {
        /// Dotted path of the offending setting.
        field: String,
        /// Which rule was broken.
        message: String,
    },

    /// The file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An `EDGE_*` override or `${VAR}` placeholder could not be applied.
    #[error("environment variable {name} rejected: {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Why the value was refused.
        message: String,
    },

    /// Nothing exists at the given path.
    #[error("no configuration file at {path}")]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file extension is not one of yaml, yml, toml or json.
    #[error("configuration format '{format}' is not supported")]
    UnsupportedFormat {
        /// Extension as found.
        format: String,
    },

    /// The in-memory configuration could not be written back out.
    #[error("cannot serialize configuration: {message}")]
    Serialization {
        /// Serializer message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error for a dotted settings path.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a read error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a missing file error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Where the problem is: a settings path, a variable name or a file.
    ///
    /// `None` for errors that are not tied to one location.
    pub fn subject(&self) -> Option<String> {
        match self {
            Self::Validation { field, .. } => Some(field.clone()),
            Self::InvalidEnvVar { name, .. } => Some(name.clone()),
            Self::Parse { path, .. } | Self::Io { path, .. } | Self::FileNotFound { path } => {
                Some(path.display().to_string())
            }
            Self::UnsupportedFormat { .. } | Self::Serialization { .. } => None,
        }
    }

    /// True when the file itself could not be opened.
    pub fn is_file_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::FileNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_names_the_setting() {
        let error = ConfigError::validation("endpoints[1].uri", "duplicate endpoint");
        assert_eq!(
            error.to_string(),
            "invalid value at endpoints[1].uri: duplicate endpoint"
        );
        assert_eq!(error.subject().as_deref(), Some("endpoints[1].uri"));

        let error = ConfigError::invalid_env_var("EDGE_LOG_LEVEL", "unknown level");
        assert_eq!(error.subject().as_deref(), Some("EDGE_LOG_LEVEL"));
        assert!(ConfigError::unsupported_format("ini").subject().is_none());
    }

    #[test]
    fn test_file_errors() {
        let error = ConfigError::io(
            "edge.yaml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(error.is_file_error());
        assert!(ConfigError::file_not_found("edge.yaml").is_file_error());
        assert!(!ConfigError::parse("edge.yaml", "bad indent").is_file_error());
    }
}
