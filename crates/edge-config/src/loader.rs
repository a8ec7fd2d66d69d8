// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw content
//! 3. Parse into [`GatewayConfig`]
//! 4. Apply environment variable overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! EDGE_GATEWAY_ID=edge-02
//! EDGE_GATEWAY_NAME="Line 2"
//! EDGE_LOG_LEVEL=debug
//! EDGE_LOG_FORMAT=json
//! EDGE_REQUEST_TIMEOUT_MS=5000
//! EDGE_CLIENT_ENGINE=opcua
//! ```
//!
//! Variables are read through an [`EnvLookup`], the process environment by
//! default, so callers can supply their own source.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::GatewayConfig;

/// Default prefix of override variables.
pub const DEFAULT_ENV_PREFIX: &str = "EDGE";

/// Source of environment variables.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn process_env() -> EnvLookup {
    Arc::new(|name| std::env::var(name).ok())
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use edge_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("edge.yaml").unwrap();
/// ```
#[derive(Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve placeholders and apply overrides.
    resolve_env_vars: bool,

    /// Environment variable source.
    env: EnvLookup,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            env: process_env(),
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Reads environment variables through `lookup`.
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Arc::new(lookup);
        self
    }

    /// Reads environment variables from a fixed map.
    pub fn with_env_map(self, vars: HashMap<String, String>) -> Self {
        self.with_env_lookup(move |name| vars.get(name).cloned())
    }

    /// Loads configuration from a file.
    ///
    /// The format is determined by the extension: `.yaml`/`.yml`, `.toml`
    /// or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let format = ConfigFormat::from_path(path)?;
        let content = read_file(path)?;
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(&content)
        } else {
            content
        };

        let mut config: GatewayConfig = parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        self.finish(&mut config)?;
        info!(
            gateway_id = %config.gateway.id,
            endpoints = config.endpoints.len(),
            server_enabled = config.server.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<GatewayConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        let mut config: GatewayConfig = parse_str(&content, format)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    fn finish(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        if self.resolve_env_vars {
            self.apply_env_overrides(config)?;
        }
        config.validate()
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.env)(name)
    }

    /// Resolves environment variable placeholders in content.
    ///
    /// Supports `${VAR_NAME}` and `${VAR_NAME:default}`. An unset variable
    /// without a default is left in place.
    pub fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match (self.var(var_name), default_value) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    warn!(variable = var_name, "Environment variable not found");
                    result.push_str(&format!("${{{var_name}}}"));
                }
            }
        }

        result
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        let prefix = &self.env_prefix;

        if let Some(value) = self.var(&format!("{prefix}_GATEWAY_ID")) {
            debug!(value = %value, "Overriding gateway.id");
            config.gateway.id = value;
        }
        if let Some(value) = self.var(&format!("{prefix}_GATEWAY_NAME")) {
            config.gateway.name = value;
        }

        let name = format!("{prefix}_LOG_LEVEL");
        if let Some(value) = self.var(&name) {
            config.logging.level = value
                .parse()
                .map_err(|e: String| ConfigError::invalid_env_var(&name, e))?;
        }

        let name = format!("{prefix}_LOG_FORMAT");
        if let Some(value) = self.var(&name) {
            config.logging.format = value
                .parse()
                .map_err(|e: String| ConfigError::invalid_env_var(&name, e))?;
        }

        let name = format!("{prefix}_REQUEST_TIMEOUT_MS");
        if let Some(value) = self.var(&name) {
            config.client.request_timeout_ms = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(&name, "expected a number of milliseconds"))?;
        }

        let name = format!("{prefix}_CLIENT_ENGINE");
        if let Some(value) = self.var(&name) {
            config.client.engine = value
                .parse()
                .map_err(|e: String| ConfigError::invalid_env_var(&name, e))?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("env_prefix", &self.env_prefix)
            .field("resolve_env_vars", &self.resolve_env_vars)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for ConfigLoader.
#[derive(Default)]
pub struct ConfigLoaderBuilder {
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
    env: Option<EnvLookup>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Sets the environment variable source.
    pub fn env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env = Some(lookup);
        self
    }

    /// Builds the ConfigLoader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(enabled) = self.resolve_env_vars {
            loader.resolve_env_vars = enabled;
        }
        if let Some(env) = self.env {
            loader.env = env;
        }
        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from the file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            "" => Err(ConfigError::unsupported_format("(no extension)")),
            other => Err(ConfigError::unsupported_format(other)),
        }
    }

    /// Returns the canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn read_file(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }
    fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
}

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the config crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<GatewayConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
