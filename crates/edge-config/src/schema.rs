// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for the edge gateway.
//!
//! # Schema Structure
//!
//! ```text
//! GatewayConfig
//! ├── gateway: GatewayIdentity
//! ├── dispatch: DispatchSettings
//! ├── logging: LoggingConfig
//! ├── client: ClientSettings
//! ├── endpoints: Vec<EndpointSettings>
//! └── server: ServerSettings
//!     └── namespaces: Vec<NamespaceSettings>
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use edge_core::{EndpointConfig, EndpointInfo, Variant, SECURITY_POLICY_NONE_URI};
use edge_opcua::{DispatchSettings, NodeItem};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Scheme prefix every endpoint URI must carry.
pub const OPC_TCP_PREFIX: &str = "opc.tcp://";

/// Default client application name.
pub const DEFAULT_APPLICATION_NAME: &str = "edge-opcua-client";

/// Default client application URI.
pub const DEFAULT_APPLICATION_URI: &str = "urn:edge:opcua:client";

/// Default request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

/// Default reconnect attempts of the `opcua` engine.
pub const DEFAULT_SESSION_RETRY_LIMIT: u32 = 3;

/// Default embedded server URI.
pub const DEFAULT_SERVER_URI: &str = "opc.tcp://0.0.0.0:12686/edge-server";

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration of a gateway instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Gateway identification.
    #[serde(default)]
    pub gateway: GatewayIdentity,

    /// Dispatch queue capacities.
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Client identity shared by every endpoint.
    #[serde(default)]
    pub client: ClientSettings,

    /// Remote endpoints.
    #[serde(default)]
    pub endpoints: Vec<EndpointSettings>,

    /// Embedded server.
    #[serde(default)]
    pub server: ServerSettings,
}

impl GatewayConfig {
    /// Validates the entire configuration.
    ///
    /// Checks a non-empty gateway id, a positive request timeout, endpoint
    /// URIs that use `opc.tcp://` and are unique, and a server URI plus
    /// unique namespace names when the server is enabled.
    pub fn validate(&self) -> ConfigResult<()> {
        self.gateway.validate()?;
        self.client.validate()?;

        let mut uris = HashSet::new();
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            endpoint.validate(i)?;
            if !uris.insert(endpoint.uri.as_str()) {
                return Err(ConfigError::validation(
                    format!("endpoints[{i}].uri"),
                    format!("duplicate endpoint '{}'", endpoint.uri),
                ));
            }
        }

        self.server.validate()?;
        Ok(())
    }

    /// Returns the endpoint settings for a URI.
    pub fn endpoint(&self, uri: &str) -> Option<&EndpointSettings> {
        self.endpoints.iter().find(|e| e.uri == uri)
    }

    /// Returns the endpoints started when the gateway starts.
    pub fn auto_start_endpoints(&self) -> impl Iterator<Item = &EndpointSettings> {
        self.endpoints.iter().filter(|e| e.auto_start)
    }
}

// =============================================================================
// Gateway Identity
// =============================================================================

/// Gateway identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayIdentity {
    /// Unique gateway identifier.
    pub id: String,

    /// Human-readable name.
    #[serde(default = "default_gateway_name")]
    pub name: String,
}

fn default_gateway_name() -> String {
    "Edge Gateway".to_string()
}

impl GatewayIdentity {
    /// Validates the gateway identity.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::validation("gateway.id", "cannot be empty"));
        }
        Ok(())
    }
}

impl Default for GatewayIdentity {
    fn default() -> Self {
        Self {
            id: "edge-01".to_string(),
            name: default_gateway_name(),
        }
    }
}

// =============================================================================
// Client Settings
// =============================================================================

/// Application identity and timeout used for every client session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSettings {
    /// Application name presented to servers.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI presented to servers.
    #[serde(default = "default_application_uri")]
    pub application_uri: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Engine that serves client sessions.
    #[serde(default)]
    pub engine: EngineKind,

    /// Certificate store of the `opcua` engine.
    #[serde(default)]
    pub pki_dir: Option<PathBuf>,

    /// Accept any server certificate (`opcua` engine).
    #[serde(default)]
    pub trust_server_certs: bool,

    /// Reconnect attempts after a lost connection (`opcua` engine).
    #[serde(default = "default_session_retry_limit")]
    pub session_retry_limit: u32,
}

fn default_application_name() -> String {
    DEFAULT_APPLICATION_NAME.to_string()
}

fn default_application_uri() -> String {
    DEFAULT_APPLICATION_URI.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_session_retry_limit() -> u32 {
    DEFAULT_SESSION_RETRY_LIMIT
}

impl ClientSettings {
    /// Validates the client settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "client.request_timeout_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Returns the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            application_uri: default_application_uri(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            engine: EngineKind::default(),
            pki_dir: None,
            trust_server_certs: false,
            session_retry_limit: DEFAULT_SESSION_RETRY_LIMIT,
        }
    }
}

/// Engine behind client sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-memory demo servers, one per configured endpoint.
    #[default]
    Simulated,
    /// Real servers through the `opcua` client.
    Opcua,
}

impl EngineKind {
    /// Returns the engine name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Simulated => "simulated",
            EngineKind::Opcua => "opcua",
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulated" | "simulator" => Ok(EngineKind::Simulated),
            "opcua" | "opc-ua" => Ok(EngineKind::Opcua),
            other => Err(format!("unknown engine '{other}'")),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Endpoint Settings
// =============================================================================

/// A remote endpoint the gateway talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSettings {
    /// Endpoint URI (`opc.tcp://host:port/name`).
    pub uri: String,

    /// Requested security policy URI.
    #[serde(default = "default_security_policy_uri")]
    pub security_policy_uri: String,

    /// Whether the address space is browsed once the session is active.
    #[serde(default = "default_true")]
    pub browse_address_space: bool,

    /// Whether START_CLIENT is sent for this endpoint at startup.
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

fn default_security_policy_uri() -> String {
    SECURITY_POLICY_NONE_URI.to_string()
}

fn default_true() -> bool {
    true
}

impl EndpointSettings {
    /// Creates settings for a URI with defaults.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            security_policy_uri: default_security_policy_uri(),
            browse_address_space: true,
            auto_start: true,
        }
    }

    /// Validates the endpoint at position `index`.
    pub fn validate(&self, index: usize) -> ConfigResult<()> {
        validate_opc_tcp_uri(&format!("endpoints[{index}].uri"), &self.uri)?;
        if self.security_policy_uri.trim().is_empty() {
            return Err(ConfigError::validation(
                format!("endpoints[{index}].security_policy_uri"),
                "cannot be empty",
            ));
        }
        Ok(())
    }

    /// Builds the endpoint info carried by START_CLIENT.
    pub fn to_endpoint_info(&self, client: &ClientSettings) -> EndpointInfo {
        let config = EndpointConfig::builder()
            .application_name(client.application_name.as_str())
            .application_uri(client.application_uri.as_str())
            .security_policy_uri(self.security_policy_uri.as_str())
            .request_timeout(client.request_timeout())
            .view_node_enabled(self.browse_address_space)
            .build();
        EndpointInfo::new(self.uri.as_str()).with_config(config)
    }
}

fn validate_opc_tcp_uri(field: &str, uri: &str) -> ConfigResult<()> {
    match uri.strip_prefix(OPC_TCP_PREFIX) {
        Some(rest) if !rest.is_empty() => Ok(()),
        Some(_) => Err(ConfigError::validation(field, "missing host")),
        None => Err(ConfigError::validation(
            field,
            format!("must start with {OPC_TCP_PREFIX}"),
        )),
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// Embedded server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Whether START_SERVER is sent at startup.
    #[serde(default)]
    pub enabled: bool,

    /// URI the server listens at.
    #[serde(default = "default_server_uri")]
    pub uri: String,

    /// Namespaces created once the server runs.
    #[serde(default)]
    pub namespaces: Vec<NamespaceSettings>,
}

fn default_server_uri() -> String {
    DEFAULT_SERVER_URI.to_string()
}

impl ServerSettings {
    /// Validates the server settings. Only checked when enabled.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.uri.trim().is_empty() {
            return Err(ConfigError::validation(
                "server.uri",
                "required when the server is enabled",
            ));
        }
        validate_opc_tcp_uri("server.uri", &self.uri)?;

        let mut names = HashSet::new();
        for (i, namespace) in self.namespaces.iter().enumerate() {
            namespace.validate(i)?;
            if !names.insert(namespace.name.as_str()) {
                return Err(ConfigError::validation(
                    format!("server.namespaces[{i}].name"),
                    format!("duplicate namespace '{}'", namespace.name),
                ));
            }
        }
        Ok(())
    }

    /// Builds the endpoint info carried by START_SERVER.
    pub fn to_endpoint_info(&self) -> EndpointInfo {
        EndpointInfo::new(self.uri.as_str())
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: default_server_uri(),
            namespaces: Vec::new(),
        }
    }
}

/// A namespace served by the embedded server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceSettings {
    /// Namespace URI.
    pub name: String,

    /// Node id of the root folder.
    pub root_node_id: String,

    /// Browse name of the root folder; the namespace name when absent.
    #[serde(default)]
    pub root_browse_name: Option<String>,

    /// Display name of the root folder; the browse name when absent.
    #[serde(default)]
    pub root_display_name: Option<String>,

    /// Variables created under the root folder.
    #[serde(default)]
    pub variables: Vec<VariableSettings>,
}

impl NamespaceSettings {
    fn validate(&self, index: usize) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation(
                format!("server.namespaces[{index}].name"),
                "cannot be empty",
            ));
        }
        if self.root_node_id.trim().is_empty() {
            return Err(ConfigError::validation(
                format!("server.namespaces[{index}].root_node_id"),
                "cannot be empty",
            ));
        }
        let mut names = HashSet::new();
        for variable in &self.variables {
            if !names.insert(variable.browse_name.as_str()) {
                return Err(ConfigError::validation(
                    format!("server.namespaces[{index}].variables"),
                    format!("duplicate browse name '{}'", variable.browse_name),
                ));
            }
        }
        Ok(())
    }

    /// Browse name of the root folder.
    pub fn root_browse_name(&self) -> &str {
        self.root_browse_name.as_deref().unwrap_or(&self.name)
    }

    /// Display name of the root folder.
    pub fn root_display_name(&self) -> &str {
        self.root_display_name
            .as_deref()
            .unwrap_or_else(|| self.root_browse_name())
    }

    /// Node items for the configured variables.
    pub fn node_items(&self) -> Vec<NodeItem> {
        self.variables
            .iter()
            .map(|v| {
                let mut item = NodeItem::variable(v.browse_name.as_str(), v.value.to_variant());
                if let Some(display_name) = &v.display_name {
                    item.display_name = display_name.clone();
                }
                item
            })
            .collect()
    }
}

/// A variable served by the embedded server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSettings {
    /// Browse name, unique within the namespace.
    pub browse_name: String,

    /// Display name; the browse name when absent.
    #[serde(default)]
    pub display_name: Option<String>,

    /// Initial value.
    pub value: ConfigValue,
}

/// A scalar value written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
}

impl ConfigValue {
    /// Converts to the variant written to the node.
    pub fn to_variant(&self) -> Variant {
        match self {
            ConfigValue::Bool(v) => Variant::Boolean(*v),
            ConfigValue::Integer(v) => Variant::Int64(*v),
            ConfigValue::Float(v) => Variant::Double(*v),
            ConfigValue::Text(v) => Variant::String(v.clone()),
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
    /// Compact single-line text.
    Compact,
}

impl LogFormat {
    /// Returns the format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_endpoints(uris: &[&str]) -> GatewayConfig {
        GatewayConfig {
            endpoints: uris.iter().map(|u| EndpointSettings::new(*u)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.client.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert!(!config.server.enabled);
    }

    #[test]
    fn test_empty_gateway_id_rejected() {
        let mut config = GatewayConfig::default();
        config.gateway.id = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "gateway.id"));
    }

    #[test]
    fn test_endpoint_uri_rules() {
        assert!(config_with_endpoints(&["opc.tcp://10.0.0.5:12686/edge-server"]).validate().is_ok());

        let err = config_with_endpoints(&["http://10.0.0.5"]).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "endpoints[0].uri"));

        let err = config_with_endpoints(&["opc.tcp://"]).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));

        let err = config_with_endpoints(&["opc.tcp://a:1/x", "opc.tcp://a:1/x"])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "endpoints[1].uri"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = GatewayConfig::default();
        config.client.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_checked_only_when_enabled() {
        let mut config = GatewayConfig::default();
        config.server.uri = String::new();
        assert!(config.validate().is_ok());

        config.server.enabled = true;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "server.uri"));
    }

    #[test]
    fn test_duplicate_namespace_rejected() {
        let namespace = NamespaceSettings {
            name: "urn:edge:plant".to_string(),
            root_node_id: "ns=2;s=Plant".to_string(),
            root_browse_name: None,
            root_display_name: None,
            variables: Vec::new(),
        };
        let mut config = GatewayConfig::default();
        config.server.enabled = true;
        config.server.namespaces = vec![namespace.clone(), namespace];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_endpoint_info() {
        let mut endpoint = EndpointSettings::new("opc.tcp://10.0.0.5:12686/edge-server");
        endpoint.browse_address_space = false;
        let client = ClientSettings {
            request_timeout_ms: 5_000,
            ..Default::default()
        };

        let info = endpoint.to_endpoint_info(&client);
        assert_eq!(info.endpoint_uri, "opc.tcp://10.0.0.5:12686/edge-server");
        assert!(info.start_signal.is_none());

        let config = info.effective_config();
        assert_eq!(config.application_name, DEFAULT_APPLICATION_NAME);
        assert_eq!(config.effective_security_policy(), SECURITY_POLICY_NONE_URI);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(!config.view_node_enabled);
    }

    #[test]
    fn test_namespace_names_and_items() {
        let namespace = NamespaceSettings {
            name: "urn:edge:plant".to_string(),
            root_node_id: "ns=2;s=Plant".to_string(),
            root_browse_name: Some("Plant".to_string()),
            root_display_name: None,
            variables: vec![VariableSettings {
                browse_name: "Speed".to_string(),
                display_name: Some("Line speed".to_string()),
                value: ConfigValue::Float(1.5),
            }],
        };
        assert_eq!(namespace.root_browse_name(), "Plant");
        assert_eq!(namespace.root_display_name(), "Plant");

        let items = namespace.node_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].browse_name, "Speed");
        assert_eq!(items[0].display_name, "Line speed");
        assert_eq!(items[0].value, Variant::Double(1.5));
    }

    #[test]
    fn test_log_level_and_format_parse() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());

        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_engine_selection() {
        assert_eq!(ClientSettings::default().engine, EngineKind::Simulated);
        assert_eq!("OPC-UA".parse::<EngineKind>().unwrap(), EngineKind::Opcua);
        assert_eq!(EngineKind::Opcua.to_string(), "opcua");
        assert!("modbus".parse::<EngineKind>().is_err());

        let client: ClientSettings = serde_json::from_str(
            r#"{"engine": "opcua", "pki_dir": "/var/lib/edge/pki", "trust_server_certs": true}"#,
        )
        .unwrap();
        assert_eq!(client.engine, EngineKind::Opcua);
        assert_eq!(client.pki_dir, Some(PathBuf::from("/var/lib/edge/pki")));
        assert!(client.trust_server_certs);
        assert_eq!(client.session_retry_limit, DEFAULT_SESSION_RETRY_LIMIT);
    }
}
