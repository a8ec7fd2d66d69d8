// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint descriptors, client configuration and discovered devices.
//!
//! [`EndpointInfo`] is owned by the caller and passed by value into
//! commands. It optionally carries an [`EndpointConfig`] and a
//! [`StartSignal`] that is completed once the client for that endpoint has
//! finished its start sequence.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Security policy URI meaning "no security".
pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

/// Default application name used when an endpoint has no configuration.
pub const DEFAULT_APPLICATION_NAME: &str = "edge-opcua-client";

/// Default application URI used when an endpoint has no configuration.
pub const DEFAULT_APPLICATION_URI: &str = "urn:edge:opcua:client";

/// Default request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

// =============================================================================
// EndpointConfig
// =============================================================================

/// Client-side configuration for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Application name presented to the server.
    pub application_name: String,
    /// Application URI presented to the server.
    pub application_uri: String,
    /// Requested security policy URI (`None` policy when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_policy_uri: Option<String>,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Whether the address space is browsed to register capability
    /// providers when the session becomes active.
    pub view_node_enabled: bool,
}

impl EndpointConfig {
    /// Creates a builder.
    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder::default()
    }

    /// Returns the effective security policy URI.
    pub fn effective_security_policy(&self) -> &str {
        self.security_policy_uri
            .as_deref()
            .unwrap_or(SECURITY_POLICY_NONE_URI)
    }

    /// Returns `true` if a policy other than `None` is requested.
    pub fn uses_security(&self) -> bool {
        self.effective_security_policy() != SECURITY_POLICY_NONE_URI
    }

    /// Returns the request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            application_uri: DEFAULT_APPLICATION_URI.to_string(),
            security_policy_uri: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            view_node_enabled: true,
        }
    }
}

/// Builder for [`EndpointConfig`].
#[derive(Debug, Default)]
pub struct EndpointConfigBuilder {
    config: EndpointConfig,
}

impl EndpointConfigBuilder {
    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.application_uri = uri.into();
        self
    }

    /// Sets the security policy URI.
    pub fn security_policy_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.security_policy_uri = Some(uri.into());
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enables or disables address-space browsing on activation.
    pub fn view_node_enabled(mut self, enabled: bool) -> Self {
        self.config.view_node_enabled = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> EndpointConfig {
        self.config
    }
}

// =============================================================================
// StartSignal
// =============================================================================

/// One-shot completion handle for an asynchronous client start.
///
/// Clones share the same underlying channel; the first call to
/// [`StartSignal::complete`] wins.
#[derive(Clone)]
pub struct StartSignal {
    sender: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

impl StartSignal {
    /// Creates a signal and the receiver that observes its completion.
    pub fn new() -> (Self, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Completes the signal with the given value.
    ///
    /// Returns `false` if the signal was already completed or the receiver
    /// has been dropped.
    pub fn complete(&self, value: impl Into<String>) -> bool {
        match self.sender.lock().take() {
            Some(tx) => tx.send(value.into()).is_ok(),
            None => false,
        }
    }

    /// Drops the signal without a value; the receiver observes a closed
    /// channel. Returns `false` if it was already completed or abandoned.
    pub fn abandon(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    /// Returns `true` if the signal has not been completed yet.
    pub fn is_pending(&self) -> bool {
        self.sender.lock().is_some()
    }
}

impl fmt::Debug for StartSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartSignal")
            .field("pending", &self.is_pending())
            .finish()
    }
}

// =============================================================================
// EndpointInfo
// =============================================================================

/// Target endpoint of a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInfo {
    /// Endpoint URI, e.g. `opc.tcp://10.0.0.5:12686/edge-server`.
    #[serde(alias = "uri")]
    pub endpoint_uri: String,
    /// Optional client configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<EndpointConfig>,
    /// Optional start completion handle.
    #[serde(skip)]
    pub start_signal: Option<StartSignal>,
}

impl EndpointInfo {
    /// Creates endpoint info for a URI with no configuration.
    pub fn new(endpoint_uri: impl Into<String>) -> Self {
        Self {
            endpoint_uri: endpoint_uri.into(),
            config: None,
            start_signal: None,
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: EndpointConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the start signal.
    pub fn with_start_signal(mut self, signal: StartSignal) -> Self {
        self.start_signal = Some(signal);
        self
    }

    /// Returns the configuration, falling back to defaults.
    pub fn effective_config(&self) -> EndpointConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Returns a copy without the start signal, suitable for status
    /// notifications that must not complete the caller's handle twice.
    pub fn without_signal(&self) -> Self {
        Self {
            endpoint_uri: self.endpoint_uri.clone(),
            config: self.config.clone(),
            start_signal: None,
        }
    }
}

impl fmt::Display for EndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint_uri)
    }
}

// =============================================================================
// EndpointDescription / Device
// =============================================================================

/// A connectable endpoint description returned by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescription {
    /// Endpoint URL.
    pub endpoint_url: String,
    /// Security policy URI.
    pub security_policy_uri: String,
    /// Message security mode name (`None`, `Sign`, `SignAndEncrypt`).
    pub security_mode: String,
    /// Relative security level advertised by the server.
    pub security_level: u8,
}

impl EndpointDescription {
    /// Creates an unsecured endpoint description.
    pub fn unsecured(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            security_policy_uri: SECURITY_POLICY_NONE_URI.to_string(),
            security_mode: "None".to_string(),
            security_level: 0,
        }
    }
}

/// A device identity resolved by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Host name or IP address.
    pub address: String,
    /// TCP port.
    pub port: u16,
    /// Server name (first path segment of the endpoint URI).
    pub server_name: String,
    /// Remaining path segments after the server name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    /// Endpoint descriptions offered by the device.
    #[serde(default)]
    pub endpoints: Vec<EndpointDescription>,
}

// =============================================================================
// Tests
// =============================================================================
