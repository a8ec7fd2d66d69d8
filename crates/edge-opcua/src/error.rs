// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA gateway error types.
//!
//! Every failure inside a command handler or a session transition is an
//! [`OpcUaError`]. The command router converts it exactly once into an
//! error record and an error message; [`OpcUaError::status_code`] gives the
//! status reported for it.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - endpoint selection, connect/disconnect
//! ├── Session       - session lookup and lifecycle
//! ├── Operation     - read/write/method call failures, alias resolution
//! ├── Browse        - address-space browsing
//! ├── Subscription  - monitored items
//! ├── Discovery     - endpoint URI parsing and endpoint listing
//! ├── Server        - embedded server and namespace store
//! └── Configuration - invalid settings
//! ```
//!
//! # Examples
//!
//! ```
//! use edge_opcua::error::{OpcUaError, SessionError};
//! use edge_core::StatusCode;
//!
//! let error = OpcUaError::from(SessionError::not_found("opc.tcp://host:4840"));
//! assert_eq!(error.status_code(), StatusCode::InternalError);
//! assert!(!error.is_retryable());
//! ```

use std::fmt;

use edge_core::{Outcome, StatusCode};
use thiserror::Error;
use tracing::Level;

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Severity of an error, used to pick the log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Expected during normal operation.
    Info,
    /// Recoverable problem.
    Warning,
    /// Operation failed.
    Error,
    /// Gateway cannot work as configured.
    Critical,
}

impl ErrorSeverity {
    /// Maps the severity to a tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::DEBUG,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type of the OPC UA side of the gateway.
#[derive(Debug, Clone, Error)]
pub enum OpcUaError {
    /// Connection errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Read/write/method errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Browse errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Subscription errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Discovery errors.
    #[error("{0}")]
    Discovery(#[from] DiscoveryError),

    /// Server-side errors.
    #[error("{0}")]
    Server(#[from] ServerError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    // =========================================================================
    // Convenience Constructors
    // =========================================================================

    /// Session not found for an endpoint.
    pub fn no_session(endpoint: impl Into<String>) -> Self {
        SessionError::not_found(endpoint).into()
    }

    /// A value alias could not be resolved.
    pub fn unresolved_alias(alias: impl Into<String>) -> Self {
        OperationError::unresolved_alias(alias).into()
    }

    /// A request is missing something the handler needs.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        OperationError::InvalidRequest {
            message: message.into(),
        }
        .into()
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns the status code reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Server(e) => e.status_code(),
            _ => StatusCode::InternalError,
        }
    }

    /// Returns the error as a caller-visible outcome.
    pub fn to_outcome(&self) -> Outcome {
        Outcome::with_diagnostic(self.status_code(), self.to_string())
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Session(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Browse(_) | Self::Subscription(_) => false,
            Self::Discovery(e) => e.is_retryable(),
            Self::Server(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(_) | Self::Session(_) => ErrorSeverity::Error,
            Self::Operation(_) | Self::Browse(_) | Self::Subscription(_) => ErrorSeverity::Warning,
            Self::Discovery(_) => ErrorSeverity::Warning,
            Self::Server(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Operation(_) => "operation",
            Self::Browse(_) => "browse",
            Self::Subscription(_) => "subscription",
            Self::Discovery(_) => "discovery",
            Self::Server(_) => "server",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Logs this error at the level of its severity.
    pub fn log(&self, context: &str) {
        match self.severity().to_tracing_level() {
            Level::ERROR => tracing::error!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// No endpoint description matched the requested security policy.
    #[error("no desired endpoints returned for '{endpoint}' (policy {security_policy})")]
    NoSuitableEndpoint {
        /// Endpoint URI.
        endpoint: String,
        /// Requested security policy URI.
        security_policy: String,
    },

    /// The engine refused the connection.
    #[error("Connection refused to '{endpoint}': {message}")]
    Refused {
        /// Endpoint URI.
        endpoint: String,
        /// Engine message.
        message: String,
    },

    /// Disconnect failed.
    #[error("Disconnect from '{endpoint}' failed: {message}")]
    DisconnectFailed {
        /// Endpoint URI.
        endpoint: String,
        /// Engine message.
        message: String,
    },

    /// The connection is not open.
    #[error("Not connected to '{endpoint}'")]
    NotConnected {
        /// Endpoint URI.
        endpoint: String,
    },
}

impl ConnectionError {
    /// Creates a no-suitable-endpoint error.
    pub fn no_suitable_endpoint(endpoint: impl Into<String>, policy: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            endpoint: endpoint.into(),
            security_policy: policy.into(),
        }
    }

    /// Creates a connection-refused error.
    pub fn refused(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a disconnect-failed error.
    pub fn disconnect_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DisconnectFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a not-connected error.
    pub fn not_connected(endpoint: impl Into<String>) -> Self {
        Self::NotConnected {
            endpoint: endpoint.into(),
        }
    }

    /// Returns `true` if the error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Refused { .. } | Self::NotConnected { .. })
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle errors.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// No session exists for the endpoint.
    #[error("No session for endpoint '{endpoint}'")]
    NotFound {
        /// Endpoint URI.
        endpoint: String,
    },

    /// The session is not active.
    #[error("Session for '{endpoint}' is {state}, not active")]
    NotActive {
        /// Endpoint URI.
        endpoint: String,
        /// Current state name.
        state: String,
    },

    /// The session has been terminated.
    #[error("Session for '{endpoint}' is terminated")]
    Terminated {
        /// Endpoint URI.
        endpoint: String,
    },

    /// A state transition is not allowed.
    #[error("Invalid session transition {from} -> {to} for '{endpoint}'")]
    InvalidTransition {
        /// Endpoint URI.
        endpoint: String,
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// The session registry has been closed.
    #[error("Session registry is closed")]
    RegistryClosed,
}

impl SessionError {
    /// Creates a not-found error.
    pub fn not_found(endpoint: impl Into<String>) -> Self {
        Self::NotFound {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a not-active error.
    pub fn not_active(endpoint: impl Into<String>, state: impl fmt::Display) -> Self {
        Self::NotActive {
            endpoint: endpoint.into(),
            state: state.to_string(),
        }
    }

    /// Creates an invalid-transition error.
    pub fn invalid_transition(
        endpoint: impl Into<String>,
        from: impl fmt::Display,
        to: impl fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            endpoint: endpoint.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if the error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotActive { .. })
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Read, write and method-call errors.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    /// Alias not registered and not a node id.
    #[error("Cannot resolve value alias '{alias}'")]
    UnresolvedAlias {
        /// The alias.
        alias: String,
    },

    /// Node does not exist.
    #[error("Node not found: '{node_id}'")]
    NodeNotFound {
        /// Node id.
        node_id: String,
    },

    /// Read failed.
    #[error("Read of '{node_id}' failed: {message}")]
    ReadFailed {
        /// Node id.
        node_id: String,
        /// Message.
        message: String,
    },

    /// Write failed.
    #[error("Write of '{node_id}' failed: {message}")]
    WriteFailed {
        /// Node id.
        node_id: String,
        /// Message.
        message: String,
    },

    /// Method call failed.
    #[error("Call of method '{method}' failed: {message}")]
    CallFailed {
        /// Method node id.
        method: String,
        /// Message.
        message: String,
    },

    /// The request is missing data the handler needs.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Message.
        message: String,
    },

    /// The engine timed out.
    #[error("Operation on '{node_id}' timed out after {timeout_ms} ms")]
    Timeout {
        /// Node id.
        node_id: String,
        /// Timeout in milliseconds.
        timeout_ms: u64,
    },
}

impl OperationError {
    /// Creates an unresolved-alias error.
    pub fn unresolved_alias(alias: impl Into<String>) -> Self {
        Self::UnresolvedAlias {
            alias: alias.into(),
        }
    }

    /// Creates a node-not-found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Creates a read-failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a write-failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a call-failed error.
    pub fn call_failed(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallFailed {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Address-space browse errors.
#[derive(Debug, Clone, Error)]
pub enum BrowseError {
    /// Browse start node not found.
    #[error("Browse start node not found: '{node_id}'")]
    NodeNotFound {
        /// Node id.
        node_id: String,
    },

    /// Browse failed in the engine.
    #[error("Browse of '{node_id}' failed: {message}")]
    Failed {
        /// Node id.
        node_id: String,
        /// Message.
        message: String,
    },
}

impl BrowseError {
    /// Creates a node-not-found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Creates a browse-failed error.
    pub fn failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Monitored-item errors.
#[derive(Debug, Clone, Error)]
pub enum SubscriptionError {
    /// The alias already has a monitored item.
    #[error("Monitored item for '{alias}' already exists")]
    AlreadyExists {
        /// Alias.
        alias: String,
    },

    /// The alias has no monitored item.
    #[error("No monitored item for '{alias}'")]
    NotFound {
        /// Alias.
        alias: String,
    },

    /// The engine rejected the monitored item.
    #[error("Monitored item for '{alias}' rejected: {message}")]
    Rejected {
        /// Alias.
        alias: String,
        /// Message.
        message: String,
    },
}

impl SubscriptionError {
    /// Creates an already-exists error.
    pub fn already_exists(alias: impl Into<String>) -> Self {
        Self::AlreadyExists {
            alias: alias.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(alias: impl Into<String>) -> Self {
        Self::NotFound {
            alias: alias.into(),
        }
    }

    /// Creates a rejected error.
    pub fn rejected(alias: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            alias: alias.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// DiscoveryError
// =============================================================================

/// Endpoint discovery errors.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The URI could not be parsed.
    #[error("Malformed endpoint URI '{uri}': {reason}")]
    MalformedUri {
        /// URI.
        uri: String,
        /// Reason.
        reason: String,
    },

    /// The engine could not list endpoints.
    #[error("Endpoint discovery for '{uri}' failed: {message}")]
    Failed {
        /// URI.
        uri: String,
        /// Message.
        message: String,
    },
}

impl DiscoveryError {
    /// Creates a malformed-URI error.
    pub fn malformed(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Creates a discovery-failed error.
    pub fn failed(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

// =============================================================================
// ServerError
// =============================================================================

/// Embedded server and namespace store errors.
#[derive(Debug, Clone, Error)]
pub enum ServerError {
    /// No server is running.
    #[error("Server is not started")]
    NotStarted,

    /// The server is already running.
    #[error("Server is already running at '{uri}'")]
    AlreadyRunning {
        /// Server URI.
        uri: String,
    },

    /// A method node was created without a handler.
    #[error("Method node '{node}' has no method handler")]
    MissingMethodHandler {
        /// Node name.
        node: String,
    },

    /// The namespace store rejected the operation.
    #[error("Namespace store rejected operation: {message}")]
    Rejected {
        /// Message.
        message: String,
    },
}

impl ServerError {
    /// Creates a rejected error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Returns the status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotStarted => StatusCode::NotStartServer,
            Self::MissingMethodHandler { .. } => StatusCode::ParamInvalid,
            Self::AlreadyRunning { .. } | Self::Rejected { .. } => StatusCode::Error,
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid settings.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// A field has an invalid value.
    #[error("Invalid configuration '{field}': {message}")]
    Invalid {
        /// Field name.
        field: String,
        /// Message.
        message: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid-field error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result alias for OPC UA operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================
