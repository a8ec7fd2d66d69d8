// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol engine abstraction.
//!
//! The gateway never encodes bytes on the wire itself. It drives an engine
//! through these traits:
//!
//! ```text
//! ┌──────────────────┐ discover/open ┌──────────────────┐
//! │ SessionRegistry  │──────────────▶│  ProtocolEngine  │
//! └────────┬─────────┘               └────────┬─────────┘
//!          │ read/write/browse/call           │ opens
//!          ▼                                  ▼
//! ┌──────────────────┐  active/inactive ┌──────────────────────────┐
//! │ EngineConnection │─────────────────▶│ SessionActivityListener  │
//! └──────────────────┘  value changes   │ MonitoredItemSink        │
//!                      ────────────────▶└──────────────────────────┘
//!
//! ┌──────────────────┐
//! │  ServerEngine    │  embedded server + namespace store
//! └──────────────────┘
//! ```
//!
//! Activity and monitored-item callbacks arrive on the engine's own tasks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edge_core::{
    BrowseParameter, BrowseResult, EndpointConfig, EndpointDescription, EndpointInfo, NodeClass,
    Variant,
};
use serde::{Deserialize, Serialize};

use crate::error::OpcUaResult;
use crate::types::{NodeId, SecurityMode, SecurityPolicy};

// =============================================================================
// ConnectionSettings
// =============================================================================

/// Everything the engine needs to open a client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// URI the caller asked for.
    pub endpoint_uri: String,
    /// URL of the selected endpoint description.
    pub endpoint_url: String,
    /// Application name.
    pub application_name: String,
    /// Application URI.
    pub application_uri: String,
    /// Security policy.
    pub security_policy: SecurityPolicy,
    /// Security mode.
    pub security_mode: SecurityMode,
    /// Request timeout.
    pub request_timeout: Duration,
}

impl ConnectionSettings {
    /// Builds settings from the selected endpoint description and the
    /// endpoint configuration.
    pub fn new(
        endpoint_uri: impl Into<String>,
        selected: &EndpointDescription,
        config: &EndpointConfig,
    ) -> Self {
        Self {
            endpoint_uri: endpoint_uri.into(),
            endpoint_url: selected.endpoint_url.clone(),
            application_name: config.application_name.clone(),
            application_uri: config.application_uri.clone(),
            security_policy: SecurityPolicy::from_uri(&selected.security_policy_uri),
            security_mode: selected.security_mode.parse().unwrap_or_default(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// Monitoring parameters of a monitored item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitoringParameters {
    /// Sampling interval.
    pub sampling_interval: Duration,
    /// Server-side queue size.
    pub queue_size: u32,
}

impl Default for MonitoringParameters {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_secs(1),
            queue_size: 10,
        }
    }
}

// =============================================================================
// Callbacks from the engine
// =============================================================================

/// Receives session activity transitions from the engine.
pub trait SessionActivityListener: Send + Sync {
    /// The session became active.
    fn on_session_active(&self);

    /// The session became inactive.
    fn on_session_inactive(&self);
}

/// Receives value changes of one monitored item.
pub trait MonitoredItemSink: Send + Sync {
    /// Called with the new value.
    fn on_value_changed(&self, value: Variant);
}

// =============================================================================
// Client side
// =============================================================================

/// Client engine: endpoint discovery and connection factory.
#[async_trait]
pub trait ProtocolEngine: Send + Sync {
    /// Returns the engine name for logging.
    fn name(&self) -> &str;

    /// Lists the endpoint descriptions offered at `uri`.
    async fn discover_endpoints(&self, uri: &str) -> OpcUaResult<Vec<EndpointDescription>>;

    /// Creates a connection; it is not connected yet.
    async fn open(&self, settings: ConnectionSettings) -> OpcUaResult<Arc<dyn EngineConnection>>;

    /// Releases resources shared by all connections.
    async fn release_shared_resources(&self);
}

/// One client connection to an endpoint.
#[async_trait]
pub trait EngineConnection: Send + Sync {
    /// Subscribes to session activity transitions.
    fn add_activity_listener(&self, listener: Arc<dyn SessionActivityListener>);

    /// Connects and activates the session. Activation is reported to the
    /// listeners asynchronously.
    async fn connect(&self) -> OpcUaResult<()>;

    /// Disconnects.
    async fn disconnect(&self) -> OpcUaResult<()>;

    /// Reads the value of a node.
    async fn read(&self, node: &NodeId) -> OpcUaResult<Variant>;

    /// Writes the value of a node.
    async fn write(&self, node: &NodeId, value: Variant) -> OpcUaResult<()>;

    /// Browses the references of a node.
    async fn browse(&self, node: &NodeId, parameter: &BrowseParameter)
    -> OpcUaResult<Vec<BrowseResult>>;

    /// Calls a method on an object.
    async fn call_method(
        &self,
        object: &NodeId,
        method: &NodeId,
        inputs: Vec<Variant>,
    ) -> OpcUaResult<Vec<Variant>>;

    /// Creates a monitored item and returns its id.
    async fn create_monitored_item(
        &self,
        node: &NodeId,
        parameters: MonitoringParameters,
        sink: Arc<dyn MonitoredItemSink>,
    ) -> OpcUaResult<u32>;

    /// Changes the parameters of a monitored item.
    async fn modify_monitored_item(
        &self,
        item_id: u32,
        parameters: MonitoringParameters,
    ) -> OpcUaResult<()>;

    /// Deletes a monitored item.
    async fn delete_monitored_item(&self, item_id: u32) -> OpcUaResult<()>;
}

// =============================================================================
// Server side
// =============================================================================

/// Handler of a server-side method node.
pub trait MethodHandler: Send + Sync {
    /// Invokes the method.
    fn call(&self, inputs: Vec<Variant>) -> Result<Vec<Variant>, String>;
}

impl<F> MethodHandler for F
where
    F: Fn(Vec<Variant>) -> Result<Vec<Variant>, String> + Send + Sync,
{
    fn call(&self, inputs: Vec<Variant>) -> Result<Vec<Variant>, String> {
        self(inputs)
    }
}

/// A node to create in a server namespace.
#[derive(Clone)]
pub struct NodeItem {
    /// Browse name, unique within the namespace.
    pub browse_name: String,
    /// Display name.
    pub display_name: String,
    /// Node class (`Object`, `Variable` or `Method`).
    pub node_class: NodeClass,
    /// Initial value of a variable node.
    pub value: Variant,
    /// Handler of a method node.
    pub method: Option<Arc<dyn MethodHandler>>,
    /// Browse name of the parent node; the namespace root when absent.
    pub parent: Option<String>,
}

impl NodeItem {
    /// Creates a variable node item.
    pub fn variable(browse_name: impl Into<String>, value: impl Into<Variant>) -> Self {
        let browse_name = browse_name.into();
        Self {
            display_name: browse_name.clone(),
            browse_name,
            node_class: NodeClass::Variable,
            value: value.into(),
            method: None,
            parent: None,
        }
    }

    /// Creates a method node item.
    pub fn method(browse_name: impl Into<String>, handler: Option<Arc<dyn MethodHandler>>) -> Self {
        let browse_name = browse_name.into();
        Self {
            display_name: browse_name.clone(),
            browse_name,
            node_class: NodeClass::Method,
            value: Variant::Null,
            method: handler,
            parent: None,
        }
    }

    /// Creates an object (folder) node item.
    pub fn object(browse_name: impl Into<String>) -> Self {
        let browse_name = browse_name.into();
        Self {
            display_name: browse_name.clone(),
            browse_name,
            node_class: NodeClass::Object,
            value: Variant::Null,
            method: None,
            parent: None,
        }
    }

    /// Sets the parent browse name.
    pub fn under(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

impl fmt::Debug for NodeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeItem")
            .field("browse_name", &self.browse_name)
            .field("node_class", &self.node_class)
            .field("value", &self.value)
            .field("has_method", &self.method.is_some())
            .field("parent", &self.parent)
            .finish()
    }
}

/// A reference between two server nodes, addressed by browse name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReference {
    /// Namespace of the source node.
    pub source_namespace: String,
    /// Browse name of the source node.
    pub source: String,
    /// Namespace of the target node.
    pub target_namespace: String,
    /// Browse name of the target node.
    pub target: String,
    /// Reference type name, e.g. `Organizes`.
    pub reference_type: String,
}

/// Embedded server and its namespace store.
#[async_trait]
pub trait ServerEngine: Send + Sync {
    /// Starts serving at the endpoint.
    async fn start(&self, endpoint: &EndpointInfo) -> OpcUaResult<()>;

    /// Stops accepting clients.
    async fn stop(&self) -> OpcUaResult<()>;

    /// Tears down sessions of connected clients.
    async fn terminate(&self) -> OpcUaResult<()>;

    /// Releases the server's resources.
    async fn close(&self) -> OpcUaResult<()>;

    /// Creates a namespace with a root folder node.
    fn create_namespace(
        &self,
        name: &str,
        root_node_id: &str,
        root_browse_name: &str,
        root_display_name: &str,
    ) -> OpcUaResult<()>;

    /// Creates a node in a namespace.
    fn create_node(&self, namespace: &str, item: NodeItem) -> OpcUaResult<NodeId>;

    /// Adds a reference between two nodes.
    fn add_reference(&self, reference: &NodeReference) -> OpcUaResult<()>;

    /// Changes the value of a variable node.
    fn modify_node_value(&self, namespace: &str, browse_name: &str, value: Variant)
    -> OpcUaResult<()>;

    /// Lists all nodes created through this store.
    fn nodes(&self) -> Vec<NodeId>;

    /// Lists nodes with the given browse name.
    fn nodes_by_browse_name(&self, browse_name: &str) -> Vec<NodeId>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::SECURITY_POLICY_NONE_URI;

    #[test]
    fn test_connection_settings_from_description() {
        let description = EndpointDescription {
            endpoint_url: "opc.tcp://host:4840/srv".into(),
            security_policy_uri: SECURITY_POLICY_NONE_URI.into(),
            security_mode: "None".into(),
            security_level: 0,
        };
        let settings =
            ConnectionSettings::new("opc.tcp://host:4840/srv", &description, &EndpointConfig::default());

        assert_eq!(settings.security_policy, SecurityPolicy::None);
        assert_eq!(settings.security_mode, SecurityMode::None);
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_closure_method_handler() {
        let handler: Arc<dyn MethodHandler> =
            Arc::new(|inputs: Vec<Variant>| -> Result<Vec<Variant>, String> {
                Ok(vec![Variant::from(inputs.len() as i32)])
            });
        let out = handler.call(vec![Variant::Null, Variant::Null]).unwrap();
        assert_eq!(out, vec![Variant::Int32(2)]);
    }
}
