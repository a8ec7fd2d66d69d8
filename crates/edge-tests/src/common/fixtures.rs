// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built endpoints, messages and configuration files.
//!
//! The demo server hosted by [`edge_opcua::SimulatedEngine::with_demo_server`]
//! exposes a `Boiler` object in namespace 2 with the variables `Temp1`
//! (21.5) and `Pressure` (1.2) and the method `Reset`.

use edge_core::{
    BrowseParameter, CommandType, EndpointConfig, EndpointInfo, Message, NodeInfo, Request,
    StartSignal, SubRequest, SubscriptionType, Variant,
};

// =============================================================================
// Endpoint Fixtures
// =============================================================================

/// URI of the simulated demo server.
pub const DEMO_URI: &str = "opc.tcp://10.0.0.5:12686/edge-server";

/// A second simulated server.
pub const SECOND_URI: &str = "opc.tcp://10.0.0.6:4840/plc";

/// URI of the embedded server.
pub const SERVER_URI: &str = "opc.tcp://0.0.0.0:12686/edge-server";

/// URI of an endpoint no engine knows.
pub const UNKNOWN_URI: &str = "opc.tcp://10.0.0.99:4840/missing";

/// Fixture providing endpoint descriptors.
pub struct EndpointFixtures;

impl EndpointFixtures {
    /// Endpoint info with the default configuration.
    pub fn demo() -> EndpointInfo {
        EndpointInfo::new(DEMO_URI)
    }

    /// Endpoint info for any URI.
    pub fn uri(uri: &str) -> EndpointInfo {
        EndpointInfo::new(uri)
    }

    /// Endpoint info that skips the address-space walk.
    pub fn without_browse(uri: &str) -> EndpointInfo {
        EndpointInfo::new(uri).with_config(EndpointConfig::builder().view_node_enabled(false).build())
    }

    /// Endpoint info requesting a policy no fixture server offers.
    pub fn secured(uri: &str) -> EndpointInfo {
        EndpointInfo::new(uri).with_config(
            EndpointConfig::builder()
                .security_policy_uri("http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256")
                .build(),
        )
    }
}

// =============================================================================
// Message Fixtures
// =============================================================================

/// Fixture providing outbound messages.
pub struct MessageFixtures;

impl MessageFixtures {
    /// START_CLIENT.
    pub fn start_client(uri: &str) -> Message {
        Message::endpoint_command(CommandType::StartClient, EndpointInfo::new(uri))
    }

    /// START_CLIENT carrying a start signal.
    pub fn start_client_signaled(uri: &str) -> (Message, tokio::sync::oneshot::Receiver<String>) {
        let (signal, started) = StartSignal::new();
        let message = Message::endpoint_command(
            CommandType::StartClient,
            EndpointInfo::new(uri).with_start_signal(signal),
        );
        (message, started)
    }

    /// STOP_CLIENT.
    pub fn stop_client(uri: &str) -> Message {
        Message::endpoint_command(CommandType::StopClient, EndpointInfo::new(uri))
    }

    /// START_SERVER.
    pub fn start_server(uri: &str) -> Message {
        Message::endpoint_command(CommandType::StartServer, EndpointInfo::new(uri))
    }

    /// STOP_SERVER.
    pub fn stop_server(uri: &str) -> Message {
        Message::endpoint_command(CommandType::StopServer, EndpointInfo::new(uri))
    }

    /// GET_ENDPOINTS.
    pub fn get_endpoints(uri: &str) -> Message {
        Message::endpoint_command(CommandType::GetEndpoints, EndpointInfo::new(uri))
    }

    /// READ of one alias.
    pub fn read(uri: &str, alias: &str, request_id: &str) -> Message {
        Message::single(
            CommandType::Read,
            EndpointInfo::new(uri),
            Request::new(alias).with_id(request_id),
        )
    }

    /// READ of several aliases; request ids are `r-0`, `r-1`, ...
    pub fn read_batch(uri: &str, aliases: &[&str]) -> Message {
        let requests = aliases
            .iter()
            .enumerate()
            .map(|(i, alias)| Request::new(*alias).with_id(format!("r-{i}")))
            .collect();
        Message::batch(CommandType::Read, EndpointInfo::new(uri), requests)
    }

    /// READ_SYNC of one alias.
    pub fn read_sync(uri: &str, alias: &str, request_id: &str) -> Message {
        Message::single(
            CommandType::ReadSync,
            EndpointInfo::new(uri),
            Request::new(alias).with_id(request_id),
        )
    }

    /// WRITE of one value.
    pub fn write(uri: &str, alias: &str, value: impl Into<Variant>, request_id: &str) -> Message {
        Message::single(
            CommandType::Write,
            EndpointInfo::new(uri),
            Request::new(alias).with_id(request_id).with_value(value),
        )
    }

    /// BROWSE of one alias with default parameters.
    pub fn browse(uri: &str, alias: &str, request_id: &str) -> Message {
        Message::single(
            CommandType::Browse,
            EndpointInfo::new(uri),
            Request::new(alias).with_id(request_id),
        )
        .with_browse_parameter(BrowseParameter::default())
    }

    /// INVOKE_METHOD; the inputs are carried as one array value.
    pub fn method(uri: &str, method: &str, inputs: Vec<Variant>, request_id: &str) -> Message {
        let request = Request::new(method)
            .with_id(request_id)
            .with_node_info(Some(NodeInfo {
                value_alias: Some(method.to_string()),
                method_name: Some(method.to_string()),
                ..Default::default()
            }))
            .with_value(Variant::Array(inputs));
        Message::single(CommandType::InvokeMethod, EndpointInfo::new(uri), request)
    }

    /// SUBSCRIBE with the given operation.
    pub fn subscribe(uri: &str, alias: &str, sub_type: SubscriptionType, request_id: &str) -> Message {
        let request = Request::new(alias)
            .with_id(request_id)
            .with_sub_request(SubRequest::new(sub_type).with_sampling_interval(100.0));
        Message::single(CommandType::Subscribe, EndpointInfo::new(uri), request)
    }
}

// =============================================================================
// Configuration Fixtures
// =============================================================================

/// Fixture providing configuration file contents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// A complete YAML configuration with two endpoints and a server.
    pub fn full_yaml() -> &'static str {
        r#"
gateway:
  id: "${GATEWAY_ID:edge-test}"
  name: Integration Gateway
dispatch:
  send_queue_capacity: 64
logging:
  level: debug
  format: json
client:
  application_name: edge-tests
  request_timeout_ms: 5000
endpoints:
  - uri: opc.tcp://10.0.0.5:12686/edge-server
  - uri: opc.tcp://10.0.0.6:4840/plc
    browse_address_space: false
    auto_start: false
server:
  enabled: true
  uri: opc.tcp://0.0.0.0:12686/edge-server
  namespaces:
    - name: urn:edge:plant
      root_node_id: ns=2;s=Plant
      root_browse_name: Plant
      variables:
        - browse_name: Speed
          value: 1.5
        - browse_name: Running
          value: true
        - browse_name: Label
          display_name: Line label
          value: line-1
"#
    }

    /// The same configuration as TOML.
    pub fn full_toml() -> &'static str {
        r#"
[gateway]
id = "edge-test"
name = "Integration Gateway"

[client]
request_timeout_ms = 5000

[[endpoints]]
uri = "opc.tcp://10.0.0.5:12686/edge-server"

[[endpoints]]
uri = "opc.tcp://10.0.0.6:4840/plc"
auto_start = false

[server]
enabled = true

[[server.namespaces]]
name = "urn:edge:plant"
root_node_id = "ns=2;s=Plant"

[[server.namespaces.variables]]
browse_name = "Speed"
value = 1.5
"#
    }

    /// A configuration that parses but fails validation.
    pub fn invalid_endpoint_yaml() -> &'static str {
        r#"
endpoints:
  - uri: http://10.0.0.5/edge-server
"#
    }
}
