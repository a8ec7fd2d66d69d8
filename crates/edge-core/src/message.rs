// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The message model: commands, requests, responses and browse results.
//!
//! A [`Message`] is the unit of work submitted to the gateway and the unit
//! of delivery back to the application. Outbound messages carry one
//! [`Request`] or an ordered batch of them; inbound messages carry
//! [`Response`]s, [`BrowseResult`]s or an error [`Outcome`].
//!
//! ```text
//! Message
//! ├── commandType    READ | WRITE | BROWSE | SUBSCRIBE | ...
//! ├── messageKind    SEND_REQUEST | SEND_REQUESTS | GENERAL_RESPONSE | ...
//! ├── endpointInfo   target endpoint
//! ├── request        ─┐ exactly one of these for SEND_REQUEST(S)
//! ├── requests       ─┘
//! ├── browseParameter
//! ├── responses / browseResults / result   (inbound)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::endpoint::EndpointInfo;
use crate::status::Outcome;
use crate::value::Variant;

// =============================================================================
// CommandType
// =============================================================================

/// The operation a message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    /// Asynchronous read.
    Read,
    /// Read whose response is produced before the next queued command runs.
    ReadSync,
    /// Write a value.
    Write,
    /// Browse the address space.
    Browse,
    /// Create, modify or delete a monitored item.
    Subscribe,
    /// Invoke a remote method.
    InvokeMethod,
    /// Start a client session.
    StartClient,
    /// Stop a client session.
    StopClient,
    /// Start the embedded server.
    StartServer,
    /// Stop the embedded server.
    StopServer,
    /// Resolve an endpoint URI into a device descriptor.
    GetEndpoints,
}

impl CommandType {
    /// Returns `true` if the command addresses a value alias.
    pub fn requires_value_alias(&self) -> bool {
        matches!(
            self,
            Self::Read | Self::Write | Self::Browse | Self::InvokeMethod | Self::Subscribe
        )
    }

    /// Returns `true` if the command accepts only a single request.
    pub fn requires_single_request(&self) -> bool {
        matches!(self, Self::InvokeMethod | Self::Subscribe)
    }

    /// Returns `true` for commands that act on a whole endpoint rather than
    /// on individual values.
    pub fn is_endpoint_wide(&self) -> bool {
        matches!(
            self,
            Self::StartClient
                | Self::StopClient
                | Self::StartServer
                | Self::StopServer
                | Self::GetEndpoints
        )
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::ReadSync => "READ_SYNC",
            Self::Write => "WRITE",
            Self::Browse => "BROWSE",
            Self::Subscribe => "SUBSCRIBE",
            Self::InvokeMethod => "INVOKE_METHOD",
            Self::StartClient => "START_CLIENT",
            Self::StopClient => "STOP_CLIENT",
            Self::StartServer => "START_SERVER",
            Self::StopServer => "STOP_SERVER",
            Self::GetEndpoints => "GET_ENDPOINTS",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MessageKind
// =============================================================================

/// The shape of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Outbound, one request.
    SendRequest,
    /// Outbound, ordered batch of requests.
    SendRequests,
    /// Inbound responses.
    GeneralResponse,
    /// Inbound browse results.
    BrowseResponse,
    /// Inbound monitored-item notification.
    Report,
    /// Inbound error.
    Error,
}

impl MessageKind {
    /// Returns `true` for outbound kinds.
    pub fn is_outbound(&self) -> bool {
        matches!(self, Self::SendRequest | Self::SendRequests)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SendRequest => "SEND_REQUEST",
            Self::SendRequests => "SEND_REQUESTS",
            Self::GeneralResponse => "GENERAL_RESPONSE",
            Self::BrowseResponse => "BROWSE_RESPONSE",
            Self::Report => "REPORT",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Request / NodeInfo / SubRequest
// =============================================================================

/// Identifies the target value of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Caller-chosen alias of the target value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_alias: Option<String>,
    /// Explicit node id, used when no alias is registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Method name for method invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
}

impl NodeInfo {
    /// Creates node info for an alias.
    pub fn alias(alias: impl Into<String>) -> Self {
        Self {
            value_alias: Some(alias.into()),
            ..Default::default()
        }
    }

    /// Returns the alias, falling back to the node id.
    pub fn target(&self) -> Option<&str> {
        self.value_alias.as_deref().or(self.node_id.as_deref())
    }
}

/// Subscription operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    /// Create a monitored item.
    Create,
    /// Modify an existing monitored item.
    Modify,
    /// Delete a monitored item.
    Delete,
}

/// Subscription descriptor of a SUBSCRIBE request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubRequest {
    /// Operation; required by validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<SubscriptionType>,
    /// Sampling interval in milliseconds.
    pub sampling_interval: f64,
    /// Publishing interval in milliseconds.
    pub publishing_interval: f64,
    /// Server-side queue size.
    pub queue_size: u32,
    /// Whether publishing is enabled.
    pub publishing_enabled: bool,
}

impl SubRequest {
    /// Creates a descriptor with default intervals.
    pub fn new(sub_type: SubscriptionType) -> Self {
        Self {
            sub_type: Some(sub_type),
            ..Default::default()
        }
    }

    /// Sets the sampling interval.
    pub fn with_sampling_interval(mut self, millis: f64) -> Self {
        self.sampling_interval = millis;
        self
    }

    /// Sets the queue size.
    pub fn with_queue_size(mut self, size: u32) -> Self {
        self.queue_size = size;
        self
    }
}

impl Default for SubRequest {
    fn default() -> Self {
        Self {
            sub_type: None,
            sampling_interval: 1000.0,
            publishing_interval: 1000.0,
            queue_size: 10,
            publishing_enabled: true,
        }
    }
}

/// A request addressing one target item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Caller-supplied correlation id.
    #[serde(default = "generate_request_id")]
    pub request_id: String,
    /// Target descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_info: Option<NodeInfo>,
    /// Payload for write and method invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Variant>,
    /// Subscription descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_request: Option<SubRequest>,
}

fn generate_request_id() -> String {
    Uuid::now_v7().to_string()
}

impl Request {
    /// Creates a request for an alias with a generated id.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            request_id: generate_request_id(),
            node_info: Some(NodeInfo::alias(alias)),
            value: None,
            sub_request: None,
        }
    }

    /// Creates a request with no target, for endpoint-wide commands.
    pub fn endpoint_wide() -> Self {
        Self {
            request_id: generate_request_id(),
            node_info: Some(NodeInfo::default()),
            value: None,
            sub_request: None,
        }
    }

    /// Sets the request id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    /// Sets the payload.
    pub fn with_value(mut self, value: impl Into<Variant>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Sets the subscription descriptor.
    pub fn with_sub_request(mut self, sub: SubRequest) -> Self {
        self.sub_request = Some(sub);
        self
    }

    /// Sets the node info.
    pub fn with_node_info(mut self, node_info: Option<NodeInfo>) -> Self {
        self.node_info = node_info;
        self
    }

    /// Returns the value alias, if any.
    pub fn value_alias(&self) -> Option<&str> {
        self.node_info.as_ref().and_then(|n| n.value_alias.as_deref())
    }
}

// =============================================================================
// Response / Browse
// =============================================================================

/// A response correlated to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Id of the originating request.
    pub request_id: String,
    /// Target descriptor of the originating request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_info: Option<NodeInfo>,
    /// Value or method output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Variant>,
    /// Result of the operation.
    pub result: Outcome,
}

impl Response {
    /// Creates a successful response for a request.
    pub fn value(request: &Request, value: Option<Variant>) -> Self {
        Self {
            request_id: request.request_id.clone(),
            node_info: request.node_info.clone(),
            value,
            result: Outcome::ok(),
        }
    }

    /// Creates a failed response for a request.
    pub fn failure(request: &Request, result: Outcome) -> Self {
        Self {
            request_id: request.request_id.clone(),
            node_info: request.node_info.clone(),
            value: None,
            result,
        }
    }
}

/// Direction of a browse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowseDirection {
    /// Follow forward references.
    #[default]
    Forward,
    /// Follow inverse references.
    Inverse,
    /// Follow both.
    Both,
}

/// Parameters of a BROWSE command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseParameter {
    /// Reference direction.
    #[serde(default)]
    pub direction: BrowseDirection,
    /// Maximum references returned per node; 0 means unlimited.
    #[serde(default)]
    pub max_references_per_node: u32,
}

/// Class of an address-space node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type.
    ObjectType,
    /// Variable type.
    VariableType,
    /// Reference type.
    ReferenceType,
    /// Data type.
    DataType,
    /// View node.
    View,
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "Object",
            Self::Variable => "Variable",
            Self::Method => "Method",
            Self::ObjectType => "ObjectType",
            Self::VariableType => "VariableType",
            Self::ReferenceType => "ReferenceType",
            Self::DataType => "DataType",
            Self::View => "View",
        };
        f.write_str(name)
    }
}

/// One reference discovered by a browse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseResult {
    /// Browse name of the target node.
    pub browse_name: String,
    /// Node id of the target node.
    pub node_id: String,
    /// Display name of the target node.
    pub display_name: String,
    /// Node class of the target node.
    pub node_class: NodeClass,
}

// =============================================================================
// Message
// =============================================================================

/// The unit of work and of delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Command type.
    #[serde(rename = "commandType", default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandType>,
    /// Message kind.
    #[serde(rename = "messageKind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    /// Target endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_info: Option<EndpointInfo>,
    /// Single request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Request>,
    /// Batch of requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<Request>>,
    /// Browse parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browse_parameter: Option<BrowseParameter>,
    /// Responses of an inbound message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<Response>,
    /// Browse results of an inbound browse response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub browse_results: Vec<BrowseResult>,
    /// Result carried by error messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Outcome>,
}

impl Message {
    /// Creates an outbound single-request message.
    pub fn single(command: CommandType, endpoint: EndpointInfo, request: Request) -> Self {
        Self {
            command: Some(command),
            kind: Some(MessageKind::SendRequest),
            endpoint_info: Some(endpoint),
            request: Some(request),
            ..Default::default()
        }
    }

    /// Creates an outbound batch message.
    pub fn batch(command: CommandType, endpoint: EndpointInfo, requests: Vec<Request>) -> Self {
        Self {
            command: Some(command),
            kind: Some(MessageKind::SendRequests),
            endpoint_info: Some(endpoint),
            requests: Some(requests),
            ..Default::default()
        }
    }

    /// Creates an outbound endpoint-wide command (start/stop, discovery).
    pub fn endpoint_command(command: CommandType, endpoint: EndpointInfo) -> Self {
        Self::single(command, endpoint, Request::endpoint_wide())
    }

    /// Sets the browse parameter block.
    pub fn with_browse_parameter(mut self, parameter: BrowseParameter) -> Self {
        self.browse_parameter = Some(parameter);
        self
    }

    /// Creates an inbound response message.
    pub fn response(
        command: CommandType,
        endpoint: Option<EndpointInfo>,
        responses: Vec<Response>,
    ) -> Self {
        Self {
            command: Some(command),
            kind: Some(MessageKind::GeneralResponse),
            endpoint_info: endpoint,
            responses,
            ..Default::default()
        }
    }

    /// Creates an inbound browse response for one request.
    pub fn browse_response(
        endpoint: Option<EndpointInfo>,
        request: &Request,
        results: Vec<BrowseResult>,
    ) -> Self {
        Self {
            command: Some(CommandType::Browse),
            kind: Some(MessageKind::BrowseResponse),
            endpoint_info: endpoint,
            responses: vec![Response::value(request, None)],
            browse_results: results,
            ..Default::default()
        }
    }

    /// Creates a monitored-item notification.
    pub fn report(endpoint: Option<EndpointInfo>, response: Response) -> Self {
        Self {
            command: Some(CommandType::Subscribe),
            kind: Some(MessageKind::Report),
            endpoint_info: endpoint,
            responses: vec![response],
            ..Default::default()
        }
    }

    /// Creates an error message.
    pub fn error(
        command: Option<CommandType>,
        endpoint: Option<EndpointInfo>,
        result: Outcome,
        request_id: Option<String>,
    ) -> Self {
        let responses = request_id
            .map(|request_id| Response {
                request_id,
                node_info: None,
                value: None,
                result: result.clone(),
            })
            .into_iter()
            .collect();
        Self {
            command,
            kind: Some(MessageKind::Error),
            endpoint_info: endpoint,
            responses,
            result: Some(result),
            ..Default::default()
        }
    }

    /// Returns the outbound requests in order, single or batch.
    pub fn outbound_requests(&self) -> Vec<&Request> {
        match (&self.request, &self.requests) {
            (Some(request), _) => vec![request],
            (None, Some(requests)) => requests.iter().collect(),
            (None, None) => Vec::new(),
        }
    }

    /// Returns the id of the first request, used to correlate failures.
    pub fn primary_request_id(&self) -> Option<&str> {
        self.request
            .as_ref()
            .or_else(|| self.requests.as_ref().and_then(|r| r.first()))
            .map(|r| r.request_id.as_str())
            .or_else(|| self.responses.first().map(|r| r.request_id.as_str()))
    }

    /// Returns the endpoint URI, if any.
    pub fn endpoint_uri(&self) -> Option<&str> {
        self.endpoint_info.as_ref().map(|e| e.endpoint_uri.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
