// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command router.
//!
//! Runs on the send worker. Each command type has one handler; handlers
//! return `OpcUaResult` and the router converts every failure exactly once
//! into an error record plus an `ERROR` message.
//!
//! ```text
//! Message ──▶ route() ──┬─ READ / WRITE / BROWSE / INVOKE_METHOD ─▶ messages for the receive queue
//!                       ├─ READ_SYNC ─────────────────────────────▶ hub (direct)
//!                       ├─ SUBSCRIBE ─────────────────────────────▶ monitored item ─▶ REPORT via hub
//!                       ├─ START/STOP_CLIENT ─────────────────────▶ SessionRegistry ─▶ status via hub
//!                       ├─ START/STOP_SERVER ─────────────────────▶ ServerHost ─▶ status via hub
//!                       └─ GET_ENDPOINTS ─────────────────────────▶ discovery receiver via hub
//! ```

use std::sync::Arc;
use std::time::Duration;

use edge_core::{
    BrowseParameter, BrowseResult, CommandType, EndpointInfo, Message, Request, Response,
    StatusCode, SubRequest, SubscriptionType, Variant,
};
use tracing::{debug, instrument, warn};

use crate::discovery::{announced_devices, parse_endpoint_uri};
use crate::engine::{MonitoredItemSink, MonitoringParameters};
use crate::error::{OpcUaError, OpcUaResult};
use crate::hub::CallbackHub;
use crate::provider::ProviderKind;
use crate::server::ServerHost;
use crate::session::{Session, SessionRegistry};
use crate::types::NodeId;

/// Target of a request after alias resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// The node addressed.
    pub node_id: NodeId,
    /// Owning object, for method nodes.
    pub parent: Option<NodeId>,
}

/// Executes commands against sessions, the server host and discovery.
#[derive(Debug)]
pub struct CommandRouter {
    sessions: Arc<SessionRegistry>,
    server: Arc<ServerHost>,
    hub: Arc<CallbackHub>,
}

impl CommandRouter {
    /// Creates a router.
    pub fn new(sessions: Arc<SessionRegistry>, server: Arc<ServerHost>, hub: Arc<CallbackHub>) -> Self {
        Self {
            sessions,
            server,
            hub,
        }
    }

    /// Returns the session registry.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Returns the server host.
    pub fn server(&self) -> &Arc<ServerHost> {
        &self.server
    }

    /// Executes a validated message and returns the messages to put on the
    /// receive queue.
    #[instrument(
        skip(self, message),
        fields(
            command = ?message.command,
            endpoint = message.endpoint_uri().unwrap_or("-"),
            request_id = message.primary_request_id().unwrap_or("-"),
        )
    )]
    pub async fn route(&self, message: Message) -> Vec<Message> {
        let Some(command) = message.command else {
            warn!("Message without command type reached the router");
            return Vec::new();
        };
        debug!(requests = message.outbound_requests().len(), "Routing command");

        match command {
            CommandType::Read => self.read(command, &message).await,
            CommandType::ReadSync => {
                for delivery in self.read(command, &message).await {
                    self.hub.deliver(delivery);
                }
                Vec::new()
            }
            CommandType::Write => self.write(&message).await,
            CommandType::Browse => self.browse(&message).await,
            CommandType::InvokeMethod => self.invoke_method(&message).await,
            CommandType::Subscribe => self.subscribe(&message).await,
            CommandType::StartClient => self.start_client(&message).await,
            CommandType::StopClient => self.stop_client(&message).await,
            CommandType::StartServer => self.start_server(&message).await,
            CommandType::StopServer => self.stop_server(&message).await,
            CommandType::GetEndpoints => {
                self.get_endpoints(&message).await;
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Failure conversion
    // =========================================================================

    /// Logs a handler failure, records it and builds the error message.
    fn fail(
        &self,
        command: CommandType,
        endpoint: Option<&EndpointInfo>,
        request_id: Option<&str>,
        error: OpcUaError,
    ) -> Message {
        error.log(command.as_str());
        let outcome = error.to_outcome();
        self.hub.record_error(
            endpoint.map(|e| e.endpoint_uri.as_str()),
            outcome.clone(),
            request_id,
        );
        Message::error(
            Some(command),
            endpoint.map(EndpointInfo::without_signal),
            outcome,
            request_id.map(str::to_string),
        )
    }

    fn fail_message(&self, command: CommandType, message: &Message, error: OpcUaError) -> Vec<Message> {
        vec![self.fail(
            command,
            message.endpoint_info.as_ref(),
            message.primary_request_id(),
            error,
        )]
    }

    /// Runs `op` for every request; successes are collected into one
    /// `GENERAL_RESPONSE` followed by one `ERROR` message per failure.
    async fn per_request<'a, F, Fut>(&self, command: CommandType, message: &'a Message, op: F) -> Vec<Message>
    where
        F: Fn(&'a Request) -> Fut,
        Fut: std::future::Future<Output = OpcUaResult<Response>>,
    {
        let endpoint = message.endpoint_info.as_ref();
        let mut responses = Vec::new();
        let mut errors = Vec::new();

        for request in message.outbound_requests() {
            match op(request).await {
                Ok(response) => responses.push(response),
                Err(e) => errors.push(self.fail(command, endpoint, Some(&request.request_id), e)),
            }
        }

        let mut out = Vec::with_capacity(errors.len() + 1);
        if !responses.is_empty() {
            out.push(Message::response(
                command,
                endpoint.map(EndpointInfo::without_signal),
                responses,
            ));
        }
        out.extend(errors);
        out
    }

    // =========================================================================
    // Session and alias lookup
    // =========================================================================

    fn session_for(&self, message: &Message) -> OpcUaResult<Arc<Session>> {
        let uri = message
            .endpoint_uri()
            .ok_or_else(|| OpcUaError::invalid_request("message has no endpoint info"))?;
        self.sessions.get(uri).ok_or_else(|| OpcUaError::no_session(uri))
    }

    /// Resolves a request's target through the endpoint's providers, then
    /// as a literal node id.
    pub fn resolve(
        &self,
        endpoint: &str,
        request: &Request,
        kinds: &[ProviderKind],
    ) -> OpcUaResult<ResolvedTarget> {
        let node_info = request
            .node_info
            .as_ref()
            .ok_or_else(|| OpcUaError::invalid_request("request has no node info"))?;
        let wants_method = kinds.contains(&ProviderKind::Method);
        let alias = node_info
            .method_name
            .as_deref()
            .filter(|_| wants_method)
            .or(node_info.target())
            .ok_or_else(|| OpcUaError::invalid_request("request names no target"))?;

        if let Some(entry) = self.hub.providers().resolve(endpoint, alias, kinds) {
            return Ok(ResolvedTarget {
                node_id: entry.node_id,
                parent: entry.parent,
            });
        }

        let literal = std::iter::once(alias)
            .chain(node_info.node_id.as_deref())
            .find_map(|candidate| candidate.parse::<NodeId>().ok());
        match literal {
            Some(node_id) => Ok(ResolvedTarget {
                node_id,
                parent: None,
            }),
            None => Err(OpcUaError::unresolved_alias(alias)),
        }
    }

    // =========================================================================
    // Value commands
    // =========================================================================

    async fn read(&self, command: CommandType, message: &Message) -> Vec<Message> {
        let session = match self.session_for(message) {
            Ok(session) => session,
            Err(e) => return self.fail_requests(command, message, e),
        };
        let uri = session.endpoint_uri().to_string();

        self.per_request(command, message, |request| {
            let session = session.clone();
            let uri = uri.clone();
            async move {
                let target = self.resolve(&uri, request, &[ProviderKind::Attribute])?;
                let value = session.connection()?.read(&target.node_id).await?;
                Ok(Response::value(request, Some(value)))
            }
        })
        .await
    }

    async fn write(&self, message: &Message) -> Vec<Message> {
        let command = CommandType::Write;
        let session = match self.session_for(message) {
            Ok(session) => session,
            Err(e) => return self.fail_requests(command, message, e),
        };
        let uri = session.endpoint_uri().to_string();

        self.per_request(command, message, |request| {
            let session = session.clone();
            let uri = uri.clone();
            async move {
                let value = request
                    .value
                    .clone()
                    .ok_or_else(|| OpcUaError::invalid_request("WRITE request has no value"))?;
                let target = self.resolve(&uri, request, &[ProviderKind::Attribute])?;
                session.connection()?.write(&target.node_id, value.clone()).await?;
                Ok(Response::value(request, Some(value)))
            }
        })
        .await
    }

    async fn browse(&self, message: &Message) -> Vec<Message> {
        let command = CommandType::Browse;
        let session = match self.session_for(message) {
            Ok(session) => session,
            Err(e) => return self.fail_requests(command, message, e),
        };
        let parameter = message.browse_parameter.clone().unwrap_or_default();
        let endpoint = message.endpoint_info.as_ref();

        let mut out = Vec::new();
        for request in message.outbound_requests() {
            match self.browse_one(&session, request, &parameter).await {
                Ok(results) => out.push(Message::browse_response(
                    endpoint.map(EndpointInfo::without_signal),
                    request,
                    results,
                )),
                Err(e) => out.push(self.fail(command, endpoint, Some(&request.request_id), e)),
            }
        }
        out
    }

    async fn browse_one(
        &self,
        session: &Arc<Session>,
        request: &Request,
        parameter: &BrowseParameter,
    ) -> OpcUaResult<Vec<BrowseResult>> {
        let target = self.resolve(
            session.endpoint_uri(),
            request,
            &[ProviderKind::View, ProviderKind::Attribute],
        )?;
        session.connection()?.browse(&target.node_id, parameter).await
    }

    async fn invoke_method(&self, message: &Message) -> Vec<Message> {
        let command = CommandType::InvokeMethod;
        let session = match self.session_for(message) {
            Ok(session) => session,
            Err(e) => return self.fail_requests(command, message, e),
        };
        let uri = session.endpoint_uri().to_string();

        self.per_request(command, message, |request| {
            let session = session.clone();
            let uri = uri.clone();
            async move {
                let target = self.resolve(&uri, request, &[ProviderKind::Method])?;
                let object = target.parent.unwrap_or_else(NodeId::objects_folder);
                let inputs = request.value.clone().unwrap_or_default().into_arguments();
                let mut outputs = session
                    .connection()?
                    .call_method(&object, &target.node_id, inputs)
                    .await?;
                let value = if outputs.len() == 1 {
                    outputs.pop()
                } else {
                    Some(Variant::Array(outputs))
                };
                Ok(Response::value(request, value))
            }
        })
        .await
    }

    async fn subscribe(&self, message: &Message) -> Vec<Message> {
        let command = CommandType::Subscribe;
        let session = match self.session_for(message) {
            Ok(session) => session,
            Err(e) => return self.fail_requests(command, message, e),
        };
        let endpoint = message.endpoint_info.as_ref();

        let mut out = Vec::new();
        for request in message.outbound_requests() {
            if let Err(e) = self.subscribe_one(&session, request).await {
                out.push(self.fail(command, endpoint, Some(&request.request_id), e));
            }
        }
        out
    }

    async fn subscribe_one(&self, session: &Arc<Session>, request: &Request) -> OpcUaResult<()> {
        let sub = request
            .sub_request
            .as_ref()
            .ok_or_else(|| OpcUaError::invalid_request("SUBSCRIBE request has no subRequest"))?;
        let sub_type = sub
            .sub_type
            .ok_or_else(|| OpcUaError::invalid_request("SUBSCRIBE request has no subType"))?;
        let alias = request
            .node_info
            .as_ref()
            .and_then(|n| n.target())
            .ok_or_else(|| OpcUaError::invalid_request("SUBSCRIBE request names no target"))?;

        match sub_type {
            SubscriptionType::Create => {
                let target = self.resolve(session.endpoint_uri(), request, &[ProviderKind::Attribute])?;
                let sink = Arc::new(ReportSink::new(
                    session.endpoint().clone(),
                    request,
                    self.hub.clone(),
                ));
                let item_id = session
                    .create_monitored(alias, target.node_id, monitoring_parameters(sub), sink)
                    .await?;
                debug!(alias, item_id, "Monitored item created");
            }
            SubscriptionType::Modify => {
                session.modify_monitored(alias, monitoring_parameters(sub)).await?;
                debug!(alias, "Monitored item modified");
            }
            SubscriptionType::Delete => {
                session.delete_monitored(alias).await?;
                debug!(alias, "Monitored item deleted");
            }
        }
        Ok(())
    }

    /// One error message per request, all for the same failure.
    fn fail_requests(&self, command: CommandType, message: &Message, error: OpcUaError) -> Vec<Message> {
        let requests = message.outbound_requests();
        if requests.len() <= 1 {
            return self.fail_message(command, message, error);
        }
        requests
            .iter()
            .map(|request| {
                self.fail(
                    command,
                    message.endpoint_info.as_ref(),
                    Some(&request.request_id),
                    error.clone(),
                )
            })
            .collect()
    }

    // =========================================================================
    // Lifecycle commands
    // =========================================================================

    async fn start_client(&self, message: &Message) -> Vec<Message> {
        let command = CommandType::StartClient;
        let Some(endpoint) = message.endpoint_info.as_ref() else {
            return self.fail_message(command, message, OpcUaError::invalid_request("no endpoint info"));
        };
        match self.sessions.start_client(endpoint).await {
            Ok(()) => Vec::new(),
            Err(e) => self.fail_message(command, message, e),
        }
    }

    async fn stop_client(&self, message: &Message) -> Vec<Message> {
        let command = CommandType::StopClient;
        let Some(endpoint) = message.endpoint_info.as_ref() else {
            return self.fail_message(command, message, OpcUaError::invalid_request("no endpoint info"));
        };
        match self.sessions.terminate(&endpoint.endpoint_uri).await {
            Ok(()) => {
                self.hub.on_status(endpoint.without_signal(), StatusCode::StopClient);
                Vec::new()
            }
            Err(e) => self.fail_message(command, message, e),
        }
    }

    async fn start_server(&self, message: &Message) -> Vec<Message> {
        let command = CommandType::StartServer;
        let Some(endpoint) = message.endpoint_info.as_ref() else {
            return self.fail_message(command, message, OpcUaError::invalid_request("no endpoint info"));
        };
        match self.server.start(endpoint).await {
            Ok(()) => {
                self.hub.on_status(endpoint.without_signal(), StatusCode::ServerStarted);
                if let Some(signal) = &endpoint.start_signal {
                    signal.complete(endpoint.endpoint_uri.as_str());
                }
                Vec::new()
            }
            Err(e) => self.fail_message(command, message, e),
        }
    }

    async fn stop_server(&self, message: &Message) -> Vec<Message> {
        let command = CommandType::StopServer;
        let endpoint = self
            .server
            .endpoint()
            .or_else(|| message.endpoint_info.as_ref().map(EndpointInfo::without_signal));
        let was_running = self.server.is_running();

        let result = self.server.stop().await;
        if was_running {
            if let Some(endpoint) = endpoint {
                self.hub.on_status(endpoint, StatusCode::StopServer);
            }
        }
        match result {
            Ok(()) => Vec::new(),
            Err(e) => self.fail_message(command, message, e),
        }
    }

    async fn get_endpoints(&self, message: &Message) {
        let Some(uri) = message.endpoint_uri() else {
            warn!("GET_ENDPOINTS without endpoint info");
            return;
        };
        let mut device = match parse_endpoint_uri(uri) {
            Ok(device) => device,
            Err(e) => {
                e.log("get endpoints");
                return;
            }
        };

        match self.sessions.endpoints(uri).await {
            Ok(endpoints) => device.endpoints = endpoints,
            Err(e) => warn!(endpoint = %uri, error = %e, "Endpoint listing failed; device emitted without endpoints"),
        }
        debug!(
            address = %device.address,
            port = device.port,
            server_name = %device.server_name,
            endpoints = device.endpoints.len(),
            "Device resolved"
        );
        let announced = announced_devices(&device);
        self.hub.on_found_endpoint(device);
        for found in announced {
            debug!(address = %found.address, port = found.port, "Device announced by discovery");
            self.hub.on_found_device(found);
        }
    }
}

fn monitoring_parameters(sub: &SubRequest) -> MonitoringParameters {
    MonitoringParameters {
        sampling_interval: Duration::from_secs_f64(sub.sampling_interval.max(0.0) / 1000.0),
        queue_size: sub.queue_size,
    }
}

// =============================================================================
// ReportSink
// =============================================================================

/// Turns value changes of one monitored item into `REPORT` messages.
struct ReportSink {
    endpoint: EndpointInfo,
    request: Request,
    hub: Arc<CallbackHub>,
}

impl ReportSink {
    fn new(endpoint: EndpointInfo, request: &Request, hub: Arc<CallbackHub>) -> Self {
        let request = Request {
            value: None,
            sub_request: None,
            ..request.clone()
        };
        Self {
            endpoint,
            request,
            hub,
        }
    }
}

impl MonitoredItemSink for ReportSink {
    fn on_value_changed(&self, value: Variant) {
        self.hub.on_monitored_message(Message::report(
            Some(self.endpoint.clone()),
            Response::value(&self.request, Some(value)),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{ErrorSink, NodeInfo};
    use crate::provider::{ProviderEntry, ProviderRegistry};

    #[test]
    fn test_monitoring_parameters_from_sub_request() {
        let sub = SubRequest::new(SubscriptionType::Create)
            .with_sampling_interval(250.0)
            .with_queue_size(3);
        let params = monitoring_parameters(&sub);
        assert_eq!(params.sampling_interval, Duration::from_millis(250));
        assert_eq!(params.queue_size, 3);

        let negative = SubRequest::new(SubscriptionType::Create).with_sampling_interval(-5.0);
        assert_eq!(monitoring_parameters(&negative).sampling_interval, Duration::ZERO);
    }

    fn hub() -> Arc<CallbackHub> {
        Arc::new(CallbackHub::new(
            Arc::new(ProviderRegistry::new()),
            Arc::new(ErrorSink::new()),
        ))
    }

    #[tokio::test]
    async fn test_resolve_prefers_provider_then_literal() {
        let hub = hub();
        hub.providers().register(
            ProviderEntry::new("X", "Reset", ProviderKind::Method, NodeId::string(2, "Reset"))
                .with_parent(NodeId::string(2, "Boiler")),
        );
        let engine: Arc<dyn crate::engine::ProtocolEngine> =
            Arc::new(crate::simulator::SimulatedEngine::new());
        let sessions = Arc::new(SessionRegistry::new(
            engine,
            hub.clone(),
            tokio::runtime::Handle::current(),
        ));
        let router = CommandRouter::new(sessions, Arc::new(ServerHost::new(None)), hub);

        let target = router
            .resolve("X", &Request::new("Reset"), &[ProviderKind::Method])
            .unwrap();
        assert_eq!(target.parent, Some(NodeId::string(2, "Boiler")));

        let target = router
            .resolve("X", &Request::new("ns=2;s=Temp1"), &[ProviderKind::Attribute])
            .unwrap();
        assert_eq!(target.node_id, NodeId::string(2, "Temp1"));

        let by_node_id = Request::new("x").with_node_info(Some(NodeInfo {
            value_alias: Some("Unknown".into()),
            node_id: Some("i=2253".into()),
            method_name: None,
        }));
        assert_eq!(
            router.resolve("X", &by_node_id, &[ProviderKind::Attribute]).unwrap().node_id,
            NodeId::numeric(0, 2253)
        );

        let err = router
            .resolve("Y", &Request::new("Reset"), &[ProviderKind::Method])
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot resolve value alias 'Reset'");
    }
}
