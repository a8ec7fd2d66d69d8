// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client engine over the `opcua` crate.
//!
//! Talks to real servers. The `opcua` client API is synchronous, so every
//! service call runs on the blocking pool and is bounded by the request
//! timeout of the connection.
//!
//! ```text
//! UaStackEngine ──open──▶ UaStackConnection ──connect──▶ Arc<RwLock<ua::Session>>
//!                               │                              │ run_async (publish loop)
//!                               │ one subscription per session ▼
//!                               └──────────────────────▶ DataChangeCallback ──▶ MonitoredItemSink
//! ```
//!
//! Connection status changes reported by the session are forwarded to the
//! activity listeners; the session retries lost connections itself.
//!
//! Only anonymous identity tokens are presented.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edge_core::{BrowseDirection, BrowseParameter, BrowseResult, EndpointDescription, NodeClass, Variant};
use opcua::client::prelude as ua;
use opcua::client::prelude::{
    AttributeService, MethodService, MonitoredItemService, SubscriptionService, ViewService,
};
use opcua::sync::RwLock as UaRwLock;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, trace, warn};

use crate::engine::{
    ConnectionSettings, EngineConnection, MonitoredItemSink, MonitoringParameters, ProtocolEngine,
    SessionActivityListener,
};
use crate::error::{
    BrowseError, ConnectionError, DiscoveryError, OpcUaError, OpcUaResult, OperationError,
    SubscriptionError,
};
use crate::types::{NodeId, NodeIdentifier, SecurityMode};

type SharedSession = Arc<UaRwLock<ua::Session>>;
type Sinks = Arc<Mutex<HashMap<u32, Arc<dyn MonitoredItemSink>>>>;
type Listeners = Arc<Mutex<Vec<Arc<dyn SessionActivityListener>>>>;

// =============================================================================
// UaStackSettings
// =============================================================================

/// Settings shared by every connection of a [`UaStackEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UaStackSettings {
    /// Application name used for endpoint discovery.
    pub application_name: String,
    /// Application URI used for endpoint discovery.
    pub application_uri: String,
    /// Directory holding the client certificate store.
    pub pki_dir: Option<PathBuf>,
    /// Accept server certificates without a trust list entry.
    pub trust_server_certs: bool,
    /// Reconnect attempts the session makes after losing the server.
    pub session_retry_limit: u32,
    /// Bound on endpoint discovery.
    pub discovery_timeout: Duration,
}

impl Default for UaStackSettings {
    fn default() -> Self {
        Self {
            application_name: "edge-opcua-client".to_string(),
            application_uri: "urn:edge:opcua:client".to_string(),
            pki_dir: None,
            trust_server_certs: false,
            session_retry_limit: 3,
            discovery_timeout: Duration::from_secs(60),
        }
    }
}

impl UaStackSettings {
    fn build_client(&self, application_name: &str, application_uri: &str) -> OpcUaResult<ua::Client> {
        let mut builder = ua::ClientBuilder::new()
            .application_name(application_name)
            .application_uri(application_uri)
            .create_sample_keypair(true)
            .trust_server_certs(self.trust_server_certs)
            .session_retry_limit(i32::try_from(self.session_retry_limit).unwrap_or(i32::MAX));

        if let Some(ref pki_dir) = self.pki_dir {
            builder = builder.pki_dir(pki_dir.clone());
        }

        builder.client().ok_or_else(|| {
            ConnectionError::refused(application_uri, "cannot build OPC UA client from settings").into()
        })
    }
}

// =============================================================================
// UaStackEngine
// =============================================================================

/// [`ProtocolEngine`] backed by the `opcua` client.
#[derive(Debug, Clone, Default)]
pub struct UaStackEngine {
    settings: UaStackSettings,
}

impl UaStackEngine {
    /// Creates an engine. Nothing is contacted until a connection opens.
    pub fn new(settings: UaStackSettings) -> Self {
        Self { settings }
    }

    /// Returns the engine settings.
    pub fn settings(&self) -> &UaStackSettings {
        &self.settings
    }
}

#[async_trait]
impl ProtocolEngine for UaStackEngine {
    fn name(&self) -> &str {
        "opcua"
    }

    #[instrument(skip(self))]
    async fn discover_endpoints(&self, uri: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        let settings = self.settings.clone();
        let url = uri.to_string();
        let descriptions = run_blocking(self.settings.discovery_timeout, uri, move || {
            let client = settings.build_client(&settings.application_name, &settings.application_uri)?;
            let endpoints = client
                .get_server_endpoints_from_url(url.as_str())
                .map_err(|status| DiscoveryError::failed(&url, format!("{status:?}")))?;
            Ok(endpoints.iter().map(endpoint_description).collect::<Vec<_>>())
        })
        .await?;

        debug!(endpoints = descriptions.len(), "Server endpoints listed");
        Ok(descriptions)
    }

    async fn open(&self, settings: ConnectionSettings) -> OpcUaResult<Arc<dyn EngineConnection>> {
        Ok(Arc::new(UaStackConnection::new(settings, self.settings.clone())))
    }

    async fn release_shared_resources(&self) {
        debug!("opcua engine holds no shared resources");
    }
}

// =============================================================================
// UaStackConnection
// =============================================================================

/// One `opcua` client session.
pub struct UaStackConnection {
    settings: ConnectionSettings,
    stack: UaStackSettings,
    session: Mutex<Option<SharedSession>>,
    stop_loop: Mutex<Option<oneshot::Sender<ua::SessionCommand>>>,
    listeners: Listeners,
    sinks: Sinks,
    subscription: tokio::sync::Mutex<Option<u32>>,
}

impl UaStackConnection {
    fn new(settings: ConnectionSettings, stack: UaStackSettings) -> Self {
        Self {
            settings,
            stack,
            session: Mutex::new(None),
            stop_loop: Mutex::new(None),
            listeners: Arc::new(Mutex::new(Vec::new())),
            sinks: Arc::new(Mutex::new(HashMap::new())),
            subscription: tokio::sync::Mutex::new(None),
        }
    }

    fn uri(&self) -> &str {
        &self.settings.endpoint_uri
    }

    fn session(&self) -> OpcUaResult<SharedSession> {
        self.session
            .lock()
            .clone()
            .ok_or_else(|| ConnectionError::not_connected(self.uri()).into())
    }

    async fn call<T, F>(&self, target: &str, task: F) -> OpcUaResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> OpcUaResult<T> + Send + 'static,
    {
        run_blocking(self.settings.request_timeout, target, task).await
    }

    /// Returns the session's subscription, creating it on first use with
    /// the publishing interval of the first monitored item.
    async fn subscription_id(&self, session: SharedSession, publishing: Duration) -> OpcUaResult<u32> {
        let mut current = self.subscription.lock().await;
        if let Some(id) = *current {
            return Ok(id);
        }

        let sinks = self.sinks.clone();
        let uri = self.uri().to_string();
        let id = self
            .call(self.uri(), move || {
                let callback = ua::DataChangeCallback::new(move |items| {
                    for item in items.iter() {
                        deliver(&sinks, item);
                    }
                });
                session
                    .read()
                    .create_subscription(publishing.as_millis() as f64, 10, 30, 0, 0, true, callback)
                    .map_err(|status| SubscriptionError::rejected(&uri, format!("{status:?}")).into())
            })
            .await?;

        info!(endpoint = %self.uri(), subscription_id = id, "Subscription created");
        *current = Some(id);
        Ok(id)
    }
}

fn notify(listeners: &Listeners, active: bool) {
    let listeners = listeners.lock().clone();
    for listener in listeners {
        if active {
            listener.on_session_active();
        } else {
            listener.on_session_inactive();
        }
    }
}

fn deliver(sinks: &Sinks, item: &ua::MonitoredItem) {
    let sink = sinks.lock().get(&item.id()).cloned();
    let Some(sink) = sink else {
        trace!(item_id = item.id(), "Value change for unknown monitored item");
        return;
    };
    let value = item
        .last_value()
        .value
        .as_ref()
        .map(from_ua_variant)
        .unwrap_or(Variant::Null);
    sink.on_value_changed(value);
}

#[async_trait]
impl EngineConnection for UaStackConnection {
    fn add_activity_listener(&self, listener: Arc<dyn SessionActivityListener>) {
        self.listeners.lock().push(listener);
    }

    #[instrument(skip(self), fields(endpoint = %self.settings.endpoint_uri))]
    async fn connect(&self) -> OpcUaResult<()> {
        let settings = self.settings.clone();
        let stack = self.stack.clone();
        let session = self
            .call(self.uri(), move || {
                let mut client = stack.build_client(&settings.application_name, &settings.application_uri)?;
                let endpoints = client
                    .get_server_endpoints_from_url(settings.endpoint_url.as_str())
                    .map_err(|status| ConnectionError::refused(&settings.endpoint_uri, format!("{status:?}")))?;

                let policy = settings.security_policy.uri();
                let endpoint = endpoints
                    .into_iter()
                    .find(|e| {
                        e.security_policy_uri.as_ref() == policy
                            && security_mode_name(e.security_mode) == settings.security_mode.as_str()
                    })
                    .ok_or_else(|| ConnectionError::no_suitable_endpoint(&settings.endpoint_uri, &policy))?;

                client
                    .connect_to_endpoint(endpoint, ua::IdentityToken::Anonymous)
                    .map_err(|status| ConnectionError::refused(&settings.endpoint_uri, format!("{status:?}")).into())
            })
            .await?;

        let listeners = self.listeners.clone();
        session
            .write()
            .set_connection_status_callback(ua::ConnectionStatusCallback::new(move |connected| {
                notify(&listeners, connected);
            }));

        let stop = ua::Session::run_async(session.clone());
        *self.stop_loop.lock() = Some(stop);
        *self.session.lock() = Some(session);

        info!("Connected to OPC UA server");
        notify(&self.listeners, true);
        Ok(())
    }

    #[instrument(skip(self), fields(endpoint = %self.settings.endpoint_uri))]
    async fn disconnect(&self) -> OpcUaResult<()> {
        self.listeners.lock().clear();
        self.sinks.lock().clear();
        *self.subscription.lock().await = None;

        if let Some(stop) = self.stop_loop.lock().take() {
            let _ = stop.send(ua::SessionCommand::Stop);
        }
        let Some(session) = self.session.lock().take() else {
            return Ok(());
        };

        self.call(self.uri(), move || {
            session.read().disconnect();
            Ok(())
        })
        .await?;
        info!("Disconnected from OPC UA server");
        Ok(())
    }

    async fn read(&self, node: &NodeId) -> OpcUaResult<Variant> {
        let session = self.session()?;
        let target = node.to_string();
        let request = read_value_id(node);
        trace!(node_id = %target, "Reading node value");

        self.call(&node.to_string(), move || {
            let values = session
                .read()
                .read(&[request], ua::TimestampsToReturn::Both, 0.0)
                .map_err(|status| OperationError::read_failed(&target, format!("{status:?}")))?;
            let value = values
                .into_iter()
                .next()
                .ok_or_else(|| OperationError::read_failed(&target, "no value returned"))?;
            if let Some(status) = value.status.filter(|s| !s.is_good()) {
                return Err(OperationError::read_failed(&target, format!("{status:?}")).into());
            }
            Ok(value.value.as_ref().map(from_ua_variant).unwrap_or(Variant::Null))
        })
        .await
    }

    async fn write(&self, node: &NodeId, value: Variant) -> OpcUaResult<()> {
        let session = self.session()?;
        let target = node.to_string();
        let request = ua::WriteValue {
            node_id: to_ua_node_id(node),
            attribute_id: ua::AttributeId::Value as u32,
            index_range: ua::UAString::null(),
            value: ua::DataValue::new_now(to_ua_variant(&value, &target)?),
        };
        trace!(node_id = %target, "Writing node value");

        self.call(&node.to_string(), move || {
            let results = session
                .read()
                .write(&[request])
                .map_err(|status| OperationError::write_failed(&target, format!("{status:?}")))?;
            match results.first() {
                Some(status) if status.is_good() => Ok(()),
                Some(status) => Err(OperationError::write_failed(&target, format!("{status:?}")).into()),
                None => Err(OperationError::write_failed(&target, "no status returned").into()),
            }
        })
        .await
    }

    async fn browse(&self, node: &NodeId, parameter: &BrowseParameter) -> OpcUaResult<Vec<BrowseResult>> {
        let session = self.session()?;
        let target = node.to_string();
        let limit = parameter.max_references_per_node as usize;
        let description = ua::BrowseDescription {
            node_id: to_ua_node_id(node),
            browse_direction: match parameter.direction {
                BrowseDirection::Forward => ua::BrowseDirection::Forward,
                BrowseDirection::Inverse => ua::BrowseDirection::Inverse,
                BrowseDirection::Both => ua::BrowseDirection::Both,
            },
            reference_type_id: ua::ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: ua::BrowseDescriptionResultMask::all().bits(),
        };
        trace!(node_id = %target, "Browsing node");

        let references = self
            .call(&node.to_string(), move || {
                let fail = |status: ua::StatusCode| OpcUaError::from(BrowseError::failed(&target, format!("{status:?}")));
                let session = session.read();

                let mut references = Vec::new();
                let mut page = session
                    .browse(&[description])
                    .map_err(fail)?
                    .and_then(|results| results.into_iter().next());
                while let Some(result) = page.take() {
                    if !result.status_code.is_good() {
                        return Err(fail(result.status_code));
                    }
                    references.extend(result.references.unwrap_or_default());
                    if result.continuation_point.is_null() || (limit > 0 && references.len() >= limit) {
                        break;
                    }
                    page = session
                        .browse_next(false, &[result.continuation_point])
                        .map_err(fail)?
                        .and_then(|results| results.into_iter().next());
                }
                Ok(references)
            })
            .await?;

        let mut results: Vec<BrowseResult> = references.iter().filter_map(browse_result).collect();
        if limit > 0 {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn call_method(
        &self,
        object: &NodeId,
        method: &NodeId,
        inputs: Vec<Variant>,
    ) -> OpcUaResult<Vec<Variant>> {
        let session = self.session()?;
        let target = method.to_string();
        let arguments = inputs
            .iter()
            .map(|v| to_ua_variant(v, &target))
            .collect::<OpcUaResult<Vec<_>>>()?;
        let request = ua::CallMethodRequest {
            object_id: to_ua_node_id(object),
            method_id: to_ua_node_id(method),
            input_arguments: Some(arguments),
        };

        self.call(&method.to_string(), move || {
            let result = session
                .read()
                .call(request)
                .map_err(|status| OperationError::call_failed(&target, format!("{status:?}")))?;
            if !result.status_code.is_good() {
                return Err(OperationError::call_failed(&target, format!("{:?}", result.status_code)).into());
            }
            Ok(result
                .output_arguments
                .unwrap_or_default()
                .iter()
                .map(from_ua_variant)
                .collect())
        })
        .await
    }

    async fn create_monitored_item(
        &self,
        node: &NodeId,
        parameters: MonitoringParameters,
        sink: Arc<dyn MonitoredItemSink>,
    ) -> OpcUaResult<u32> {
        let session = self.session()?;
        let subscription = self
            .subscription_id(session.clone(), parameters.sampling_interval)
            .await?;
        let target = node.to_string();
        let request = ua::MonitoredItemCreateRequest {
            item_to_monitor: read_value_id(node),
            monitoring_mode: ua::MonitoringMode::Reporting,
            requested_parameters: ua_parameters(parameters),
        };

        let item_id = self
            .call(&node.to_string(), move || {
                let results = session
                    .read()
                    .create_monitored_items(subscription, ua::TimestampsToReturn::Both, &[request])
                    .map_err(|status| SubscriptionError::rejected(&target, format!("{status:?}")))?;
                match results.first() {
                    Some(result) if result.status_code.is_good() => Ok(result.monitored_item_id),
                    Some(result) => {
                        Err(SubscriptionError::rejected(&target, format!("{:?}", result.status_code)).into())
                    }
                    None => Err(SubscriptionError::rejected(&target, "no result returned").into()),
                }
            })
            .await?;

        self.sinks.lock().insert(item_id, sink);
        debug!(node_id = %node, item_id, subscription_id = subscription, "Monitored item created");
        Ok(item_id)
    }

    async fn modify_monitored_item(&self, item_id: u32, parameters: MonitoringParameters) -> OpcUaResult<()> {
        let session = self.session()?;
        let subscription = (*self.subscription.lock().await)
            .ok_or_else(|| SubscriptionError::not_found(item_id.to_string()))?;
        let request = ua::MonitoredItemModifyRequest {
            monitored_item_id: item_id,
            requested_parameters: ua_parameters(parameters),
        };

        self.call(self.uri(), move || {
            let results = session
                .read()
                .modify_monitored_items(subscription, ua::TimestampsToReturn::Both, &[request])
                .map_err(|status| SubscriptionError::rejected(item_id.to_string(), format!("{status:?}")))?;
            match results.first() {
                Some(result) if !result.status_code.is_good() => Err(SubscriptionError::rejected(
                    item_id.to_string(),
                    format!("{:?}", result.status_code),
                )
                .into()),
                _ => Ok(()),
            }
        })
        .await
    }

    async fn delete_monitored_item(&self, item_id: u32) -> OpcUaResult<()> {
        self.sinks.lock().remove(&item_id);
        let session = self.session()?;
        let Some(subscription) = *self.subscription.lock().await else {
            warn!(item_id, "No subscription holds the monitored item");
            return Ok(());
        };

        self.call(self.uri(), move || {
            session
                .read()
                .delete_monitored_items(subscription, &[item_id])
                .map_err(|status| SubscriptionError::rejected(item_id.to_string(), format!("{status:?}")))?;
            Ok(())
        })
        .await
    }
}

// =============================================================================
// Blocking calls
// =============================================================================

async fn run_blocking<T, F>(timeout: Duration, target: &str, task: F) -> OpcUaResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> OpcUaResult<T> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(task)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ConnectionError::refused(target, format!("opcua call aborted: {e}")).into()),
        Err(_) => Err(OperationError::Timeout {
            node_id: target.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
        .into()),
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn security_mode_name(mode: ua::MessageSecurityMode) -> &'static str {
    match mode {
        ua::MessageSecurityMode::None => SecurityMode::None.as_str(),
        ua::MessageSecurityMode::Sign => SecurityMode::Sign.as_str(),
        ua::MessageSecurityMode::SignAndEncrypt => SecurityMode::SignAndEncrypt.as_str(),
        _ => "Invalid",
    }
}

fn endpoint_description(endpoint: &ua::EndpointDescription) -> EndpointDescription {
    EndpointDescription {
        endpoint_url: endpoint.endpoint_url.as_ref().to_string(),
        security_policy_uri: endpoint.security_policy_uri.as_ref().to_string(),
        security_mode: security_mode_name(endpoint.security_mode).to_string(),
        security_level: endpoint.security_level,
    }
}

fn ua_parameters(parameters: MonitoringParameters) -> ua::MonitoringParameters {
    ua::MonitoringParameters {
        client_handle: 0,
        sampling_interval: parameters.sampling_interval.as_millis() as f64,
        filter: ua::ExtensionObject::null(),
        queue_size: parameters.queue_size,
        discard_oldest: true,
    }
}

fn read_value_id(node: &NodeId) -> ua::ReadValueId {
    ua::ReadValueId {
        node_id: to_ua_node_id(node),
        attribute_id: ua::AttributeId::Value as u32,
        index_range: ua::UAString::null(),
        data_encoding: ua::QualifiedName::null(),
    }
}

fn to_ua_node_id(node: &NodeId) -> ua::NodeId {
    match &node.identifier {
        NodeIdentifier::Numeric(v) => ua::NodeId::new(node.namespace_index, *v),
        NodeIdentifier::String(v) => ua::NodeId::new(node.namespace_index, v.clone()),
        NodeIdentifier::Guid(v) => ua::NodeId::new(node.namespace_index, ua::Guid::from_bytes(*v.as_bytes())),
    }
}

fn node_class(class: ua::NodeClass) -> Option<NodeClass> {
    match class {
        ua::NodeClass::Object => Some(NodeClass::Object),
        ua::NodeClass::Variable => Some(NodeClass::Variable),
        ua::NodeClass::Method => Some(NodeClass::Method),
        ua::NodeClass::ObjectType => Some(NodeClass::ObjectType),
        ua::NodeClass::VariableType => Some(NodeClass::VariableType),
        ua::NodeClass::ReferenceType => Some(NodeClass::ReferenceType),
        ua::NodeClass::DataType => Some(NodeClass::DataType),
        ua::NodeClass::View => Some(NodeClass::View),
        _ => None,
    }
}

fn browse_result(reference: &ua::ReferenceDescription) -> Option<BrowseResult> {
    let Some(class) = node_class(reference.node_class) else {
        trace!(node_id = %reference.node_id.node_id, "Reference without node class skipped");
        return None;
    };
    Some(BrowseResult {
        browse_name: reference.browse_name.name.as_ref().to_string(),
        node_id: reference.node_id.node_id.to_string(),
        display_name: reference.display_name.text.as_ref().to_string(),
        node_class: class,
    })
}

fn from_ua_variant(variant: &ua::Variant) -> Variant {
    match variant {
        ua::Variant::Empty => Variant::Null,
        ua::Variant::Boolean(v) => Variant::Boolean(*v),
        ua::Variant::SByte(v) => Variant::SByte(*v),
        ua::Variant::Byte(v) => Variant::Byte(*v),
        ua::Variant::Int16(v) => Variant::Int16(*v),
        ua::Variant::UInt16(v) => Variant::UInt16(*v),
        ua::Variant::Int32(v) => Variant::Int32(*v),
        ua::Variant::UInt32(v) => Variant::UInt32(*v),
        ua::Variant::Int64(v) => Variant::Int64(*v),
        ua::Variant::UInt64(v) => Variant::UInt64(*v),
        ua::Variant::Float(v) => Variant::Float(*v),
        ua::Variant::Double(v) => Variant::Double(*v),
        ua::Variant::String(v) => Variant::String(v.as_ref().to_string()),
        ua::Variant::DateTime(v) => Variant::DateTime(v.as_chrono()),
        ua::Variant::Guid(v) => Variant::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
        ua::Variant::ByteString(v) => Variant::ByteString(v.value.clone().unwrap_or_default()),
        ua::Variant::Array(array) => Variant::Array(array.values.iter().map(from_ua_variant).collect()),
        other => Variant::String(format!("{other:?}")),
    }
}

fn to_ua_variant(value: &Variant, target: &str) -> OpcUaResult<ua::Variant> {
    Ok(match value {
        Variant::Null => ua::Variant::Empty,
        Variant::Boolean(v) => ua::Variant::Boolean(*v),
        Variant::SByte(v) => ua::Variant::SByte(*v),
        Variant::Byte(v) => ua::Variant::Byte(*v),
        Variant::Int16(v) => ua::Variant::Int16(*v),
        Variant::UInt16(v) => ua::Variant::UInt16(*v),
        Variant::Int32(v) => ua::Variant::Int32(*v),
        Variant::UInt32(v) => ua::Variant::UInt32(*v),
        Variant::Int64(v) => ua::Variant::Int64(*v),
        Variant::UInt64(v) => ua::Variant::UInt64(*v),
        Variant::Float(v) => ua::Variant::Float(*v),
        Variant::Double(v) => ua::Variant::Double(*v),
        Variant::String(v) => ua::Variant::String(ua::UAString::from(v.as_str())),
        Variant::DateTime(v) => ua::Variant::DateTime(Box::new(ua::DateTime::from(*v))),
        Variant::Guid(v) => ua::Variant::Guid(Box::new(ua::Guid::from_bytes(*v.as_bytes()))),
        Variant::ByteString(v) => ua::Variant::ByteString(ua::ByteString::from(v.as_slice())),
        Variant::Array(values) => {
            let values = values
                .iter()
                .map(|v| to_ua_variant(v, target))
                .collect::<OpcUaResult<Vec<_>>>()?;
            let type_id = values
                .first()
                .map(|v| v.type_id())
                .unwrap_or(ua::VariantTypeId::Empty);
            let array = ua::Array::new(type_id, values)
                .map_err(|status| OperationError::write_failed(target, format!("mixed array: {status:?}")))?;
            ua::Variant::Array(Box::new(array))
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use edge_core::{EndpointConfig, SECURITY_POLICY_NONE_URI};

    fn connection_settings(uri: &str) -> ConnectionSettings {
        ConnectionSettings::new(uri, &EndpointDescription::unsecured(uri), &EndpointConfig::default())
    }

    #[test]
    fn test_node_ids_print_in_gateway_syntax() {
        let node = NodeId::string(2, "Boiler.Temp");
        let ua_node = to_ua_node_id(&node);
        assert_eq!(ua_node.to_string(), "ns=2;s=Boiler.Temp");
        assert_eq!(ua_node.to_string().parse::<NodeId>().unwrap(), node);

        assert_eq!(to_ua_node_id(&NodeId::objects_folder()).to_string(), "i=85");
    }

    #[test]
    fn test_values_cross_the_stack() {
        let when = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let value = Variant::Array(vec![Variant::DateTime(when), Variant::DateTime(when)]);
        let back = from_ua_variant(&to_ua_variant(&value, "ns=2;s=Log").unwrap());
        assert_eq!(back, value);

        assert_eq!(from_ua_variant(&ua::Variant::Empty), Variant::Null);
        assert_eq!(
            from_ua_variant(&to_ua_variant(&Variant::from("on"), "ns=2;s=Mode").unwrap()),
            Variant::String("on".to_string())
        );
    }

    #[test]
    fn test_mixed_array_rejected() {
        let value = Variant::Array(vec![Variant::Int32(1), Variant::from("two")]);
        let err = to_ua_variant(&value, "ns=2;s=Mixed").unwrap_err();
        assert!(matches!(err, OpcUaError::Operation(OperationError::WriteFailed { .. })));
    }

    #[test]
    fn test_endpoint_description_mapping() {
        let mut endpoint = ua::EndpointDescription::from((
            "opc.tcp://10.0.0.5:4840/plc",
            SECURITY_POLICY_NONE_URI,
            ua::MessageSecurityMode::None,
            ua::UserTokenPolicy::anonymous(),
        ));
        endpoint.security_level = 3;
        let description = endpoint_description(&endpoint);
        assert_eq!(description.endpoint_url, "opc.tcp://10.0.0.5:4840/plc");
        assert_eq!(description.security_policy_uri, SECURITY_POLICY_NONE_URI);
        assert_eq!(description.security_mode, "None");
        assert_eq!(description.security_level, 3);
    }

    #[test]
    fn test_unspecified_node_class_skipped() {
        assert_eq!(node_class(ua::NodeClass::Variable), Some(NodeClass::Variable));
        assert_eq!(node_class(ua::NodeClass::Unspecified), None);
    }

    #[tokio::test]
    async fn test_operations_need_a_connection() {
        let engine = UaStackEngine::new(UaStackSettings::default());
        assert_eq!(engine.name(), "opcua");

        let connection = engine
            .open(connection_settings("opc.tcp://10.0.0.5:4840/plc"))
            .await
            .unwrap();
        let err = connection.read(&NodeId::string(2, "Temp1")).await.unwrap_err();
        assert!(matches!(err, OpcUaError::Connection(ConnectionError::NotConnected { .. })));

        // Disconnecting a connection that never connected is a no-op.
        assert!(connection.disconnect().await.is_ok());
    }
}
