// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! - [`MockEngine`]: a protocol engine with failure injection, manual
//!   session activity and call recording
//! - [`RecordingReceiver`]: captures every callback the gateway makes

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{
    BrowseParameter, BrowseResult, Callbacks, CapabilityKeys, Device, DiscoveryReceiver,
    EndpointDescription, EndpointInfo, Message, MessageReceiver, StatusCode, StatusReceiver,
    Variant,
};
use edge_opcua::{
    ConnectionError, ConnectionSettings, DiscoveryError, EngineConnection, MonitoredItemSink,
    MonitoringParameters, NodeId, OpcUaResult, OperationError, ProtocolEngine,
    SessionActivityListener, SubscriptionError,
};
use parking_lot::Mutex;

// =============================================================================
// Mock Engine
// =============================================================================

#[derive(Default)]
struct MockState {
    values: Mutex<HashMap<NodeId, Variant>>,
    connections: Mutex<HashMap<String, Arc<MockConnection>>>,
    calls: Mutex<Vec<String>>,
    writes: Mutex<Vec<(NodeId, Variant)>>,
    fail_discovery: AtomicBool,
    fail_connect: AtomicBool,
    fail_disconnect: AtomicBool,
    fail_reads: AtomicBool,
    manual_activation: AtomicBool,
    stalled_browse: Mutex<HashSet<String>>,
    advertised: Mutex<HashMap<String, Vec<EndpointDescription>>>,
    releases: AtomicU64,
}

impl MockState {
    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

/// A configurable protocol engine for testing.
///
/// Sessions activate as soon as they connect unless manual activation is
/// enabled; [`MockEngine::activate`] and [`MockEngine::deactivate`] drive
/// activity by hand. Browsing returns no references, or never returns for
/// endpoints passed to [`MockEngine::stall_browse`].
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<MockState>,
}

impl MockEngine {
    /// Creates a mock engine that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes endpoint discovery fail.
    pub fn fail_discovery(&self, fail: bool) {
        self.state.fail_discovery.store(fail, Ordering::SeqCst);
    }

    /// Makes `connect` fail.
    pub fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes `disconnect` fail.
    pub fn fail_disconnect(&self, fail: bool) {
        self.state.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Makes every read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Sessions stay connecting until [`MockEngine::activate`] is called.
    pub fn manual_activation(&self, manual: bool) {
        self.state.manual_activation.store(manual, Ordering::SeqCst);
    }

    /// Makes every browse on connections to `uri` hang.
    pub fn stall_browse(&self, uri: &str) {
        self.state.stalled_browse.lock().insert(uri.to_string());
    }

    /// Adds endpoint descriptions to what discovery returns for `uri`.
    pub fn advertise(&self, uri: &str, descriptions: Vec<EndpointDescription>) {
        self.state
            .advertised
            .lock()
            .entry(uri.to_string())
            .or_default()
            .extend(descriptions);
    }

    /// Sets the value returned for a node.
    pub fn set_value(&self, node: NodeId, value: impl Into<Variant>) {
        self.state.values.lock().insert(node, value.into());
    }

    /// Reports the session of `uri` active. Returns `false` when unknown.
    pub fn activate(&self, uri: &str) -> bool {
        match self.connection(uri) {
            Some(connection) => {
                connection.notify(true);
                true
            }
            None => false,
        }
    }

    /// Reports the session of `uri` inactive. Returns `false` when unknown.
    pub fn deactivate(&self, uri: &str) -> bool {
        match self.connection(uri) {
            Some(connection) => {
                connection.notify(false);
                true
            }
            None => false,
        }
    }

    /// Pushes a value change to every monitored item on `node`.
    pub fn emit_value(&self, uri: &str, node: &NodeId, value: impl Into<Variant>) -> usize {
        let Some(connection) = self.connection(uri) else {
            return 0;
        };
        let value = value.into();
        let sinks: Vec<_> = connection
            .items
            .lock()
            .values()
            .filter(|(item_node, _)| item_node == node)
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in &sinks {
            sink.on_value_changed(value.clone());
        }
        sinks.len()
    }

    /// Returns the recorded calls, e.g. `connect:opc.tcp://...`.
    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().clone()
    }

    /// Counts recorded calls starting with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Returns every write in the order it was executed.
    pub fn writes(&self) -> Vec<(NodeId, Variant)> {
        self.state.writes.lock().clone()
    }

    /// Number of monitored items on the connection of `uri`.
    pub fn monitored_item_count(&self, uri: &str) -> usize {
        self.connection(uri).map_or(0, |c| c.items.lock().len())
    }

    /// Number of `release_shared_resources` calls.
    pub fn release_count(&self) -> u64 {
        self.state.releases.load(Ordering::SeqCst)
    }

    fn connection(&self, uri: &str) -> Option<Arc<MockConnection>> {
        self.state.connections.lock().get(uri).cloned()
    }
}

#[async_trait]
impl ProtocolEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn discover_endpoints(&self, uri: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        self.state.record(format!("discover:{uri}"));
        if self.state.fail_discovery.load(Ordering::SeqCst) {
            return Err(DiscoveryError::failed(uri, "injected discovery failure").into());
        }
        let mut descriptions = vec![EndpointDescription::unsecured(uri)];
        if let Some(extra) = self.state.advertised.lock().get(uri) {
            descriptions.extend(extra.iter().cloned());
        }
        Ok(descriptions)
    }

    async fn open(&self, settings: ConnectionSettings) -> OpcUaResult<Arc<dyn EngineConnection>> {
        self.state.record(format!("open:{}", settings.endpoint_uri));
        let connection = Arc::new(MockConnection {
            uri: settings.endpoint_uri.clone(),
            state: self.state.clone(),
            listeners: Mutex::new(Vec::new()),
            items: Mutex::new(HashMap::new()),
            next_item: AtomicU32::new(1),
        });
        self.state
            .connections
            .lock()
            .insert(settings.endpoint_uri, connection.clone());
        Ok(connection)
    }

    async fn release_shared_resources(&self) {
        self.state.record("release".to_string());
        self.state.releases.fetch_add(1, Ordering::SeqCst);
    }
}

type MonitoredItems = HashMap<u32, (NodeId, Arc<dyn MonitoredItemSink>)>;

struct MockConnection {
    uri: String,
    state: Arc<MockState>,
    listeners: Mutex<Vec<Arc<dyn SessionActivityListener>>>,
    items: Mutex<MonitoredItems>,
    next_item: AtomicU32,
}

impl MockConnection {
    fn notify(&self, active: bool) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            if active {
                listener.on_session_active();
            } else {
                listener.on_session_inactive();
            }
        }
    }
}

#[async_trait]
impl EngineConnection for MockConnection {
    fn add_activity_listener(&self, listener: Arc<dyn SessionActivityListener>) {
        self.listeners.lock().push(listener);
    }

    async fn connect(&self) -> OpcUaResult<()> {
        self.state.record(format!("connect:{}", self.uri));
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectionError::refused(&self.uri, "injected connect failure").into());
        }
        if !self.state.manual_activation.load(Ordering::SeqCst) {
            self.notify(true);
        }
        Ok(())
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.state.record(format!("disconnect:{}", self.uri));
        self.items.lock().clear();
        if self.state.fail_disconnect.load(Ordering::SeqCst) {
            return Err(ConnectionError::disconnect_failed(&self.uri, "injected disconnect failure").into());
        }
        Ok(())
    }

    async fn read(&self, node: &NodeId) -> OpcUaResult<Variant> {
        self.state.record(format!("read:{node}"));
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(OperationError::read_failed(node.to_string(), "injected read failure").into());
        }
        self.state
            .values
            .lock()
            .get(node)
            .cloned()
            .ok_or_else(|| OperationError::node_not_found(node.to_string()).into())
    }

    async fn write(&self, node: &NodeId, value: Variant) -> OpcUaResult<()> {
        self.state.record(format!("write:{node}"));
        self.state.values.lock().insert(node.clone(), value.clone());
        self.state.writes.lock().push((node.clone(), value));
        Ok(())
    }

    async fn browse(&self, node: &NodeId, _parameter: &BrowseParameter) -> OpcUaResult<Vec<BrowseResult>> {
        self.state.record(format!("browse:{node}"));
        let stalled = self.state.stalled_browse.lock().contains(&self.uri);
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(Vec::new())
    }

    async fn call_method(
        &self,
        object: &NodeId,
        method: &NodeId,
        inputs: Vec<Variant>,
    ) -> OpcUaResult<Vec<Variant>> {
        self.state.record(format!("call:{object}:{method}"));
        Ok(inputs)
    }

    async fn create_monitored_item(
        &self,
        node: &NodeId,
        _parameters: MonitoringParameters,
        sink: Arc<dyn MonitoredItemSink>,
    ) -> OpcUaResult<u32> {
        self.state.record(format!("monitor:{node}"));
        let id = self.next_item.fetch_add(1, Ordering::SeqCst);
        self.items.lock().insert(id, (node.clone(), sink));
        Ok(id)
    }

    async fn modify_monitored_item(&self, item_id: u32, _parameters: MonitoringParameters) -> OpcUaResult<()> {
        self.state.record(format!("modify:{item_id}"));
        if self.items.lock().contains_key(&item_id) {
            Ok(())
        } else {
            Err(SubscriptionError::not_found(item_id.to_string()).into())
        }
    }

    async fn delete_monitored_item(&self, item_id: u32) -> OpcUaResult<()> {
        self.state.record(format!("unmonitor:{item_id}"));
        match self.items.lock().remove(&item_id) {
            Some(_) => Ok(()),
            None => Err(SubscriptionError::not_found(item_id.to_string()).into()),
        }
    }
}

// =============================================================================
// Recording Receiver
// =============================================================================

/// One captured callback.
#[derive(Debug, Clone)]
pub enum ReceivedEvent {
    /// General response.
    Response(Message),
    /// Monitored-item report.
    Report(Message),
    /// Error message.
    Error(Message),
    /// Browse results of one request.
    Browse {
        /// Endpoint URI.
        endpoint: Option<String>,
        /// Results.
        results: Vec<BrowseResult>,
        /// Request id.
        request_id: String,
    },
    /// Start status with the capability manifest.
    Start {
        /// Endpoint URI.
        endpoint: String,
        /// Status.
        status: StatusCode,
        /// Capability keys.
        keys: CapabilityKeys,
    },
    /// Stop status.
    Stop {
        /// Endpoint URI.
        endpoint: String,
        /// Status.
        status: StatusCode,
    },
    /// Network status.
    Network {
        /// Endpoint URI.
        endpoint: String,
        /// Status.
        status: StatusCode,
    },
    /// Device found by GET_ENDPOINTS.
    Found(Device),
    /// Device announced in another device's endpoint listing.
    Announced(Device),
}

/// Captures every callback in arrival order.
#[derive(Debug, Default)]
pub struct RecordingReceiver {
    events: Mutex<Vec<ReceivedEvent>>,
}

impl RecordingReceiver {
    /// Creates an empty receiver.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Callbacks with this receiver registered for all three sets.
    pub fn callbacks(self: &Arc<Self>) -> Callbacks {
        Callbacks::new()
            .with_message_receiver(self.clone())
            .with_status_receiver(self.clone())
            .with_discovery_receiver(self.clone())
    }

    /// Returns all events.
    pub fn events(&self) -> Vec<ReceivedEvent> {
        self.events.lock().clone()
    }

    /// Number of captured events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Clears all events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// General responses.
    pub fn responses(&self) -> Vec<Message> {
        self.collect(|e| match e {
            ReceivedEvent::Response(m) => Some(m.clone()),
            _ => None,
        })
    }

    /// Monitored-item reports.
    pub fn reports(&self) -> Vec<Message> {
        self.collect(|e| match e {
            ReceivedEvent::Report(m) => Some(m.clone()),
            _ => None,
        })
    }

    /// Error messages.
    pub fn errors(&self) -> Vec<Message> {
        self.collect(|e| match e {
            ReceivedEvent::Error(m) => Some(m.clone()),
            _ => None,
        })
    }

    /// Browse results keyed by request id.
    pub fn browse_results(&self) -> Vec<(String, Vec<BrowseResult>)> {
        self.collect(|e| match e {
            ReceivedEvent::Browse {
                results, request_id, ..
            } => Some((request_id.clone(), results.clone())),
            _ => None,
        })
    }

    /// Found devices.
    pub fn devices(&self) -> Vec<Device> {
        self.collect(|e| match e {
            ReceivedEvent::Found(d) => Some(d.clone()),
            _ => None,
        })
    }

    /// Devices announced by another device's endpoint listing.
    pub fn announced(&self) -> Vec<Device> {
        self.collect(|e| match e {
            ReceivedEvent::Announced(d) => Some(d.clone()),
            _ => None,
        })
    }

    /// Every status for an endpoint, in order.
    pub fn statuses(&self, uri: &str) -> Vec<StatusCode> {
        self.collect(|e| match e {
            ReceivedEvent::Start { endpoint, status, .. }
            | ReceivedEvent::Stop { endpoint, status }
            | ReceivedEvent::Network { endpoint, status }
                if endpoint == uri =>
            {
                Some(*status)
            }
            _ => None,
        })
    }

    /// Returns `true` once `status` was reported for `uri`.
    pub fn has_status(&self, uri: &str, status: StatusCode) -> bool {
        self.statuses(uri).contains(&status)
    }

    /// Capability keys of the last start status for `uri`.
    pub fn start_keys(&self, uri: &str) -> Option<CapabilityKeys> {
        self.collect(|e| match e {
            ReceivedEvent::Start { endpoint, keys, .. } if endpoint == uri => Some(keys.clone()),
            _ => None,
        })
        .pop()
    }

    fn collect<T>(&self, f: impl Fn(&ReceivedEvent) -> Option<T>) -> Vec<T> {
        self.events.lock().iter().filter_map(f).collect()
    }

    fn push(&self, event: ReceivedEvent) {
        self.events.lock().push(event);
    }
}

impl MessageReceiver for RecordingReceiver {
    fn on_response_messages(&self, message: Message) {
        self.push(ReceivedEvent::Response(message));
    }

    fn on_monitored_message(&self, message: Message) {
        self.push(ReceivedEvent::Report(message));
    }

    fn on_error_message(&self, message: Message) {
        self.push(ReceivedEvent::Error(message));
    }

    fn on_browse_message(&self, endpoint: Option<EndpointInfo>, results: Vec<BrowseResult>, request_id: String) {
        self.push(ReceivedEvent::Browse {
            endpoint: endpoint.map(|e| e.endpoint_uri),
            results,
            request_id,
        });
    }
}

impl StatusReceiver for RecordingReceiver {
    fn on_start(&self, endpoint: EndpointInfo, status: StatusCode, keys: CapabilityKeys) {
        self.push(ReceivedEvent::Start {
            endpoint: endpoint.endpoint_uri,
            status,
            keys,
        });
    }

    fn on_stop(&self, endpoint: EndpointInfo, status: StatusCode) {
        self.push(ReceivedEvent::Stop {
            endpoint: endpoint.endpoint_uri,
            status,
        });
    }

    fn on_network_status(&self, endpoint: EndpointInfo, status: StatusCode) {
        self.push(ReceivedEvent::Network {
            endpoint: endpoint.endpoint_uri,
            status,
        });
    }
}

impl DiscoveryReceiver for RecordingReceiver {
    fn on_found_endpoint(&self, device: Device) {
        self.push(ReceivedEvent::Found(device));
    }

    fn on_found_device(&self, device: Device) {
        self.push(ReceivedEvent::Announced(device));
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_engine_records_calls() {
        let engine = MockEngine::new();
        let uri = "opc.tcp://mock:4840/srv";
        let descriptions = engine.discover_endpoints(uri).await.unwrap();
        assert_eq!(descriptions.len(), 1);

        engine.fail_discovery(true);
        assert!(engine.discover_endpoints(uri).await.is_err());
        assert_eq!(engine.call_count("discover:"), 2);
    }

    #[test]
    fn test_recording_receiver_filters() {
        let receiver = RecordingReceiver::new();
        let uri = "opc.tcp://mock:4840/srv";
        receiver.on_network_status(EndpointInfo::new(uri), StatusCode::Connected);
        receiver.on_start(EndpointInfo::new(uri), StatusCode::ClientStarted, CapabilityKeys::default());
        receiver.on_stop(EndpointInfo::new("opc.tcp://other"), StatusCode::StopClient);

        assert_eq!(receiver.statuses(uri), vec![StatusCode::Connected, StatusCode::ClientStarted]);
        assert!(receiver.start_keys(uri).is_some());
        assert_eq!(receiver.len(), 3);
        receiver.clear();
        assert!(receiver.is_empty());
    }
}
