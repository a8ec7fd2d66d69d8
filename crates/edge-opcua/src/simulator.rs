// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory simulation engine.
//!
//! [`SimulatedEngine`] implements both [`ProtocolEngine`] and
//! [`ServerEngine`] over in-memory address spaces. Hosted servers are keyed
//! by endpoint URI; the embedded server started through [`ServerEngine`]
//! becomes one of them, so a client in the same process can connect to it.
//!
//! Sessions report themselves active shortly after `connect` and inactive
//! on `disconnect` or when a server is taken offline with
//! [`SimulatedEngine::set_server_online`]. Writes fire the monitored items
//! of the written node.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use edge_core::{
    BrowseDirection, BrowseParameter, BrowseResult, EndpointDescription, EndpointInfo, NodeClass,
    Variant,
};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info, trace};

use crate::engine::{
    ConnectionSettings, EngineConnection, MethodHandler, MonitoredItemSink, MonitoringParameters,
    NodeItem, NodeReference, ProtocolEngine, ServerEngine, SessionActivityListener,
};
use crate::error::{
    BrowseError, ConnectionError, DiscoveryError, OpcUaResult, OperationError, ServerError,
    SubscriptionError,
};
use crate::types::{well_known, NodeId};

/// Default delay between `connect` and the session-active notification.
pub const DEFAULT_ACTIVATION_DELAY: Duration = Duration::from_millis(10);

/// Namespace URI of the demo server's nodes.
pub const DEMO_NAMESPACE: &str = "urn:edge:demo";

// =============================================================================
// Address space
// =============================================================================

struct SimNode {
    browse_name: String,
    display_name: String,
    node_class: NodeClass,
    value: Variant,
    method: Option<Arc<dyn MethodHandler>>,
}

struct Monitor {
    node_id: NodeId,
    parameters: MonitoringParameters,
    sink: Arc<dyn MonitoredItemSink>,
}

/// Nodes, references, namespaces and monitored items of one server.
struct AddressSpace {
    nodes: HashMap<NodeId, SimNode>,
    forward: HashMap<NodeId, Vec<NodeId>>,
    inverse: HashMap<NodeId, Vec<NodeId>>,
    namespaces: HashMap<String, (u16, NodeId)>,
    by_name: HashMap<(u16, String), NodeId>,
    created: Vec<NodeId>,
    monitors: HashMap<u32, Monitor>,
    next_item: u32,
}

impl AddressSpace {
    fn new() -> Self {
        let mut space = Self {
            nodes: HashMap::new(),
            forward: HashMap::new(),
            inverse: HashMap::new(),
            namespaces: HashMap::new(),
            by_name: HashMap::new(),
            created: Vec::new(),
            monitors: HashMap::new(),
            next_item: 1,
        };
        let root = NodeId::root_folder();
        space.insert(root.clone(), object("Root"));
        for (id, name) in [
            (well_known::OBJECTS_FOLDER, "Objects"),
            (well_known::TYPES_FOLDER, "Types"),
            (well_known::VIEWS_FOLDER, "Views"),
        ] {
            space.insert(NodeId::numeric(0, id), object(name));
            space.link(&root, &NodeId::numeric(0, id));
        }
        space.insert(NodeId::numeric(0, well_known::SERVER), object("Server"));
        space.link(&NodeId::objects_folder(), &NodeId::numeric(0, well_known::SERVER));
        space
    }

    fn demo() -> Self {
        let mut space = Self::new();
        let boiler = NodeId::string(2, "Boiler");
        space
            .namespaces
            .insert(DEMO_NAMESPACE.to_string(), (2, boiler.clone()));
        space.insert(boiler.clone(), object("Boiler"));
        space.link(&NodeId::objects_folder(), &boiler);

        for (name, value) in [("Temp1", 21.5), ("Pressure", 1.2)] {
            let id = NodeId::string(2, name);
            space.insert(
                id.clone(),
                SimNode {
                    browse_name: name.to_string(),
                    display_name: name.to_string(),
                    node_class: NodeClass::Variable,
                    value: Variant::Double(value),
                    method: None,
                },
            );
            space.link(&boiler, &id);
        }

        let reset = NodeId::string(2, "Reset");
        let handler: Arc<dyn MethodHandler> =
            Arc::new(|_inputs: Vec<Variant>| -> Result<Vec<Variant>, String> {
                Ok(vec![Variant::Boolean(true)])
            });
        space.insert(
            reset.clone(),
            SimNode {
                browse_name: "Reset".to_string(),
                display_name: "Reset".to_string(),
                node_class: NodeClass::Method,
                value: Variant::Null,
                method: Some(handler),
            },
        );
        space.link(&boiler, &reset);
        space
    }

    fn insert(&mut self, id: NodeId, node: SimNode) {
        self.by_name
            .insert((id.namespace_index, node.browse_name.clone()), id.clone());
        self.nodes.insert(id, node);
    }

    fn link(&mut self, source: &NodeId, target: &NodeId) {
        self.forward.entry(source.clone()).or_default().push(target.clone());
        self.inverse.entry(target.clone()).or_default().push(source.clone());
    }

    fn browse_result(&self, id: &NodeId) -> Option<BrowseResult> {
        self.nodes.get(id).map(|node| BrowseResult {
            browse_name: node.browse_name.clone(),
            node_id: id.to_string(),
            display_name: node.display_name.clone(),
            node_class: node.node_class,
        })
    }

    /// Sets a variable value; returns the sinks to notify.
    fn set_value(&mut self, id: &NodeId, value: Variant) -> OpcUaResult<Vec<Arc<dyn MonitoredItemSink>>> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| OperationError::node_not_found(id.to_string()))?;
        if node.node_class != NodeClass::Variable {
            return Err(OperationError::write_failed(id.to_string(), "node is not a variable").into());
        }
        node.value = value;
        Ok(self
            .monitors
            .values()
            .filter(|m| &m.node_id == id)
            .map(|m| m.sink.clone())
            .collect())
    }

    fn namespace(&self, name: &str) -> OpcUaResult<(u16, NodeId)> {
        self.namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::rejected(format!("unknown namespace '{name}'")).into())
    }

    fn lookup(&self, namespace: &str, browse_name: &str) -> OpcUaResult<NodeId> {
        let (index, _) = self.namespace(namespace)?;
        self.by_name
            .get(&(index, browse_name.to_string()))
            .cloned()
            .ok_or_else(|| {
                ServerError::rejected(format!("no node '{browse_name}' in '{namespace}'")).into()
            })
    }
}

fn object(name: &str) -> SimNode {
    SimNode {
        browse_name: name.to_string(),
        display_name: name.to_string(),
        node_class: NodeClass::Object,
        value: Variant::Null,
        method: None,
    }
}

fn notify_sinks(sinks: Vec<Arc<dyn MonitoredItemSink>>, value: &Variant) {
    for sink in sinks {
        sink.on_value_changed(value.clone());
    }
}

// =============================================================================
// Hosted server
// =============================================================================

struct SimServer {
    uri: String,
    online: AtomicBool,
    space: Arc<Mutex<AddressSpace>>,
    connections: Mutex<Vec<Weak<ConnectionState>>>,
}

impl SimServer {
    fn new(uri: impl Into<String>, space: Arc<Mutex<AddressSpace>>) -> Arc<Self> {
        Arc::new(Self {
            uri: uri.into(),
            online: AtomicBool::new(true),
            space,
            connections: Mutex::new(Vec::new()),
        })
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    fn live_connections(&self) -> Vec<Arc<ConnectionState>> {
        let mut connections = self.connections.lock();
        connections.retain(|c| c.strong_count() > 0);
        connections.iter().filter_map(Weak::upgrade).collect()
    }
}

// =============================================================================
// Client connection
// =============================================================================

struct ConnectionState {
    listeners: Mutex<Vec<Arc<dyn SessionActivityListener>>>,
    connected: AtomicBool,
    items: Mutex<HashSet<u32>>,
}

impl ConnectionState {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Delivers an activity notification on a runtime task.
fn notify_activity(state: Arc<ConnectionState>, server: Arc<SimServer>, active: bool, delay: Duration) {
    let deliver = move || {
        if active && !(state.is_connected() && server.is_online()) {
            return;
        }
        let listeners = state.listeners.lock().clone();
        for listener in listeners {
            if active {
                listener.on_session_active();
            } else {
                listener.on_session_inactive();
            }
        }
    };

    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                deliver();
            });
        }
        Err(_) => deliver(),
    }
}

struct SimConnection {
    server: Arc<SimServer>,
    settings: ConnectionSettings,
    state: Arc<ConnectionState>,
    activation_delay: Duration,
}

impl SimConnection {
    fn ensure_connected(&self) -> OpcUaResult<()> {
        if self.state.is_connected() && self.server.is_online() {
            Ok(())
        } else {
            Err(ConnectionError::not_connected(&self.settings.endpoint_uri).into())
        }
    }

    fn drop_items(&self) {
        let items: Vec<u32> = self.state.items.lock().drain().collect();
        let mut space = self.server.space.lock();
        for id in items {
            space.monitors.remove(&id);
        }
    }
}

#[async_trait]
impl EngineConnection for SimConnection {
    fn add_activity_listener(&self, listener: Arc<dyn SessionActivityListener>) {
        self.state.listeners.lock().push(listener);
    }

    async fn connect(&self) -> OpcUaResult<()> {
        if !self.server.is_online() {
            return Err(ConnectionError::refused(&self.settings.endpoint_uri, "server offline").into());
        }
        self.state.connected.store(true, Ordering::Release);
        debug!(
            endpoint = %self.settings.endpoint_uri,
            policy = %self.settings.security_policy,
            "Simulated session connected"
        );
        notify_activity(
            self.state.clone(),
            self.server.clone(),
            true,
            self.activation_delay,
        );
        Ok(())
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        if !self.state.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.drop_items();
        debug!(endpoint = %self.settings.endpoint_uri, "Simulated session disconnected");
        notify_activity(self.state.clone(), self.server.clone(), false, Duration::ZERO);
        Ok(())
    }

    async fn read(&self, node: &NodeId) -> OpcUaResult<Variant> {
        self.ensure_connected()?;
        let space = self.server.space.lock();
        let sim = space
            .nodes
            .get(node)
            .ok_or_else(|| OperationError::node_not_found(node.to_string()))?;
        if sim.node_class != NodeClass::Variable {
            return Err(OperationError::read_failed(node.to_string(), "node is not a variable").into());
        }
        Ok(sim.value.clone())
    }

    async fn write(&self, node: &NodeId, value: Variant) -> OpcUaResult<()> {
        self.ensure_connected()?;
        let sinks = self.server.space.lock().set_value(node, value.clone())?;
        notify_sinks(sinks, &value);
        Ok(())
    }

    async fn browse(&self, node: &NodeId, parameter: &BrowseParameter) -> OpcUaResult<Vec<BrowseResult>> {
        self.ensure_connected()?;
        let space = self.server.space.lock();
        if !space.nodes.contains_key(node) {
            return Err(BrowseError::node_not_found(node.to_string()).into());
        }

        let empty = Vec::new();
        let forward = space.forward.get(node).unwrap_or(&empty);
        let inverse = space.inverse.get(node).unwrap_or(&empty);
        let targets: Vec<&NodeId> = match parameter.direction {
            BrowseDirection::Forward => forward.iter().collect(),
            BrowseDirection::Inverse => inverse.iter().collect(),
            BrowseDirection::Both => forward.iter().chain(inverse.iter()).collect(),
        };

        let limit = match parameter.max_references_per_node {
            0 => usize::MAX,
            n => n as usize,
        };
        Ok(targets
            .into_iter()
            .filter_map(|id| space.browse_result(id))
            .take(limit)
            .collect())
    }

    async fn call_method(
        &self,
        object: &NodeId,
        method: &NodeId,
        inputs: Vec<Variant>,
    ) -> OpcUaResult<Vec<Variant>> {
        self.ensure_connected()?;
        let handler = {
            let space = self.server.space.lock();
            let node = space
                .nodes
                .get(method)
                .ok_or_else(|| OperationError::node_not_found(method.to_string()))?;
            node.method
                .clone()
                .ok_or_else(|| OperationError::call_failed(method.to_string(), "node is not callable"))?
        };
        trace!(object = %object, method = %method, inputs = inputs.len(), "Simulated method call");
        handler
            .call(inputs)
            .map_err(|message| OperationError::call_failed(method.to_string(), message).into())
    }

    async fn create_monitored_item(
        &self,
        node: &NodeId,
        parameters: MonitoringParameters,
        sink: Arc<dyn MonitoredItemSink>,
    ) -> OpcUaResult<u32> {
        self.ensure_connected()?;
        let (item_id, initial) = {
            let mut space = self.server.space.lock();
            let initial = match space.nodes.get(node) {
                Some(n) if n.node_class == NodeClass::Variable => n.value.clone(),
                Some(_) => {
                    return Err(SubscriptionError::rejected(node.to_string(), "node is not a variable").into());
                }
                None => return Err(OperationError::node_not_found(node.to_string()).into()),
            };
            let item_id = space.next_item;
            space.next_item += 1;
            space.monitors.insert(
                item_id,
                Monitor {
                    node_id: node.clone(),
                    parameters,
                    sink: sink.clone(),
                },
            );
            (item_id, initial)
        };
        self.state.items.lock().insert(item_id);
        sink.on_value_changed(initial);
        Ok(item_id)
    }

    async fn modify_monitored_item(&self, item_id: u32, parameters: MonitoringParameters) -> OpcUaResult<()> {
        self.ensure_connected()?;
        let mut space = self.server.space.lock();
        let monitor = space
            .monitors
            .get_mut(&item_id)
            .ok_or_else(|| SubscriptionError::not_found(item_id.to_string()))?;
        monitor.parameters = parameters;
        Ok(())
    }

    async fn delete_monitored_item(&self, item_id: u32) -> OpcUaResult<()> {
        self.state.items.lock().remove(&item_id);
        self.server
            .space
            .lock()
            .monitors
            .remove(&item_id)
            .map(|_| ())
            .ok_or_else(|| SubscriptionError::not_found(item_id.to_string()).into())
    }
}

// =============================================================================
// SimulatedEngine
// =============================================================================

/// In-memory client and server engine.
pub struct SimulatedEngine {
    servers: RwLock<HashMap<String, Arc<SimServer>>>,
    local: Arc<Mutex<AddressSpace>>,
    hosted: Mutex<Option<String>>,
    activation_delay: Duration,
    connects: AtomicU64,
    releases: AtomicU64,
}

impl SimulatedEngine {
    /// Creates an engine with no hosted servers.
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
            local: Arc::new(Mutex::new(AddressSpace::new())),
            hosted: Mutex::new(None),
            activation_delay: DEFAULT_ACTIVATION_DELAY,
            connects: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        }
    }

    /// Hosts a demo server at `uri`: a `Boiler` object with `Temp1` and
    /// `Pressure` variables and a `Reset` method.
    pub fn with_demo_server(self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let server = SimServer::new(uri.clone(), Arc::new(Mutex::new(AddressSpace::demo())));
        self.servers.write().insert(uri, server);
        self
    }

    /// Hosts a server with only the standard folders at `uri`.
    pub fn with_empty_server(self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let server = SimServer::new(uri.clone(), Arc::new(Mutex::new(AddressSpace::new())));
        self.servers.write().insert(uri, server);
        self
    }

    /// Sets the delay before sessions report themselves active.
    pub fn with_activation_delay(mut self, delay: Duration) -> Self {
        self.activation_delay = delay;
        self
    }

    /// Takes a hosted server offline or back online. Connected sessions
    /// are notified inactive or active.
    pub fn set_server_online(&self, uri: &str, online: bool) -> bool {
        let Some(server) = self.servers.read().get(uri).cloned() else {
            return false;
        };
        if server.online.swap(online, Ordering::AcqRel) == online {
            return true;
        }
        info!(uri, online, "Simulated server availability changed");
        for state in server.live_connections() {
            if state.is_connected() {
                notify_activity(state, server.clone(), online, self.activation_delay);
            }
        }
        true
    }

    /// Writes a value on a hosted server as if changed by the device.
    pub fn inject_value(&self, uri: &str, node: &NodeId, value: Variant) -> OpcUaResult<()> {
        let server = self
            .servers
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| DiscoveryError::failed(uri, "no such server"))?;
        let sinks = server.space.lock().set_value(node, value.clone())?;
        notify_sinks(sinks, &value);
        Ok(())
    }

    /// Returns the monitored items on a hosted server, ordered by id.
    pub fn monitored_items(&self, uri: &str) -> Vec<(u32, NodeId, MonitoringParameters)> {
        let Some(server) = self.server(uri) else {
            return Vec::new();
        };
        let space = server.space.lock();
        let mut items: Vec<_> = space
            .monitors
            .iter()
            .map(|(id, m)| (*id, m.node_id.clone(), m.parameters))
            .collect();
        items.sort_by_key(|(id, _, _)| *id);
        items
    }

    /// Returns the number of monitored items on a hosted server.
    pub fn monitored_item_count(&self, uri: &str) -> usize {
        self.monitored_items(uri).len()
    }

    /// Returns how many connections were opened.
    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Returns how many times shared resources were released.
    pub fn release_count(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    fn server(&self, uri: &str) -> Option<Arc<SimServer>> {
        self.servers.read().get(uri).cloned()
    }

    fn hosted_server(&self) -> OpcUaResult<Arc<SimServer>> {
        let uri = self.hosted.lock().clone().ok_or(ServerError::NotStarted)?;
        self.server(&uri).ok_or_else(|| ServerError::NotStarted.into())
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut servers: Vec<String> = self.servers.read().keys().cloned().collect();
        servers.sort();
        f.debug_struct("SimulatedEngine")
            .field("servers", &servers)
            .field("hosted", &*self.hosted.lock())
            .field("activation_delay", &self.activation_delay)
            .finish()
    }
}

#[async_trait]
impl ProtocolEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn discover_endpoints(&self, uri: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        match self.server(uri) {
            Some(server) if server.is_online() => Ok(vec![EndpointDescription::unsecured(uri)]),
            Some(_) => Err(DiscoveryError::failed(uri, "server offline").into()),
            None => Err(DiscoveryError::failed(uri, "no server at this address").into()),
        }
    }

    async fn open(&self, settings: ConnectionSettings) -> OpcUaResult<Arc<dyn EngineConnection>> {
        let server = self
            .server(&settings.endpoint_uri)
            .ok_or_else(|| ConnectionError::refused(&settings.endpoint_uri, "no server at this address"))?;
        let state = Arc::new(ConnectionState {
            listeners: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            items: Mutex::new(HashSet::new()),
        });
        server.connections.lock().push(Arc::downgrade(&state));
        self.connects.fetch_add(1, Ordering::Relaxed);

        Ok(Arc::new(SimConnection {
            server,
            settings,
            state,
            activation_delay: self.activation_delay,
        }))
    }

    async fn release_shared_resources(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        debug!("Simulated engine resources released");
    }
}

#[async_trait]
impl ServerEngine for SimulatedEngine {
    async fn start(&self, endpoint: &EndpointInfo) -> OpcUaResult<()> {
        let uri = endpoint.endpoint_uri.clone();
        if let Some(existing) = self.server(&uri) {
            if !Arc::ptr_eq(&existing.space, &self.local) {
                return Err(ServerError::AlreadyRunning { uri }.into());
            }
        }
        let server = SimServer::new(uri.clone(), self.local.clone());
        self.servers.write().insert(uri.clone(), server);
        *self.hosted.lock() = Some(uri);
        Ok(())
    }

    async fn stop(&self) -> OpcUaResult<()> {
        let server = self.hosted_server()?;
        server.online.store(false, Ordering::Release);
        Ok(())
    }

    async fn terminate(&self) -> OpcUaResult<()> {
        let server = self.hosted_server()?;
        for state in server.live_connections() {
            if state.connected.swap(false, Ordering::AcqRel) {
                notify_activity(state, server.clone(), false, Duration::ZERO);
            }
        }
        Ok(())
    }

    async fn close(&self) -> OpcUaResult<()> {
        if let Some(uri) = self.hosted.lock().take() {
            self.servers.write().remove(&uri);
        }
        Ok(())
    }

    fn create_namespace(
        &self,
        name: &str,
        root_node_id: &str,
        root_browse_name: &str,
        root_display_name: &str,
    ) -> OpcUaResult<()> {
        let mut space = self.local.lock();
        if space.namespaces.contains_key(name) {
            return Err(ServerError::rejected(format!("namespace '{name}' exists")).into());
        }
        let index = space
            .namespaces
            .values()
            .map(|(i, _)| *i + 1)
            .max()
            .unwrap_or(2)
            .max(2);
        let root = match root_node_id.parse::<NodeId>() {
            Ok(parsed) => NodeId {
                namespace_index: index,
                identifier: parsed.identifier,
            },
            Err(_) => NodeId::string(index, root_node_id),
        };
        if space.nodes.contains_key(&root) {
            return Err(ServerError::rejected(format!("node '{root}' exists")).into());
        }

        space.insert(
            root.clone(),
            SimNode {
                browse_name: root_browse_name.to_string(),
                display_name: root_display_name.to_string(),
                node_class: NodeClass::Object,
                value: Variant::Null,
                method: None,
            },
        );
        space.link(&NodeId::objects_folder(), &root);
        space.namespaces.insert(name.to_string(), (index, root.clone()));
        space.created.push(root);
        Ok(())
    }

    fn create_node(&self, namespace: &str, item: NodeItem) -> OpcUaResult<NodeId> {
        let mut space = self.local.lock();
        let (index, root) = space.namespace(namespace)?;
        let id = NodeId::string(index, item.browse_name.clone());
        if space.nodes.contains_key(&id) {
            return Err(ServerError::rejected(format!("node '{id}' exists")).into());
        }
        let parent = match &item.parent {
            Some(parent) => space.lookup(namespace, parent)?,
            None => root,
        };

        space.insert(
            id.clone(),
            SimNode {
                browse_name: item.browse_name,
                display_name: item.display_name,
                node_class: item.node_class,
                value: item.value,
                method: item.method,
            },
        );
        space.link(&parent, &id);
        space.created.push(id.clone());
        Ok(id)
    }

    fn add_reference(&self, reference: &NodeReference) -> OpcUaResult<()> {
        let mut space = self.local.lock();
        let source = space.lookup(&reference.source_namespace, &reference.source)?;
        let target = space.lookup(&reference.target_namespace, &reference.target)?;
        trace!(%source, %target, reference_type = %reference.reference_type, "Reference added");
        space.link(&source, &target);
        Ok(())
    }

    fn modify_node_value(&self, namespace: &str, browse_name: &str, value: Variant) -> OpcUaResult<()> {
        let sinks = {
            let mut space = self.local.lock();
            let id = space.lookup(namespace, browse_name)?;
            space
                .set_value(&id, value.clone())
                .map_err(|e| ServerError::rejected(e.to_string()))?
        };
        notify_sinks(sinks, &value);
        Ok(())
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.local.lock().created.clone()
    }

    fn nodes_by_browse_name(&self, browse_name: &str) -> Vec<NodeId> {
        let space = self.local.lock();
        space
            .created
            .iter()
            .filter(|id| {
                space
                    .nodes
                    .get(id)
                    .is_some_and(|n| n.browse_name == browse_name)
            })
            .cloned()
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
