// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client sessions and the session registry.
//!
//! # State machine
//!
//! ```text
//!                connect()            engine: active
//! Disconnected ───────────▶ Connecting ───────────────▶ Active
//!      ▲                        │                       │   ▲
//!      └──── engine failure ────┘        engine:        │   │ engine:
//!                                        inactive       ▼   │ active
//!                                                     Inactive
//!
//! any state ── STOP_CLIENT ──▶ Terminated (terminal)
//! ```
//!
//! START_CLIENT on an `Inactive` session drops the old connection, returns
//! to `Disconnected` and connects again.
//!
//! Activity events from the engine are queued onto one lifecycle worker per
//! registry. That worker registers and deregisters capability providers and
//! emits `CONNECTED`, `CLIENT_STARTED` and `DISCONNECTED`. The address-space
//! walk of an activation runs in its own task and reports back to the
//! worker, so a slow endpoint never holds up another one:
//!
//! ```text
//! engine: active ──▶ worker: Active, CONNECTED ──spawn──▶ walk task
//!                                                           │ browse ...
//! worker: register providers, CLIENT_STARTED ◀── Walked ────┘
//! ```
//!
//! A walk whose activation was superseded (inactive, stopped or activated
//! again) is aborted or discarded.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use edge_core::{
    BrowseParameter, EndpointConfig, EndpointDescription, EndpointInfo, NodeClass, Outcome,
    StartSignal, StatusCode,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::engine::{
    ConnectionSettings, EngineConnection, MonitoredItemSink, MonitoringParameters, ProtocolEngine,
    SessionActivityListener,
};
use crate::error::{ConnectionError, OpcUaResult, SessionError, SubscriptionError};
use crate::hub::CallbackHub;
use crate::provider::{ProviderEntry, ProviderKind};
use crate::types::{well_known, NodeId};

/// Maximum depth of the address-space walk done on activation.
pub const MAX_BROWSE_DEPTH: usize = 4;

// =============================================================================
// SessionState
// =============================================================================

/// State of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Connect sequence running or waiting for activation.
    Connecting,
    /// The engine reported the session active.
    Active,
    /// The engine reported the session inactive.
    Inactive,
    /// Stopped; terminal.
    Terminated,
}

impl SessionState {
    /// Returns `true` if the session is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if requests may be sent on the connection.
    #[inline]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Connecting | Self::Active)
    }

    /// Returns `true` for the terminal state.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Returns `true` if the state machine allows `self -> next`.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Active) | (Connecting, Disconnected) => true,
            (Active, Inactive) => true,
            (Inactive, Active) | (Inactive, Disconnected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Active => write!(f, "Active"),
            Self::Inactive => write!(f, "Inactive"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone)]
struct MonitoredItem {
    item_id: u32,
    node_id: NodeId,
}

/// A client session bound to one endpoint URI.
pub struct Session {
    id: Uuid,
    endpoint: EndpointInfo,
    config: EndpointConfig,
    state: RwLock<SessionState>,
    connection: RwLock<Option<Arc<dyn EngineConnection>>>,
    start_signal: Mutex<Option<StartSignal>>,
    monitored: Mutex<HashMap<String, MonitoredItem>>,
    activations: AtomicU64,
    connections_opened: AtomicU64,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new(endpoint: &EndpointInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.without_signal(),
            config: endpoint.effective_config(),
            state: RwLock::new(SessionState::Disconnected),
            connection: RwLock::new(None),
            start_signal: Mutex::new(endpoint.start_signal.clone()),
            monitored: Mutex::new(HashMap::new()),
            activations: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            created_at: Utc::now(),
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the endpoint (without start signal).
    pub fn endpoint(&self) -> &EndpointInfo {
        &self.endpoint
    }

    /// Returns the endpoint URI.
    pub fn endpoint_uri(&self) -> &str {
        &self.endpoint.endpoint_uri
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Returns `true` once terminated.
    pub fn is_terminated(&self) -> bool {
        self.state().is_terminated()
    }

    /// Returns how many times the session became active.
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    /// Returns the creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Moves to `next`, returning the previous state.
    pub fn transition(&self, next: SessionState) -> OpcUaResult<SessionState> {
        let mut state = self.state.write();
        let previous = *state;
        if !previous.can_transition_to(next) {
            return Err(SessionError::invalid_transition(self.endpoint_uri(), previous, next).into());
        }
        *state = next;
        drop(state);

        debug!(
            endpoint = %self.endpoint_uri(),
            old_state = %previous,
            new_state = %next,
            "Session state changed"
        );
        Ok(previous)
    }

    /// Returns the connection if the session accepts requests.
    pub fn connection(&self) -> OpcUaResult<Arc<dyn EngineConnection>> {
        let state = self.state();
        if state.is_terminated() {
            return Err(SessionError::Terminated {
                endpoint: self.endpoint_uri().to_string(),
            }
            .into());
        }
        if !state.is_usable() {
            return Err(SessionError::not_active(self.endpoint_uri(), state).into());
        }
        self.connection
            .read()
            .clone()
            .ok_or_else(|| ConnectionError::not_connected(self.endpoint_uri()).into())
    }

    fn set_connection(&self, connection: Option<Arc<dyn EngineConnection>>) {
        *self.connection.write() = connection;
    }

    fn take_connection(&self) -> Option<Arc<dyn EngineConnection>> {
        self.connection.write().take()
    }

    /// Replaces the pending start signal.
    pub fn set_start_signal(&self, signal: Option<StartSignal>) {
        if signal.is_some() {
            *self.start_signal.lock() = signal;
        }
    }

    /// Completes the pending start signal with the endpoint URI.
    pub fn complete_start(&self) -> bool {
        match self.start_signal.lock().take() {
            Some(signal) => signal.complete(self.endpoint_uri()),
            None => false,
        }
    }

    /// Drops the pending start signal so its receiver sees a closed channel.
    pub fn abandon_start(&self) -> bool {
        self.start_signal
            .lock()
            .take()
            .is_some_and(|signal| signal.abandon())
    }

    fn connection_epoch(&self) -> u64 {
        self.connections_opened.load(Ordering::Acquire)
    }

    // =========================================================================
    // Monitored items
    // =========================================================================

    /// Creates a monitored item for `alias`.
    pub async fn create_monitored(
        &self,
        alias: &str,
        node_id: NodeId,
        parameters: MonitoringParameters,
        sink: Arc<dyn MonitoredItemSink>,
    ) -> OpcUaResult<u32> {
        if self.monitored.lock().contains_key(alias) {
            return Err(SubscriptionError::already_exists(alias).into());
        }
        let connection = self.connection()?;
        let item_id = connection
            .create_monitored_item(&node_id, parameters, sink)
            .await?;
        self.monitored
            .lock()
            .insert(alias.to_string(), MonitoredItem { item_id, node_id });
        Ok(item_id)
    }

    /// Changes the parameters of the monitored item of `alias`.
    pub async fn modify_monitored(
        &self,
        alias: &str,
        parameters: MonitoringParameters,
    ) -> OpcUaResult<()> {
        let item_id = self
            .monitored
            .lock()
            .get(alias)
            .map(|item| item.item_id)
            .ok_or_else(|| SubscriptionError::not_found(alias))?;
        self.connection()?
            .modify_monitored_item(item_id, parameters)
            .await
    }

    /// Deletes the monitored item of `alias`.
    pub async fn delete_monitored(&self, alias: &str) -> OpcUaResult<()> {
        let item = self
            .monitored
            .lock()
            .remove(alias)
            .ok_or_else(|| SubscriptionError::not_found(alias))?;
        debug!(alias, node = %item.node_id, "Deleting monitored item");
        self.connection()?.delete_monitored_item(item.item_id).await
    }

    /// Returns the aliases with monitored items.
    pub fn monitored_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.monitored.lock().keys().cloned().collect();
        aliases.sort();
        aliases
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.endpoint_uri)
            .field("state", &self.state())
            .field("monitored", &self.monitored.lock().len())
            .finish()
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Session id.
    pub id: Uuid,
    /// Endpoint URI.
    pub endpoint: String,
    /// State.
    pub state: SessionState,
    /// Times activated.
    pub activations: u64,
    /// Aliases with monitored items.
    pub monitored: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Lifecycle events
// =============================================================================

#[derive(Debug)]
enum Activity {
    Active,
    Inactive,
    /// The address-space walk of activation `generation` finished.
    Walked {
        generation: u64,
        result: OpcUaResult<Vec<ProviderEntry>>,
    },
}

#[derive(Debug)]
struct LifecycleEvent {
    endpoint: String,
    session_id: Uuid,
    /// Connection the event belongs to; see `Session::connection_epoch`.
    epoch: u64,
    activity: Activity,
}

/// Forwards engine activity callbacks onto the lifecycle worker.
struct ActivityForwarder {
    endpoint: String,
    session_id: Uuid,
    epoch: u64,
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ActivityForwarder {
    fn forward(&self, activity: Activity) {
        let event = LifecycleEvent {
            endpoint: self.endpoint.clone(),
            session_id: self.session_id,
            epoch: self.epoch,
            activity,
        };
        if let Err(rejected) = self.events.send(event) {
            debug!(
                endpoint = %self.endpoint,
                activity = ?rejected.0.activity,
                "Lifecycle worker gone; activity ignored"
            );
        }
    }
}

impl SessionActivityListener for ActivityForwarder {
    fn on_session_active(&self) {
        self.forward(Activity::Active);
    }

    fn on_session_inactive(&self) {
        self.forward(Activity::Inactive);
    }
}

struct LifecycleWorker {
    sender: mpsc::UnboundedSender<LifecycleEvent>,
    shutdown: Arc<Notify>,
    join: Mutex<Option<JoinHandle<()>>>,
}

// =============================================================================
// SessionRegistry
// =============================================================================

struct RegistryShared {
    engine: Arc<dyn ProtocolEngine>,
    hub: Arc<CallbackHub>,
    sessions: DashMap<String, Arc<Session>>,
    /// Address-space walks in flight, by endpoint URI.
    walks: DashMap<String, AbortHandle>,
}

/// Owns the client sessions, keyed by endpoint URI.
pub struct SessionRegistry {
    shared: Arc<RegistryShared>,
    runtime: Handle,
    lifecycle: RwLock<Option<Arc<LifecycleWorker>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(engine: Arc<dyn ProtocolEngine>, hub: Arc<CallbackHub>, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                engine,
                hub,
                sessions: DashMap::new(),
                walks: DashMap::new(),
            }),
            runtime,
            lifecycle: RwLock::new(None),
        }
    }

    /// Returns the session of an endpoint.
    pub fn get(&self, endpoint_uri: &str) -> Option<Arc<Session>> {
        self.shared.sessions.get(endpoint_uri).map(|s| s.value().clone())
    }

    /// Returns the number of sessions.
    pub fn len(&self) -> usize {
        self.shared.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.shared.sessions.is_empty()
    }

    /// Returns a snapshot of every session.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<SessionSnapshot> = self
            .shared
            .sessions
            .iter()
            .map(|entry| {
                let s = entry.value();
                SessionSnapshot {
                    id: s.id(),
                    endpoint: s.endpoint_uri().to_string(),
                    state: s.state(),
                    activations: s.activations(),
                    monitored: s.monitored_aliases(),
                    created_at: s.created_at(),
                }
            })
            .collect();
        sessions.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        sessions
    }

    /// Returns the session of an endpoint, creating it in `Disconnected`.
    pub fn configure(&self, endpoint: &EndpointInfo) -> Arc<Session> {
        let session = self
            .shared
            .sessions
            .entry(endpoint.endpoint_uri.clone())
            .or_insert_with(|| {
                debug!(endpoint = %endpoint.endpoint_uri, "Session created");
                Arc::new(Session::new(endpoint))
            })
            .value()
            .clone();
        session.set_start_signal(endpoint.start_signal.clone());
        session
    }

    /// Configures the endpoint's session and runs its connect sequence.
    ///
    /// A session that is already connecting or active is left as is; if it
    /// is active the start signal is completed at once. An inactive session
    /// is reset and connected again.
    #[instrument(skip(self, endpoint), fields(endpoint = %endpoint.endpoint_uri))]
    pub async fn start_client(&self, endpoint: &EndpointInfo) -> OpcUaResult<()> {
        let session = self.configure(endpoint);
        match session.state() {
            SessionState::Active => {
                debug!("Session already active");
                session.complete_start();
                Ok(())
            }
            SessionState::Connecting => {
                debug!("Session already connecting");
                Ok(())
            }
            SessionState::Inactive => {
                debug!("Session inactive; reconnecting");
                self.shared.reset(&session).await;
                self.connect(&session).await
            }
            _ => self.connect(&session).await,
        }
    }

    /// Runs `Disconnected -> Connecting`: selects an endpoint description,
    /// opens the engine connection and connects. On failure the session
    /// returns to `Disconnected` and its start signal is dropped.
    pub async fn connect(&self, session: &Arc<Session>) -> OpcUaResult<()> {
        session.transition(SessionState::Connecting)?;
        let events = self.lifecycle_sender();

        let result = self.open_connection(session, events).await;
        if let Err(e) = &result {
            e.log("session connect");
            if let Some(connection) = session.take_connection() {
                let _ = connection.disconnect().await;
            }
            // Terminated sessions stay terminated.
            let _ = session.transition(SessionState::Disconnected);
            if session.abandon_start() {
                debug!(endpoint = %session.endpoint_uri(), "Start signal dropped after failed connect");
            }
        }
        result
    }

    async fn open_connection(
        &self,
        session: &Arc<Session>,
        events: mpsc::UnboundedSender<LifecycleEvent>,
    ) -> OpcUaResult<()> {
        let uri = session.endpoint_uri();
        let config = session.config();
        let policy = config.effective_security_policy();

        let descriptions = self.shared.engine.discover_endpoints(uri).await?;
        let selected = descriptions
            .iter()
            .find(|d| d.security_policy_uri == policy)
            .ok_or_else(|| ConnectionError::no_suitable_endpoint(uri, policy))?;
        debug!(endpoint_url = %selected.endpoint_url, mode = %selected.security_mode, "Endpoint selected");

        let connection = self
            .shared
            .engine
            .open(ConnectionSettings::new(uri, selected, config))
            .await?;
        let epoch = session.connections_opened.fetch_add(1, Ordering::AcqRel) + 1;
        connection.add_activity_listener(Arc::new(ActivityForwarder {
            endpoint: uri.to_string(),
            session_id: session.id(),
            epoch,
            events,
        }));
        session.set_connection(Some(connection.clone()));

        connection.connect().await?;
        info!(endpoint = %uri, "Client connected");
        Ok(())
    }

    /// Lists the endpoint descriptions offered at `uri`.
    pub async fn endpoints(&self, uri: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        self.shared.engine.discover_endpoints(uri).await
    }

    /// Terminates and removes the session of an endpoint.
    ///
    /// Disconnect failures are recorded as `INTERNAL_ERROR` and do not stop
    /// the termination.
    #[instrument(skip(self))]
    pub async fn terminate(&self, endpoint_uri: &str) -> OpcUaResult<()> {
        let (_, session) = self
            .shared
            .sessions
            .remove(endpoint_uri)
            .ok_or_else(|| SessionError::not_found(endpoint_uri))?;
        self.shared.release(&session).await;
        info!(endpoint = %endpoint_uri, "Client session terminated");
        Ok(())
    }

    /// Terminates every session and stops the lifecycle worker.
    pub async fn close(&self) {
        let uris: Vec<String> = self
            .shared
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for uri in uris {
            if let Some((_, session)) = self.shared.sessions.remove(&uri) {
                self.shared.release(&session).await;
            }
        }

        // Engines may hold listeners past disconnect; the channel may never close.
        let worker = self.lifecycle.write().take();
        if let Some(worker) = worker {
            worker.shutdown.notify_one();
            let join = worker.join.lock().take();
            if let Some(join) = join {
                if let Err(e) = join.await {
                    warn!(error = %e, "Lifecycle worker ended abnormally");
                }
            }
        }
    }

    fn lifecycle_sender(&self) -> mpsc::UnboundedSender<LifecycleEvent> {
        if let Some(worker) = self.lifecycle.read().as_ref() {
            return worker.sender.clone();
        }

        let mut slot = self.lifecycle.write();
        if let Some(worker) = slot.as_ref() {
            return worker.sender.clone();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        let join = self.runtime.spawn(run_lifecycle(
            Arc::downgrade(&self.shared),
            rx,
            tx.downgrade(),
            shutdown.clone(),
        ));
        *slot = Some(Arc::new(LifecycleWorker {
            sender: tx.clone(),
            shutdown,
            join: Mutex::new(Some(join)),
        }));
        tx
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("engine", &self.shared.engine.name())
            .field("sessions", &self.shared.sessions.len())
            .finish()
    }
}

// =============================================================================
// Lifecycle worker
// =============================================================================

#[instrument(skip_all, name = "session_lifecycle")]
async fn run_lifecycle(
    shared: std::sync::Weak<RegistryShared>,
    mut events: mpsc::UnboundedReceiver<LifecycleEvent>,
    sender: mpsc::WeakUnboundedSender<LifecycleEvent>,
    shutdown: Arc<Notify>,
) {
    debug!("Lifecycle worker started");
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            event = events.recv() => event,
        };
        let Some(event) = event else {
            break;
        };
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle_event(event, &sender);
    }
    debug!("Lifecycle worker stopped");
}

impl RegistryShared {
    fn handle_event(&self, event: LifecycleEvent, sender: &mpsc::WeakUnboundedSender<LifecycleEvent>) {
        let Some(session) = self.sessions.get(&event.endpoint).map(|s| s.value().clone()) else {
            debug!(endpoint = %event.endpoint, activity = ?event.activity, "No session; activity ignored");
            return;
        };
        if session.id() != event.session_id || session.connection_epoch() != event.epoch {
            debug!(endpoint = %event.endpoint, "Activity from a replaced connection ignored");
            return;
        }

        match event.activity {
            Activity::Active => self.activate(&session, sender),
            Activity::Inactive => self.deactivate(&session),
            Activity::Walked { generation, result } => self.finish_activation(&session, generation, result),
        }
    }

    fn activate(&self, session: &Arc<Session>, sender: &mpsc::WeakUnboundedSender<LifecycleEvent>) {
        if let Err(e) = session.transition(SessionState::Active) {
            e.log("session active");
            return;
        }
        let generation = session.activations.fetch_add(1, Ordering::Relaxed) + 1;
        let uri = session.endpoint_uri().to_string();
        info!(endpoint = %uri, "Session active");
        self.hub.on_status(session.endpoint().clone(), StatusCode::Connected);

        if !session.config().view_node_enabled {
            self.finish_activation(session, generation, Ok(Vec::new()));
            return;
        }
        let Some(events) = sender.upgrade() else {
            return;
        };

        let walked = session.clone();
        let epoch = session.connection_epoch();
        let walk = tokio::spawn(async move {
            let result = walk_address_space(&walked).await;
            let event = LifecycleEvent {
                endpoint: walked.endpoint_uri().to_string(),
                session_id: walked.id(),
                epoch,
                activity: Activity::Walked { generation, result },
            };
            if events.send(event).is_err() {
                debug!(endpoint = %walked.endpoint_uri(), "Lifecycle worker gone; walk result dropped");
            }
        });
        if let Some(previous) = self.walks.insert(uri, walk.abort_handle()) {
            previous.abort();
        }
    }

    /// Registers providers and emits `CLIENT_STARTED` for the current
    /// activation. Walk failures are recorded and do not block the start.
    fn finish_activation(
        &self,
        session: &Arc<Session>,
        generation: u64,
        walked: OpcUaResult<Vec<ProviderEntry>>,
    ) {
        let uri = session.endpoint_uri();
        if !session.state().is_active() || session.activations() != generation {
            debug!(endpoint = %uri, generation, "Superseded address-space walk discarded");
            return;
        }
        self.walks.remove(uri);

        let mut entries = well_known_providers(uri);
        match walked {
            Ok(found) => entries.extend(found),
            Err(e) => {
                e.log("provider registration");
                self.hub.record_error(
                    Some(uri),
                    Outcome::with_diagnostic(StatusCode::InternalError, e.to_string()),
                    None,
                );
            }
        }
        let registered = self.hub.providers().register_all(entries);
        debug!(endpoint = %uri, providers = registered, "Providers registered");

        self.hub.on_status(session.endpoint().clone(), StatusCode::ClientStarted);
        session.complete_start();
    }

    fn deactivate(&self, session: &Arc<Session>) {
        if let Err(e) = session.transition(SessionState::Inactive) {
            e.log("session inactive");
            return;
        }
        info!(endpoint = %session.endpoint_uri(), "Session inactive");
        self.abort_walk(session.endpoint_uri());
        self.hub.providers().deregister_endpoint(session.endpoint_uri());
        self.hub.on_status(session.endpoint().clone(), StatusCode::Disconnected);
    }

    fn abort_walk(&self, uri: &str) {
        if let Some((_, walk)) = self.walks.remove(uri) {
            walk.abort();
        }
    }

    /// Drops the connection of an inactive session and returns it to
    /// `Disconnected`. Monitored items die with the connection.
    async fn reset(&self, session: &Arc<Session>) {
        let uri = session.endpoint_uri();
        self.abort_walk(uri);
        if let Some(connection) = session.take_connection() {
            let dropped = session.monitored.lock().drain().count();
            if dropped > 0 {
                debug!(endpoint = %uri, dropped, "Monitored items dropped with the old connection");
            }
            if let Err(e) = connection.disconnect().await {
                e.log("session reset");
            }
        }
        let _ = session.transition(SessionState::Disconnected);
    }

    async fn release(&self, session: &Arc<Session>) {
        let uri = session.endpoint_uri().to_string();
        let _ = session.transition(SessionState::Terminated);
        self.abort_walk(&uri);

        if let Some(connection) = session.take_connection() {
            let items: Vec<MonitoredItem> =
                session.monitored.lock().drain().map(|(_, item)| item).collect();
            for item in items {
                if let Err(e) = connection.delete_monitored_item(item.item_id).await {
                    debug!(endpoint = %uri, node = %item.node_id, error = %e, "Monitored item not deleted");
                }
            }
            if let Err(e) = connection.disconnect().await {
                e.log("session disconnect");
                self.hub.record_error(
                    Some(&uri),
                    Outcome::with_diagnostic(StatusCode::InternalError, e.to_string()),
                    None,
                );
            }
        }

        self.hub.providers().deregister_endpoint(&uri);
    }
}

/// The providers every active endpoint gets.
fn well_known_providers(uri: &str) -> Vec<ProviderEntry> {
    vec![
        ProviderEntry::new(
            uri,
            well_known::DISCOVERY_PROVIDER,
            ProviderKind::Attribute,
            NodeId::numeric(0, well_known::SERVER),
        ),
        ProviderEntry::new(
            uri,
            well_known::GROUP_PROVIDER,
            ProviderKind::Attribute,
            NodeId::objects_folder(),
        ),
    ]
}

/// Breadth-first walk from the Root folder, one provider per Variable,
/// Method, Object and View node found within [`MAX_BROWSE_DEPTH`].
async fn walk_address_space(session: &Arc<Session>) -> OpcUaResult<Vec<ProviderEntry>> {
    let connection = session.connection()?;
    let uri = session.endpoint_uri();
    let parameter = BrowseParameter::default();

    let mut entries = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([(NodeId::root_folder(), 0usize)]);

    while let Some((node, depth)) = queue.pop_front() {
        if !visited.insert(node.clone()) {
            continue;
        }
        let references = match connection.browse(&node, &parameter).await {
            Ok(references) => references,
            Err(e) if depth == 0 => return Err(e),
            Err(e) => {
                debug!(node = %node, error = %e, "Browse failed; subtree skipped");
                continue;
            }
        };

        for reference in references {
            let Ok(child) = reference.node_id.parse::<NodeId>() else {
                debug!(node_id = %reference.node_id, "Unparseable node id skipped");
                continue;
            };
            let alias = reference.browse_name.clone();
            match reference.node_class {
                NodeClass::Variable => {
                    entries.push(ProviderEntry::new(uri, alias, ProviderKind::Attribute, child));
                }
                NodeClass::Method => {
                    entries.push(
                        ProviderEntry::new(uri, alias, ProviderKind::Method, child)
                            .with_parent(node.clone()),
                    );
                }
                NodeClass::Object | NodeClass::View => {
                    entries.push(ProviderEntry::new(uri, alias, ProviderKind::View, child.clone()));
                    if depth + 1 < MAX_BROWSE_DEPTH {
                        queue.push_back((child, depth + 1));
                    }
                }
                _ => {}
            }
        }
    }

    Ok(entries)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpcUaError;

    #[test]
    fn test_abandoned_start_closes_receiver() {
        let (signal, mut rx) = StartSignal::new();
        let session = Session::new(&EndpointInfo::new("X").with_start_signal(signal));
        assert!(session.abandon_start());
        assert!(!session.complete_start());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_transitions() {
        use SessionState::*;
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Active));
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Active.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Active));
        assert!(Connecting.can_transition_to(Terminated));
        assert!(Disconnected.can_transition_to(Terminated));

        assert!(!Disconnected.can_transition_to(Active));
        assert!(!Active.can_transition_to(Active));
        assert!(!Terminated.can_transition_to(Connecting));
        assert!(!Terminated.can_transition_to(Terminated));
    }

    #[test]
    fn test_session_transition_rejects_invalid() {
        let session = Session::new(&EndpointInfo::new("opc.tcp://h:4840"));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.transition(SessionState::Active).is_err());
        assert_eq!(session.transition(SessionState::Connecting).unwrap(), SessionState::Disconnected);
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn test_connection_requires_usable_state() {
        let session = Session::new(&EndpointInfo::new("X"));
        assert!(matches!(
            session.connection(),
            Err(OpcUaError::Session(SessionError::NotActive { .. }))
        ));
        session.transition(SessionState::Terminated).unwrap();
        assert!(matches!(
            session.connection(),
            Err(OpcUaError::Session(SessionError::Terminated { .. }))
        ));
    }

    #[tokio::test]
    async fn test_start_signal_completed_once() {
        let (signal, rx) = StartSignal::new();
        let session = Session::new(&EndpointInfo::new("X").with_start_signal(signal));
        assert!(session.complete_start());
        assert!(!session.complete_start());
        assert_eq!(rx.await.unwrap(), "X");
    }
}
