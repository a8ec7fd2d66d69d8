// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol manager facade.
//!
//! The single entry point of the gateway. It validates outbound messages,
//! owns the send and receive dispatch queues and fans results out to the
//! registered callbacks.
//!
//! # Architecture
//!
//! ```text
//!  caller ──send()──▶ validate ──▶ [send queue] ──▶ SendHandler ──▶ CommandRouter
//!                                                                      │
//!                         ┌────────────────────────────────────────────┘
//!                         ▼
//!                   [receive queue] ──▶ ReceiveHandler ──▶ CallbackHub ──▶ receivers
//!                                                              ▲
//!                          session lifecycle / monitored items ┘ (direct)
//! ```
//!
//! Both queues are created on first use and dropped by [`ProtocolManager::close`];
//! the next `send` creates them again.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use edge_core::{
    Callbacks, CoreError, CoreResult, DispatchQueue, DispatchStatsSnapshot, EndpointInfo,
    ErrorSink, Message, MessageHandler, Outcome, StatusCode, Variant,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::engine::{NodeItem, NodeReference, ProtocolEngine, ServerEngine};
use crate::error::{ConfigurationError, OpcUaResult};
use crate::hub::CallbackHub;
use crate::provider::ProviderRegistry;
use crate::router::CommandRouter;
use crate::server::ServerHost;
use crate::session::SessionRegistry;
use crate::types::NodeId;
use crate::validation::{validate, MessageValidator};

/// Name of the outbound queue.
pub const SEND_QUEUE: &str = "send";

/// Name of the inbound queue.
pub const RECEIVE_QUEUE: &str = "receive";

// =============================================================================
// DispatchSettings
// =============================================================================

/// Capacities of the two dispatch queues; zero means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Capacity of the send queue.
    #[serde(default)]
    pub send_queue_capacity: usize,
    /// Capacity of the receive queue.
    #[serde(default)]
    pub receive_queue_capacity: usize,
}

/// Statistics of both queues; `None` for a queue not created yet.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagerStats {
    /// Send queue.
    pub send: Option<DispatchStatsSnapshot>,
    /// Receive queue.
    pub receive: Option<DispatchStatsSnapshot>,
}

// =============================================================================
// Dispatcher
// =============================================================================

type QueueSlot = RwLock<Option<Arc<DispatchQueue>>>;

struct Dispatcher {
    runtime: Handle,
    settings: DispatchSettings,
    send: QueueSlot,
    receive: QueueSlot,
    router: Arc<CommandRouter>,
    hub: Arc<CallbackHub>,
}

impl Dispatcher {
    /// Returns the queue in `slot`, creating it under the write lock if the
    /// slot is still empty once the lock is held.
    fn queue_in(&self, slot: &QueueSlot, create: impl FnOnce() -> DispatchQueue) -> Arc<DispatchQueue> {
        if let Some(queue) = slot.read().as_ref() {
            return queue.clone();
        }

        let mut guard = slot.write();
        if let Some(queue) = guard.as_ref() {
            return queue.clone();
        }
        let queue = Arc::new(create());
        *guard = Some(queue.clone());
        queue
    }

    fn send_queue(self: &Arc<Self>) -> Arc<DispatchQueue> {
        self.queue_in(&self.send, || {
            let handler = Arc::new(SendHandler {
                dispatcher: Arc::downgrade(self),
            });
            DispatchQueue::spawn(SEND_QUEUE, self.settings.send_queue_capacity, handler, &self.runtime)
        })
    }

    fn receive_queue(&self) -> Arc<DispatchQueue> {
        self.queue_in(&self.receive, || {
            let handler = Arc::new(ReceiveHandler {
                hub: self.hub.clone(),
            });
            DispatchQueue::spawn(
                RECEIVE_QUEUE,
                self.settings.receive_queue_capacity,
                handler,
                &self.runtime,
            )
        })
    }

    fn existing(slot: &QueueSlot) -> Option<Arc<DispatchQueue>> {
        slot.read().clone()
    }

    /// Drains and terminates the send queue, then the receive queue.
    async fn terminate(&self) {
        let send = self.send.write().take();
        if let Some(queue) = send {
            queue.terminate().await;
        }
        let receive = self.receive.write().take();
        if let Some(queue) = receive {
            queue.terminate().await;
        }
    }
}

/// Executes outbound commands and queues their results.
struct SendHandler {
    dispatcher: Weak<Dispatcher>,
}

#[async_trait]
impl MessageHandler for SendHandler {
    async fn handle(&self, message: Message) -> CoreResult<()> {
        let dispatcher = self
            .dispatcher
            .upgrade()
            .ok_or_else(|| CoreError::runtime("protocol manager dropped"))?;

        for delivery in dispatcher.router.route(message).await {
            let endpoint = delivery.endpoint_uri().map(str::to_string);
            let request_id = delivery.primary_request_id().map(str::to_string);
            if let Err(e) = dispatcher.receive_queue().try_put(delivery) {
                warn!(error = %e, "Result not queued for delivery");
                dispatcher.hub.record_error(
                    endpoint.as_deref(),
                    Outcome::with_diagnostic(e.status_code(), e.to_string()),
                    request_id.as_deref(),
                );
            }
        }
        Ok(())
    }
}

/// Delivers inbound messages to the callbacks.
struct ReceiveHandler {
    hub: Arc<CallbackHub>,
}

#[async_trait]
impl MessageHandler for ReceiveHandler {
    async fn handle(&self, message: Message) -> CoreResult<()> {
        self.hub.deliver(message);
        Ok(())
    }
}

// =============================================================================
// ProtocolManager
// =============================================================================

/// The gateway facade.
pub struct ProtocolManager {
    dispatcher: Arc<Dispatcher>,
    hub: Arc<CallbackHub>,
    sessions: Arc<SessionRegistry>,
    server: Arc<ServerHost>,
    engine: Arc<dyn ProtocolEngine>,
    validator: MessageValidator,
    in_use: AtomicBool,
    close_lock: tokio::sync::Mutex<()>,
}

impl ProtocolManager {
    /// Creates a builder.
    pub fn builder() -> ProtocolManagerBuilder {
        ProtocolManagerBuilder::default()
    }

    /// Replaces the registered callbacks.
    pub fn configure(&self, callbacks: Callbacks) {
        self.hub.configure(callbacks);
    }

    /// Validates a message and puts it on the send queue.
    ///
    /// Returns `PARAM_INVALID` without queuing when validation fails or
    /// panics and `ENQUEUE_ERROR` when the queue refuses the message.
    pub fn send(&self, message: Message) -> Outcome {
        let validator = self.validator;
        match std::panic::catch_unwind(AssertUnwindSafe(|| validator(&message))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(command = ?message.command, error = %e, "Message rejected");
                return Outcome::with_diagnostic(StatusCode::ParamInvalid, e.to_string());
            }
            Err(_) => {
                warn!(command = ?message.command, "Validation panicked; message rejected");
                return Outcome::with_diagnostic(StatusCode::ParamInvalid, "validation failed");
            }
        }

        self.in_use.store(true, Ordering::Release);
        match self.dispatcher.send_queue().try_put(message) {
            Ok(()) => Outcome::ok(),
            Err(e) => Outcome::with_diagnostic(e.status_code(), e.to_string()),
        }
    }

    // =========================================================================
    // Delivery entry points
    // =========================================================================

    /// Delivers a response message to the callbacks.
    pub fn on_response_message(&self, message: Message) {
        self.hub.on_response_message(message);
    }

    /// Delivers a monitored-item notification.
    pub fn on_monitored_message(&self, message: Message) {
        self.hub.on_monitored_message(message);
    }

    /// Delivers an error message.
    pub fn on_error_callback(&self, message: Message) {
        self.hub.on_error_message(message);
    }

    /// Routes a status to the status receiver.
    pub fn on_status_callback(&self, endpoint: EndpointInfo, status: StatusCode) {
        self.hub.on_status(endpoint, status);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the error sink.
    pub fn errors(&self) -> &Arc<ErrorSink> {
        self.hub.errors()
    }

    /// Returns the session registry.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Returns the capability provider registry.
    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        self.hub.providers()
    }

    /// Returns the number of messages waiting on the send queue.
    pub fn send_queue_len(&self) -> usize {
        Dispatcher::existing(&self.dispatcher.send).map_or(0, |q| q.len())
    }

    /// Returns the number of messages waiting on the receive queue.
    pub fn receive_queue_len(&self) -> usize {
        Dispatcher::existing(&self.dispatcher.receive).map_or(0, |q| q.len())
    }

    /// Returns queue statistics.
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            send: Dispatcher::existing(&self.dispatcher.send).map(|q| q.stats().snapshot()),
            receive: Dispatcher::existing(&self.dispatcher.receive).map(|q| q.stats().snapshot()),
        }
    }

    // =========================================================================
    // Server-side operations
    // =========================================================================

    fn outcome<T>(&self, context: &str, result: OpcUaResult<T>) -> Result<T, Outcome> {
        result.map_err(|e| {
            e.log(context);
            e.to_outcome()
        })
    }

    /// Creates a namespace on the running server.
    pub fn create_namespace(
        &self,
        name: &str,
        root_node_id: &str,
        root_browse_name: &str,
        root_display_name: &str,
    ) -> Outcome {
        let result =
            self.server
                .create_namespace(name, root_node_id, root_browse_name, root_display_name);
        self.outcome("create namespace", result).map_or_else(|o| o, |()| Outcome::ok())
    }

    /// Creates a node on the running server.
    pub fn create_node(&self, namespace: &str, item: NodeItem) -> Outcome {
        let result = self.server.create_node(namespace, item);
        self.outcome("create node", result).map_or_else(|o| o, |_| Outcome::ok())
    }

    /// Adds a reference between two server nodes.
    pub fn add_reference(&self, reference: &NodeReference) -> Outcome {
        let result = self.server.add_reference(reference);
        self.outcome("add reference", result).map_or_else(|o| o, |()| Outcome::ok())
    }

    /// Changes the value of a server variable node.
    pub fn modify_variable_node_value(&self, namespace: &str, browse_name: &str, value: Variant) -> Outcome {
        let result = self.server.modify_variable_node_value(namespace, browse_name, value);
        self.outcome("modify node value", result).map_or_else(|o| o, |()| Outcome::ok())
    }

    /// Lists the nodes created on the running server.
    pub fn get_nodes(&self) -> Result<Vec<NodeId>, Outcome> {
        self.outcome("get nodes", self.server.nodes())
    }

    /// Lists the server nodes with a browse name.
    pub fn get_nodes_by_browse_name(&self, browse_name: &str) -> Result<Vec<NodeId>, Outcome> {
        self.outcome("get nodes by browse name", self.server.nodes_by_browse_name(browse_name))
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Drains and stops both queues, terminates every session and releases
    /// the engine's shared resources. Calling it again is a no-op.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        let _guard = self.close_lock.lock().await;
        if !self.in_use.swap(false, Ordering::AcqRel) {
            debug!("Protocol manager already closed");
            return;
        }

        info!("Closing protocol manager");
        self.dispatcher.terminate().await;
        self.sessions.close().await;
        self.engine.release_shared_resources().await;
        info!("Protocol manager closed");
    }
}

impl std::fmt::Debug for ProtocolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolManager")
            .field("engine", &self.engine.name())
            .field("sessions", &self.sessions.len())
            .field("server", &self.server)
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`ProtocolManager`].
#[derive(Default)]
pub struct ProtocolManagerBuilder {
    engine: Option<Arc<dyn ProtocolEngine>>,
    server: Option<Arc<dyn ServerEngine>>,
    errors: Option<Arc<ErrorSink>>,
    settings: DispatchSettings,
    runtime: Option<Handle>,
    validator: Option<MessageValidator>,
}

impl ProtocolManagerBuilder {
    /// Sets the client engine.
    pub fn engine(mut self, engine: Arc<dyn ProtocolEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the server engine.
    pub fn server_engine(mut self, server: Arc<dyn ServerEngine>) -> Self {
        self.server = Some(server);
        self
    }

    /// Uses a shared error sink.
    pub fn error_sink(mut self, errors: Arc<ErrorSink>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Sets the queue capacities.
    pub fn dispatch(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the runtime workers are spawned on.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replaces the message validator run by `send`.
    pub fn validator(mut self, validator: MessageValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Builds the manager. Without an explicit runtime the current one is
    /// used.
    pub fn build(self) -> OpcUaResult<ProtocolManager> {
        let engine = self
            .engine
            .ok_or_else(|| ConfigurationError::invalid("engine", "no protocol engine set"))?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|e| ConfigurationError::invalid("runtime", e.to_string()))?,
        };

        let hub = Arc::new(CallbackHub::new(
            Arc::new(ProviderRegistry::new()),
            self.errors.unwrap_or_default(),
        ));
        let sessions = Arc::new(SessionRegistry::new(engine.clone(), hub.clone(), runtime.clone()));
        let server = Arc::new(ServerHost::new(self.server));
        let router = Arc::new(CommandRouter::new(sessions.clone(), server.clone(), hub.clone()));

        let dispatcher = Arc::new(Dispatcher {
            runtime,
            settings: self.settings,
            send: RwLock::new(None),
            receive: RwLock::new(None),
            router,
            hub: hub.clone(),
        });

        debug!(engine = engine.name(), settings = ?self.settings, "Protocol manager built");
        Ok(ProtocolManager {
            dispatcher,
            hub,
            sessions,
            server,
            engine,
            validator: self.validator.unwrap_or(validate),
            in_use: AtomicBool::new(false),
            close_lock: tokio::sync::Mutex::new(()),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
