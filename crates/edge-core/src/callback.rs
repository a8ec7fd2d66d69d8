// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application callback contracts.
//!
//! Results and notifications reach the application through three receiver
//! traits. They are invoked from the receive worker, from the send worker
//! (status and discovery) or directly from engine I/O tasks (monitored
//! values), so implementations must be `Send + Sync` and should return
//! quickly.

use std::fmt;
use std::sync::Arc;

use crate::endpoint::{Device, EndpointInfo};
use crate::message::{BrowseResult, Message};
use crate::status::StatusCode;

/// Receives responses, notifications and errors.
pub trait MessageReceiver: Send + Sync {
    /// Called with a general response message.
    fn on_response_messages(&self, message: Message);

    /// Called with a monitored-item notification.
    fn on_monitored_message(&self, message: Message);

    /// Called with an error message.
    fn on_error_message(&self, message: Message);

    /// Called with the browse results of one request.
    fn on_browse_message(
        &self,
        endpoint: Option<EndpointInfo>,
        results: Vec<BrowseResult>,
        request_id: String,
    );
}

/// Capability manifest passed with start notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityKeys {
    /// Registered attribute provider aliases.
    pub attributes: Vec<String>,
    /// Registered method provider aliases.
    pub methods: Vec<String>,
    /// Registered view provider aliases.
    pub views: Vec<String>,
}

/// Receives connectivity and lifecycle status.
pub trait StatusReceiver: Send + Sync {
    /// `CLIENT_STARTED` / `SERVER_STARTED`.
    fn on_start(&self, endpoint: EndpointInfo, status: StatusCode, keys: CapabilityKeys);

    /// `STOP_CLIENT` / `STOP_SERVER`.
    fn on_stop(&self, endpoint: EndpointInfo, status: StatusCode);

    /// `CONNECTED` / `DISCONNECTED`.
    fn on_network_status(&self, endpoint: EndpointInfo, status: StatusCode);
}

/// Receives discovery results.
pub trait DiscoveryReceiver: Send + Sync {
    /// Called with the device resolved from the queried endpoint URI.
    fn on_found_endpoint(&self, device: Device);

    /// Called for each other device that the queried endpoint's listing
    /// points at.
    fn on_found_device(&self, device: Device);
}

/// The callback set registered with `configure`.
#[derive(Clone, Default)]
pub struct Callbacks {
    /// Response, notification and error receiver.
    pub message: Option<Arc<dyn MessageReceiver>>,
    /// Status receiver.
    pub status: Option<Arc<dyn StatusReceiver>>,
    /// Discovery receiver.
    pub discovery: Option<Arc<dyn DiscoveryReceiver>>,
}

impl Callbacks {
    /// Creates an empty callback set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message receiver.
    pub fn with_message_receiver(mut self, receiver: Arc<dyn MessageReceiver>) -> Self {
        self.message = Some(receiver);
        self
    }

    /// Sets the status receiver.
    pub fn with_status_receiver(mut self, receiver: Arc<dyn StatusReceiver>) -> Self {
        self.status = Some(receiver);
        self
    }

    /// Sets the discovery receiver.
    pub fn with_discovery_receiver(mut self, receiver: Arc<dyn DiscoveryReceiver>) -> Self {
        self.discovery = Some(receiver);
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("message", &self.message.is_some())
            .field("status", &self.status.is_some())
            .field("discovery", &self.discovery.is_some())
            .finish()
    }
}
