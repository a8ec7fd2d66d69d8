// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fan-out of results and status to the registered application callbacks.
//!
//! The hub holds the single active callback set. The receive worker, the
//! send worker, the session lifecycle worker and engine I/O tasks all
//! deliver through it. Callbacks are cloned out of the lock before being
//! invoked so a slow receiver never blocks `configure`.

use std::sync::Arc;

use edge_core::{
    Callbacks, Device, EndpointInfo, ErrorSink, Message, MessageKind, Outcome, StatusCategory,
    StatusCode,
};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::provider::ProviderRegistry;

/// Delivery point for application callbacks.
#[derive(Debug)]
pub struct CallbackHub {
    callbacks: RwLock<Callbacks>,
    providers: Arc<ProviderRegistry>,
    errors: Arc<ErrorSink>,
}

impl CallbackHub {
    /// Creates a hub with no callbacks registered.
    pub fn new(providers: Arc<ProviderRegistry>, errors: Arc<ErrorSink>) -> Self {
        Self {
            callbacks: RwLock::new(Callbacks::default()),
            providers,
            errors,
        }
    }

    /// Replaces the registered callback set.
    pub fn configure(&self, callbacks: Callbacks) {
        debug!(?callbacks, "Callbacks configured");
        *self.callbacks.write() = callbacks;
    }

    /// Returns the provider registry.
    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Returns the error sink.
    pub fn errors(&self) -> &Arc<ErrorSink> {
        &self.errors
    }

    /// Records a failure in the error sink.
    pub fn record_error(&self, endpoint: Option<&str>, outcome: Outcome, request_id: Option<&str>) {
        self.errors.add(endpoint, outcome, request_id);
    }

    // =========================================================================
    // Message delivery
    // =========================================================================

    /// Delivers a response message. Browse responses go to the browse
    /// callback, one call per request.
    pub fn on_response_message(&self, message: Message) {
        let Some(receiver) = self.callbacks.read().message.clone() else {
            debug!("No message receiver registered; response dropped");
            return;
        };

        if message.kind == Some(MessageKind::BrowseResponse) {
            let request_id = message
                .primary_request_id()
                .unwrap_or_default()
                .to_string();
            debug!(
                request_id = %request_id,
                results = message.browse_results.len(),
                "Delivering browse response"
            );
            receiver.on_browse_message(message.endpoint_info, message.browse_results, request_id);
            return;
        }

        for response in &message.responses {
            debug!(
                request_id = %response.request_id,
                status = %response.result,
                value = ?response.value,
                "Delivering response"
            );
        }
        receiver.on_response_messages(message);
    }

    /// Delivers a monitored-item notification.
    pub fn on_monitored_message(&self, message: Message) {
        for response in &message.responses {
            trace!(
                endpoint = message.endpoint_uri().unwrap_or("-"),
                request_id = %response.request_id,
                value = ?response.value,
                "Monitored value changed"
            );
        }
        if let Some(receiver) = self.callbacks.read().message.clone() {
            receiver.on_monitored_message(message);
        }
    }

    /// Delivers an error message.
    pub fn on_error_message(&self, message: Message) {
        for response in &message.responses {
            debug!(
                request_id = %response.request_id,
                status = %response.result,
                "Delivering error"
            );
        }
        if let Some(receiver) = self.callbacks.read().message.clone() {
            receiver.on_error_message(message);
        }
    }

    /// Routes an inbound message by kind.
    pub fn deliver(&self, message: Message) {
        match message.kind {
            Some(MessageKind::Report) => self.on_monitored_message(message),
            Some(MessageKind::Error) => self.on_error_message(message),
            _ => self.on_response_message(message),
        }
    }

    // =========================================================================
    // Status and discovery
    // =========================================================================

    /// Routes a connectivity or lifecycle status to the status receiver.
    ///
    /// Start statuses carry the current capability manifest. Statuses
    /// outside the start/stop/network categories are logged and dropped.
    pub fn on_status(&self, endpoint: EndpointInfo, status: StatusCode) {
        let receiver = self.callbacks.read().status.clone();

        match status.category() {
            StatusCategory::Start => {
                info!(endpoint = %endpoint, %status, "Started");
                if let Some(receiver) = receiver {
                    receiver.on_start(endpoint, status, self.providers.keys());
                }
            }
            StatusCategory::Stop => {
                info!(endpoint = %endpoint, %status, "Stopped");
                if let Some(receiver) = receiver {
                    receiver.on_stop(endpoint, status);
                }
            }
            StatusCategory::Network => {
                info!(endpoint = %endpoint, %status, "Network status changed");
                if let Some(receiver) = receiver {
                    receiver.on_network_status(endpoint, status);
                }
            }
            StatusCategory::Other => {
                info!(endpoint = %endpoint, %status, "Status is not routable; dropped");
            }
        }
    }

    /// Delivers a device resolved from an endpoint URI.
    pub fn on_found_endpoint(&self, device: Device) {
        match self.callbacks.read().discovery.clone() {
            Some(receiver) => receiver.on_found_endpoint(device),
            None => warn!(address = %device.address, "No discovery receiver registered; device dropped"),
        }
    }

    /// Delivers a device named by another device's endpoint listing.
    pub fn on_found_device(&self, device: Device) {
        match self.callbacks.read().discovery.clone() {
            Some(receiver) => receiver.on_found_device(device),
            None => debug!(address = %device.address, "No discovery receiver registered; device dropped"),
        }
    }
}
