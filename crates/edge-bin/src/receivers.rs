// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Callback receivers that write gateway traffic to the log.

use std::sync::Arc;

use edge_core::{
    BrowseResult, Callbacks, CapabilityKeys, Device, DiscoveryReceiver, EndpointInfo, Message,
    MessageReceiver, StatusCode, StatusReceiver,
};
use tracing::{debug, info, trace, warn};

/// Logs every callback it receives.
#[derive(Debug, Default)]
pub struct LoggingReceiver;

impl LoggingReceiver {
    /// Callbacks with this receiver registered for all three sets.
    pub fn callbacks() -> Callbacks {
        let receiver = Arc::new(LoggingReceiver);
        Callbacks::new()
            .with_message_receiver(receiver.clone())
            .with_status_receiver(receiver.clone())
            .with_discovery_receiver(receiver)
    }
}

impl MessageReceiver for LoggingReceiver {
    fn on_response_messages(&self, message: Message) {
        for response in &message.responses {
            debug!(
                endpoint = message.endpoint_uri().unwrap_or_default(),
                command = ?message.command,
                request_id = %response.request_id,
                value = ?response.value,
                "Response"
            );
        }
    }

    fn on_monitored_message(&self, message: Message) {
        for response in &message.responses {
            trace!(
                endpoint = message.endpoint_uri().unwrap_or_default(),
                request_id = %response.request_id,
                value = ?response.value,
                "Value changed"
            );
        }
    }

    fn on_error_message(&self, message: Message) {
        warn!(
            endpoint = message.endpoint_uri().unwrap_or_default(),
            command = ?message.command,
            result = ?message.result,
            "Command failed"
        );
    }

    fn on_browse_message(&self, endpoint: Option<EndpointInfo>, results: Vec<BrowseResult>, request_id: String) {
        debug!(
            endpoint = endpoint.as_ref().map(|e| e.endpoint_uri.as_str()).unwrap_or_default(),
            request_id = %request_id,
            references = results.len(),
            "Browse result"
        );
    }
}

impl StatusReceiver for LoggingReceiver {
    fn on_start(&self, endpoint: EndpointInfo, status: StatusCode, keys: CapabilityKeys) {
        info!(
            endpoint = %endpoint,
            status = %status,
            attributes = keys.attributes.len(),
            methods = keys.methods.len(),
            views = keys.views.len(),
            "Started"
        );
    }

    fn on_stop(&self, endpoint: EndpointInfo, status: StatusCode) {
        info!(endpoint = %endpoint, status = %status, "Stopped");
    }

    fn on_network_status(&self, endpoint: EndpointInfo, status: StatusCode) {
        info!(endpoint = %endpoint, status = %status, "Network status changed");
    }
}

impl DiscoveryReceiver for LoggingReceiver {
    fn on_found_endpoint(&self, device: Device) {
        info!(
            address = %device.address,
            port = device.port,
            server_name = %device.server_name,
            endpoints = device.endpoints.len(),
            "Endpoint found"
        );
    }

    fn on_found_device(&self, device: Device) {
        info!(
            address = %device.address,
            port = device.port,
            server_name = %device.server_name,
            "Device announced"
        );
    }
}
