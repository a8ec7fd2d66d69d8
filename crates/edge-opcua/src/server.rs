// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Embedded server host.
//!
//! Wraps the optional [`ServerEngine`] with the running/stopped state that
//! gates namespace-store operations. Every store operation issued while no
//! server is running fails with `NOT_START_SERVER`.

use std::sync::Arc;

use edge_core::{EndpointInfo, NodeClass, Variant};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::engine::{NodeItem, NodeReference, ServerEngine};
use crate::error::{OpcUaResult, ServerError};
use crate::types::NodeId;

/// Hosts the embedded server, if one is configured.
pub struct ServerHost {
    engine: Option<Arc<dyn ServerEngine>>,
    running: RwLock<Option<EndpointInfo>>,
}

impl ServerHost {
    /// Creates a host; `None` means no server can be started.
    pub fn new(engine: Option<Arc<dyn ServerEngine>>) -> Self {
        Self {
            engine,
            running: RwLock::new(None),
        }
    }

    /// Returns `true` while the server is running.
    pub fn is_running(&self) -> bool {
        self.running.read().is_some()
    }

    /// Returns the endpoint the server runs at.
    pub fn endpoint(&self) -> Option<EndpointInfo> {
        self.running.read().clone()
    }

    fn engine(&self) -> OpcUaResult<&Arc<dyn ServerEngine>> {
        self.engine.as_ref().ok_or_else(|| ServerError::NotStarted.into())
    }

    fn running_engine(&self) -> OpcUaResult<&Arc<dyn ServerEngine>> {
        if !self.is_running() {
            return Err(ServerError::NotStarted.into());
        }
        self.engine()
    }

    /// Starts the server at the endpoint.
    pub async fn start(&self, endpoint: &EndpointInfo) -> OpcUaResult<()> {
        if let Some(current) = self.endpoint() {
            return Err(ServerError::AlreadyRunning {
                uri: current.endpoint_uri,
            }
            .into());
        }
        self.engine()?.start(endpoint).await?;
        *self.running.write() = Some(endpoint.without_signal());
        info!(endpoint = %endpoint, "Server started");
        Ok(())
    }

    /// Runs the stop, terminate and close sequence.
    ///
    /// Every step runs even if an earlier one failed; the first failure is
    /// returned.
    pub async fn stop(&self) -> OpcUaResult<()> {
        let engine = self.engine()?;
        let Some(endpoint) = self.running.write().take() else {
            return Err(ServerError::NotStarted.into());
        };

        let mut first_error = None;
        for (step, result) in [
            ("stop", engine.stop().await),
            ("terminate", engine.terminate().await),
            ("close", engine.close().await),
        ] {
            if let Err(e) = result {
                warn!(endpoint = %endpoint, step, error = %e, "Server shutdown step failed");
                first_error.get_or_insert(e);
            }
        }

        info!(endpoint = %endpoint, "Server stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Namespace store
    // =========================================================================

    /// Creates a namespace with a root folder.
    pub fn create_namespace(
        &self,
        name: &str,
        root_node_id: &str,
        root_browse_name: &str,
        root_display_name: &str,
    ) -> OpcUaResult<()> {
        self.running_engine()?
            .create_namespace(name, root_node_id, root_browse_name, root_display_name)?;
        debug!(namespace = name, "Namespace created");
        Ok(())
    }

    /// Creates a node. Method nodes need a handler.
    pub fn create_node(&self, namespace: &str, item: NodeItem) -> OpcUaResult<NodeId> {
        let engine = self.running_engine()?;
        if item.node_class == NodeClass::Method && item.method.is_none() {
            return Err(ServerError::MissingMethodHandler {
                node: item.browse_name,
            }
            .into());
        }
        let node_id = engine.create_node(namespace, item)?;
        debug!(namespace, node = %node_id, "Node created");
        Ok(node_id)
    }

    /// Adds a reference between two nodes.
    pub fn add_reference(&self, reference: &NodeReference) -> OpcUaResult<()> {
        self.running_engine()?.add_reference(reference)
    }

    /// Changes the value of a variable node.
    pub fn modify_variable_node_value(
        &self,
        namespace: &str,
        browse_name: &str,
        value: Variant,
    ) -> OpcUaResult<()> {
        self.running_engine()?
            .modify_node_value(namespace, browse_name, value)
    }

    /// Lists every node created through the store.
    pub fn nodes(&self) -> OpcUaResult<Vec<NodeId>> {
        Ok(self.running_engine()?.nodes())
    }

    /// Lists the nodes with a browse name.
    pub fn nodes_by_browse_name(&self, browse_name: &str) -> OpcUaResult<Vec<NodeId>> {
        Ok(self.running_engine()?.nodes_by_browse_name(browse_name))
    }
}

impl std::fmt::Debug for ServerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHost")
            .field("configured", &self.engine.is_some())
            .field("running", &self.endpoint().map(|e| e.endpoint_uri))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpcUaError;

    #[tokio::test]
    async fn test_no_engine_means_not_started() {
        let host = ServerHost::new(None);
        let err = host.start(&EndpointInfo::new("opc.tcp://0.0.0.0:4840")).await.unwrap_err();
        assert!(matches!(err, OpcUaError::Server(ServerError::NotStarted)));
        assert!(matches!(
            host.create_namespace("ns", "ns=2;s=root", "root", "Root"),
            Err(OpcUaError::Server(ServerError::NotStarted))
        ));
        assert!(host.stop().await.is_err());
    }
}
