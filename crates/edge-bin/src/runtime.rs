// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime orchestration.
//!
//! ```text
//! load config ──▶ build ProtocolManager ──▶ START_CLIENT per auto-start endpoint
//!                                       └─▶ START_SERVER + namespaces
//!        wait for shutdown ──▶ STOP_CLIENT / STOP_SERVER ──▶ close()
//! ```
//!
//! `client.engine` picks what serves client sessions: the in-memory
//! simulation engine with one demo server per configured endpoint, or the
//! `opcua` client engine (`opcua-stack` feature). The embedded server is
//! always hosted by the simulation engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use edge_config::{ClientSettings, ConfigLoader, EngineKind, GatewayConfig};
use edge_core::{CommandType, EndpointInfo, Message, StartSignal};
use edge_opcua::{ProtocolEngine, ProtocolManager, ServerEngine, SimulatedEngine};
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::error::{BinError, BinResult};
use crate::receivers::LoggingReceiver;
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// GatewayRuntime
// =============================================================================

/// The gateway runtime: configuration plus shutdown coordination.
pub struct GatewayRuntime {
    config: Arc<GatewayConfig>,
    shutdown: ShutdownCoordinator,
    skip_connect: bool,
}

impl GatewayRuntime {
    /// Creates a new gateway runtime.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: ShutdownCoordinator::new(),
            skip_connect: false,
        }
    }

    /// Skips START_CLIENT for auto-start endpoints.
    pub fn with_skip_connect(mut self, skip: bool) -> Self {
        self.skip_connect = skip;
        self
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Runs the gateway until shutdown is signaled.
    pub async fn run(self) -> BinResult<()> {
        info!(
            gateway_id = %self.config.gateway.id,
            version = edge_core::VERSION,
            "Starting edge gateway"
        );

        let gateway = self.start().await?;
        info!("Edge gateway is ready");

        let waited = self.shutdown.wait().await;
        info!("Stopping sessions and server");
        gateway.stop().await;

        info!("Edge gateway shutdown complete");
        waited
    }

    /// Builds the protocol manager and issues the startup commands.
    pub async fn start(&self) -> BinResult<RunningGateway> {
        let engine = Arc::new(self.build_engine());
        let client_engine = self.client_engine(&engine)?;
        info!(engine = client_engine.name(), "Client engine selected");
        let manager = ProtocolManager::builder()
            .engine(client_engine)
            .server_engine(engine.clone() as Arc<dyn ServerEngine>)
            .dispatch(self.config.dispatch)
            .runtime(Handle::current())
            .build()
            .map_err(|e| BinError::from(e).with_context("failed to build protocol manager"))?;
        manager.configure(LoggingReceiver::callbacks());

        let mut gateway = RunningGateway {
            manager: Arc::new(manager),
            engine,
            clients: Vec::new(),
            server: None,
        };

        if self.config.server.enabled {
            self.start_server(&mut gateway).await;
        }
        if !self.skip_connect {
            self.start_clients(&mut gateway);
        }
        Ok(gateway)
    }

    fn client_engine(&self, simulator: &Arc<SimulatedEngine>) -> BinResult<Arc<dyn ProtocolEngine>> {
        match self.config.client.engine {
            EngineKind::Simulated => Ok(simulator.clone() as Arc<dyn ProtocolEngine>),
            EngineKind::Opcua => opcua_engine(&self.config.client),
        }
    }

    fn build_engine(&self) -> SimulatedEngine {
        if self.config.client.engine != EngineKind::Simulated {
            return SimulatedEngine::new();
        }
        let server_uri = self
            .config
            .server
            .enabled
            .then_some(self.config.server.uri.as_str());
        self.config
            .endpoints
            .iter()
            .filter(|e| Some(e.uri.as_str()) != server_uri)
            .fold(SimulatedEngine::new(), |engine, e| engine.with_demo_server(e.uri.as_str()))
    }

    fn start_clients(&self, gateway: &mut RunningGateway) {
        for endpoint in self.config.auto_start_endpoints() {
            let info = endpoint.to_endpoint_info(&self.config.client);
            let outcome = gateway
                .manager
                .send(Message::endpoint_command(CommandType::StartClient, info.clone()));
            if outcome.is_ok() {
                gateway.clients.push(info);
            } else {
                warn!(endpoint = %endpoint.uri, result = %outcome, "START_CLIENT not queued");
            }
        }
        info!(clients = gateway.clients.len(), "Client sessions requested");
    }

    async fn start_server(&self, gateway: &mut RunningGateway) {
        let settings = &self.config.server;
        let (signal, started) = StartSignal::new();
        let info = settings.to_endpoint_info();

        let outcome = gateway.manager.send(Message::endpoint_command(
            CommandType::StartServer,
            info.clone().with_start_signal(signal),
        ));
        if !outcome.is_ok() {
            warn!(endpoint = %settings.uri, result = %outcome, "START_SERVER not queued");
            return;
        }

        match tokio::time::timeout(self.config.client.request_timeout(), started).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => {
                warn!(endpoint = %settings.uri, "Server did not report started");
                return;
            }
        }
        gateway.server = Some(info);

        for namespace in &settings.namespaces {
            let outcome = gateway.manager.create_namespace(
                &namespace.name,
                &namespace.root_node_id,
                namespace.root_browse_name(),
                namespace.root_display_name(),
            );
            if !outcome.is_ok() {
                warn!(namespace = %namespace.name, result = %outcome, "Namespace not created");
                continue;
            }
            for item in namespace.node_items() {
                let browse_name = item.browse_name.clone();
                let outcome = gateway.manager.create_node(&namespace.name, item);
                if !outcome.is_ok() {
                    warn!(namespace = %namespace.name, node = %browse_name, result = %outcome, "Node not created");
                }
            }
            info!(namespace = %namespace.name, variables = namespace.variables.len(), "Namespace created");
        }
    }
}

#[cfg(feature = "opcua-stack")]
fn opcua_engine(client: &ClientSettings) -> BinResult<Arc<dyn ProtocolEngine>> {
    use edge_opcua::{UaStackEngine, UaStackSettings};

    let settings = UaStackSettings {
        application_name: client.application_name.clone(),
        application_uri: client.application_uri.clone(),
        pki_dir: client.pki_dir.clone(),
        trust_server_certs: client.trust_server_certs,
        session_retry_limit: client.session_retry_limit,
        discovery_timeout: client.request_timeout(),
    };
    Ok(Arc::new(UaStackEngine::new(settings)))
}

#[cfg(not(feature = "opcua-stack"))]
fn opcua_engine(_client: &ClientSettings) -> BinResult<Arc<dyn ProtocolEngine>> {
    Err(edge_config::ConfigError::validation(
        "client.engine",
        "engine 'opcua' needs a build with the opcua-stack feature",
    )
    .into())
}

// =============================================================================
// RunningGateway
// =============================================================================

/// A started gateway.
pub struct RunningGateway {
    manager: Arc<ProtocolManager>,
    engine: Arc<SimulatedEngine>,
    clients: Vec<EndpointInfo>,
    server: Option<EndpointInfo>,
}

impl RunningGateway {
    /// Returns the protocol manager.
    pub fn manager(&self) -> &Arc<ProtocolManager> {
        &self.manager
    }

    /// Returns the simulation engine hosting the embedded server.
    pub fn engine(&self) -> &Arc<SimulatedEngine> {
        &self.engine
    }

    /// Endpoints START_CLIENT was queued for.
    pub fn clients(&self) -> &[EndpointInfo] {
        &self.clients
    }

    /// Returns `true` once the embedded server reported started.
    pub fn server_started(&self) -> bool {
        self.server.is_some()
    }

    /// Queues STOP_CLIENT / STOP_SERVER and closes the manager, which
    /// drains both queues first.
    pub async fn stop(self) {
        for info in &self.clients {
            let outcome = self
                .manager
                .send(Message::endpoint_command(CommandType::StopClient, info.clone()));
            if !outcome.is_ok() {
                warn!(endpoint = %info, result = %outcome, "STOP_CLIENT not queued");
            }
        }
        if let Some(info) = &self.server {
            let outcome = self
                .manager
                .send(Message::endpoint_command(CommandType::StopServer, info.clone()));
            if !outcome.is_ok() {
                warn!(endpoint = %info, result = %outcome, "STOP_SERVER not queued");
            }
        }
        self.manager.close().await;
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the gateway runtime.
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<GatewayConfig>,
    loader: Option<ConfigLoader>,
    skip_connect: bool,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the loader used for the configuration file.
    pub fn loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Skips START_CLIENT for auto-start endpoints.
    pub fn skip_connect(mut self, skip: bool) -> Self {
        self.skip_connect = skip;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<GatewayRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => {
                let path = self
                    .config_path
                    .ok_or(BinError::MissingConfig)?;
                self.loader
                    .unwrap_or_default()
                    .load(&path)
                    .map_err(|e| BinError::from(e).with_context(format!("failed to load {}", path.display())))?
            }
        };

        Ok(GatewayRuntime::new(config).with_skip_connect(self.skip_connect))
    }
}

// =============================================================================
// Tests
// =============================================================================
