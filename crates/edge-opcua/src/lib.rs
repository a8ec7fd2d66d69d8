// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA side of the edge gateway.
//!
//! This crate turns the command messages of `edge-core` into operations on
//! a protocol engine and delivers the results back through the registered
//! callbacks.
//!
//! # Features
//!
//! - Protocol manager facade with validation and two dispatch queues
//! - Command router for value, lifecycle and discovery commands
//! - Per-endpoint client sessions with an activity-driven state machine
//! - Capability provider registry fed by address-space browsing
//! - Embedded server host over a namespace store
//! - In-memory simulation engine
//! - Client engine over the `opcua` crate (`opcua-stack` feature)
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - endpoint selection, connect/disconnect
//! ├── Session       - session lookup and lifecycle
//! ├── Operation     - read/write/method call failures, alias resolution
//! ├── Browse        - address-space browsing
//! ├── Subscription  - monitored items
//! ├── Discovery     - endpoint URI parsing and endpoint listing
//! ├── Server        - embedded server and namespace store
//! └── Configuration - invalid settings
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edge_core::{CommandType, EndpointInfo, Message};
//! use edge_opcua::{ProtocolManager, SimulatedEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let uri = "opc.tcp://127.0.0.1:4840/demo";
//! let manager = ProtocolManager::builder()
//!     .engine(Arc::new(SimulatedEngine::new().with_demo_server(uri)))
//!     .build()?;
//!
//! let outcome = manager.send(Message::endpoint_command(
//!     CommandType::StartClient,
//!     EndpointInfo::new(uri),
//! ));
//! assert!(outcome.is_ok());
//!
//! manager.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod discovery;
pub mod engine;
pub mod error;
pub mod hub;
pub mod manager;
pub mod provider;
pub mod router;
pub mod server;
pub mod session;
pub mod simulator;
pub mod types;
#[cfg(feature = "opcua-stack")]
pub mod ua_stack;
pub mod validation;

// Re-export commonly used types
pub use error::{
    BrowseError, ConfigurationError, ConnectionError, DiscoveryError, ErrorSeverity, OpcUaError,
    OpcUaResult, OperationError, ServerError, SessionError, SubscriptionError,
};

pub use engine::{
    ConnectionSettings, EngineConnection, MethodHandler, MonitoredItemSink, MonitoringParameters,
    NodeItem, NodeReference, ProtocolEngine, ServerEngine, SessionActivityListener,
};
pub use hub::CallbackHub;
pub use manager::{DispatchSettings, ManagerStats, ProtocolManager, ProtocolManagerBuilder};
pub use provider::{ProviderEntry, ProviderKind, ProviderRegistry};
pub use router::{CommandRouter, ResolvedTarget};
pub use server::ServerHost;
pub use session::{Session, SessionRegistry, SessionSnapshot, SessionState};
pub use simulator::SimulatedEngine;
pub use types::{NodeId, NodeIdentifier, SecurityMode, SecurityPolicy};

// Re-export the opcua client engine when the feature is enabled
#[cfg(feature = "opcua-stack")]
pub use ua_stack::{UaStackEngine, UaStackSettings};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
