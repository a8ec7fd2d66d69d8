// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # edge-config
//!
//! Gateway configuration: the file schema, the loader and the conversions
//! into the descriptors the protocol manager consumes.
//!
//! ## Load Pipeline
//!
//! ```text
//! file (.yaml/.yml/.toml/.json)
//!   │  ${VAR} and ${VAR:default} expanded through the loader's EnvLookup
//!   ▼
//! GatewayConfig  ◄── EDGE_GATEWAY_ID, EDGE_GATEWAY_NAME, EDGE_LOG_LEVEL,
//!   │                EDGE_LOG_FORMAT, EDGE_REQUEST_TIMEOUT_MS (prefix configurable)
//!   ▼
//! validate()  ──► ConfigError::Validation { field: "endpoints[1].uri", .. }
//! ```
//!
//! ```no_run
//! use edge_config::load_config;
//!
//! let config = load_config("edge.yaml").unwrap();
//! for endpoint in config.auto_start_endpoints() {
//!     let info = endpoint.to_endpoint_info(&config.client);
//!     println!("{} ({})", info.endpoint_uri, config.gateway.id);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder, EnvLookup,
    DEFAULT_ENV_PREFIX,
};
pub use schema::{
    ClientSettings, ConfigValue, EndpointSettings, EngineKind, GatewayConfig, GatewayIdentity, LogFormat,
    LogLevel, LoggingConfig, NamespaceSettings, ServerSettings, VariableSettings,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
