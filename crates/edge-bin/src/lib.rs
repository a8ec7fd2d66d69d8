// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # edge-bin
//!
//! The `edge-gateway` executable.
//!
//! ## Startup Sequence
//!
//! ```text
//! config file ──► RuntimeBuilder ──► GatewayRuntime::start
//!                                        │
//!                 ┌──────────────────────┼───────────────────────┐
//!                 ▼                      ▼                       ▼
//!          LoggingReceiver        START_SERVER +           START_CLIENT per
//!          (callback hub)         namespaces/nodes         auto-start endpoint
//!                                        │
//!                          ShutdownCoordinator::wait
//!                                        │
//!                                 RunningGateway::stop
//! ```
//!
//! ## Usage
//!
//! ```bash
//! edge-gateway                                  # run with ./edge.yaml
//! edge-gateway -c /etc/edge/edge.yaml --log-format json run --skip-connect
//! edge-gateway validate --format json
//! edge-gateway version
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod receivers;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use receivers::LoggingReceiver;
pub use runtime::{GatewayRuntime, RunningGateway, RuntimeBuilder};
pub use shutdown::ShutdownCoordinator;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
