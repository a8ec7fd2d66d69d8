// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # edge-core
//!
//! Protocol-agnostic building blocks of the edge gateway.
//!
//! - **Status**: the closed status-code enumeration and [`Outcome`]
//! - **Message**: commands, requests, responses and browse results
//! - **Value**: the tagged [`Variant`] payload
//! - **Endpoint**: endpoint info, client configuration and devices
//! - **Callback**: application receiver traits
//! - **ErrorSink**: buffer of asynchronous failures
//! - **Dispatch**: FIFO queue drained by one worker
//!
//! ## Example
//!
//! ```rust
//! use edge_core::{CommandType, EndpointInfo, Message, Request};
//!
//! let msg = Message::single(
//!     CommandType::Read,
//!     EndpointInfo::new("opc.tcp://10.0.0.5:12686/edge-server"),
//!     Request::new("Temp1"),
//! );
//! assert_eq!(msg.outbound_requests().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Model
// =============================================================================

pub mod endpoint;
pub mod error;
pub mod message;
pub mod status;
pub mod value;

// =============================================================================
// Runtime
// =============================================================================

pub mod callback;
pub mod dispatch;
pub mod error_sink;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use callback::{CapabilityKeys, Callbacks, DiscoveryReceiver, MessageReceiver, StatusReceiver};
pub use dispatch::{DispatchQueue, DispatchStats, DispatchStatsSnapshot, MessageHandler};
pub use endpoint::{
    Device, EndpointConfig, EndpointConfigBuilder, EndpointDescription, EndpointInfo,
    StartSignal, SECURITY_POLICY_NONE_URI,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use error_sink::{ErrorRecord, ErrorSink};
pub use message::{
    BrowseDirection, BrowseParameter, BrowseResult, CommandType, Message, MessageKind, NodeClass,
    NodeInfo, Request, Response, SubRequest, SubscriptionType,
};
pub use status::{Outcome, StatusCategory, StatusCode};
pub use value::Variant;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
