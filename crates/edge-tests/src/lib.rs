// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Edge Gateway Integration Tests
//!
//! Test utilities and cross-crate integration tests.
//!
//! ## Module Structure
//!
//! - [`common`]: shared test utilities
//!   - `fixtures`: endpoints, messages and configuration files
//!   - `mocks`: `MockEngine` with failure injection and call recording,
//!     `RecordingReceiver` capturing every callback
//!   - `harness`: an isolated protocol manager plus condition waiting
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p edge-tests
//! cargo test -p edge-tests --test integration_dispatch
//! cargo test -p edge-tests --test integration_session
//! cargo test -p edge-tests --test integration_commands
//! cargo test -p edge-tests --test integration_config
//! ```
//!
//! ## Using the Harness
//!
//! ```rust,ignore
//! use edge_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = TestHarness::simulated(SimulatedEngine::new().with_demo_server(DEMO_URI));
//!     harness.start_client(DEMO_URI).await;
//!     // ... test logic
//!     harness.close().await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use edge_opcua::SimulatedEngine;
}
