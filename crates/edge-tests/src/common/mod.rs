// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared pieces for the integration test binaries.

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: manager and session traffic only.
const DEFAULT_TEST_FILTER: &str = "warn,edge_opcua=debug";

static LOGGING: Once = Once::new();

/// Routes tracing output through the test writer, once per binary.
///
/// Called by every [`TestHarness`] constructor.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
