// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! An isolated protocol manager wired to a [`RecordingReceiver`], backed by
//! either the simulation engine or a [`MockEngine`].
//!
//! Dispatch is asynchronous, so tests poll for the effect they expect with
//! [`TestHarness::wait_until`] instead of sleeping for a fixed time.

use std::sync::Arc;
use std::time::Duration;

use edge_core::{Message, Outcome, StatusCode};
use edge_opcua::{DispatchSettings, ProtocolEngine, ProtocolManager, ServerEngine, SimulatedEngine};
use tokio::runtime::Handle;

use super::fixtures::MessageFixtures;
use super::init_test_logging;
use super::mocks::{MockEngine, RecordingReceiver};

/// Default time a wait may take.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

// =============================================================================
// Test Harness
// =============================================================================

/// A protocol manager plus everything a test needs to observe it.
pub struct TestHarness {
    manager: Arc<ProtocolManager>,
    receiver: Arc<RecordingReceiver>,
    simulator: Option<Arc<SimulatedEngine>>,
    mock: Option<MockEngine>,
    timeout: Duration,
}

impl TestHarness {
    /// Builds a harness over a simulation engine, which also serves as the
    /// embedded server.
    pub fn simulated(engine: SimulatedEngine) -> Self {
        Self::simulated_with(engine, DispatchSettings::default())
    }

    /// Builds a harness over a simulation engine with queue capacities.
    pub fn simulated_with(engine: SimulatedEngine, dispatch: DispatchSettings) -> Self {
        init_test_logging();
        let engine = Arc::new(engine);
        let manager = ProtocolManager::builder()
            .engine(engine.clone() as Arc<dyn ProtocolEngine>)
            .server_engine(engine.clone() as Arc<dyn ServerEngine>)
            .dispatch(dispatch)
            .runtime(Handle::current())
            .build()
            .expect("protocol manager should build");
        Self::assemble(manager, Some(engine), None)
    }

    /// Builds a harness over a mock engine with no embedded server.
    pub fn mocked(engine: MockEngine) -> Self {
        init_test_logging();
        let manager = ProtocolManager::builder()
            .engine(Arc::new(engine.clone()))
            .runtime(Handle::current())
            .build()
            .expect("protocol manager should build");
        Self::assemble(manager, None, Some(engine))
    }

    fn assemble(
        manager: ProtocolManager,
        simulator: Option<Arc<SimulatedEngine>>,
        mock: Option<MockEngine>,
    ) -> Self {
        let receiver = RecordingReceiver::new();
        manager.configure(receiver.callbacks());
        Self {
            manager: Arc::new(manager),
            receiver,
            simulator,
            mock,
            timeout: DEFAULT_WAIT,
        }
    }

    /// Sets how long waits may take.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the protocol manager.
    pub fn manager(&self) -> &Arc<ProtocolManager> {
        &self.manager
    }

    /// Returns the recording receiver.
    pub fn receiver(&self) -> &Arc<RecordingReceiver> {
        &self.receiver
    }

    /// Returns the simulation engine.
    ///
    /// # Panics
    ///
    /// Panics if the harness was built over a mock engine.
    pub fn simulator(&self) -> &SimulatedEngine {
        self.simulator
            .as_deref()
            .expect("harness was not built with a simulation engine")
    }

    /// Returns the mock engine.
    ///
    /// # Panics
    ///
    /// Panics if the harness was built over a simulation engine.
    pub fn mock(&self) -> &MockEngine {
        self.mock
            .as_ref()
            .expect("harness was not built with a mock engine")
    }

    /// Sends a message and returns the synchronous outcome.
    pub fn send(&self, message: Message) -> Outcome {
        self.manager.send(message)
    }

    /// Polls `condition` until it holds or the timeout elapses.
    pub async fn wait_until(&self, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if condition() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Waits until `status` was reported for `uri`.
    pub async fn wait_for_status(&self, uri: &str, status: StatusCode) -> bool {
        let receiver = self.receiver.clone();
        self.wait_until(|| receiver.has_status(uri, status)).await
    }

    /// Waits until at least `count` error records exist.
    pub async fn wait_for_errors(&self, count: usize) -> bool {
        let errors = self.manager.errors().clone();
        self.wait_until(|| errors.len() >= count).await
    }

    /// Waits until both queues are empty and every queued message was
    /// handled.
    pub async fn wait_idle(&self) -> bool {
        let manager = self.manager.clone();
        self.wait_until(|| {
            let stats = manager.stats();
            let drained = |s: Option<edge_core::DispatchStatsSnapshot>| {
                s.is_none_or(|s| s.enqueued == s.processed + s.failed)
            };
            drained(stats.send) && drained(stats.receive)
        })
        .await
    }

    /// Sends START_CLIENT and waits for `CLIENT_STARTED`.
    ///
    /// # Panics
    ///
    /// Panics if the message is rejected or the session does not start in
    /// time.
    pub async fn start_client(&self, uri: &str) {
        let outcome = self.send(MessageFixtures::start_client(uri));
        assert!(outcome.is_ok(), "START_CLIENT rejected: {outcome}");
        assert!(
            self.wait_for_status(uri, StatusCode::ClientStarted).await,
            "no CLIENT_STARTED for {uri}"
        );
    }

    /// Closes the manager.
    pub async fn close(&self) {
        self.manager.close().await;
    }
}
