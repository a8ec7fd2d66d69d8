// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Session Integration Tests
//!
//! Client session lifecycle through the protocol manager: connect,
//! activation, capability registration, loss of connectivity, stop and
//! connect failures.
//!
//! ## Test Categories
//!
//! - `test_lifecycle_*`: happy-path transitions and status order, restart
//!   after loss of connectivity, address-space walks that never finish
//! - `test_failure_*`: discovery, endpoint selection and connect failures,
//!   start signals of failed connects
//! - `test_stop_*`: STOP_CLIENT behavior

use std::time::Duration;

use edge_core::{CommandType, Message, StatusCode, SubscriptionType};
use edge_opcua::{SessionState, SimulatedEngine};

use edge_tests::common::fixtures::{EndpointFixtures, MessageFixtures, DEMO_URI, SECOND_URI, UNKNOWN_URI};
use edge_tests::common::harness::TestHarness;
use edge_tests::common::mocks::MockEngine;

fn session_state(harness: &TestHarness, uri: &str) -> Option<SessionState> {
    harness.manager().sessions().get(uri).map(|s| s.state())
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_lifecycle_connect_and_capabilities() {
    let harness = TestHarness::simulated(SimulatedEngine::new().with_demo_server(DEMO_URI));
    harness.start_client(DEMO_URI).await;

    let receiver = harness.receiver();
    assert_eq!(
        receiver.statuses(DEMO_URI),
        vec![StatusCode::Connected, StatusCode::ClientStarted]
    );
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Active));

    let keys = receiver.start_keys(DEMO_URI).unwrap();
    assert!(keys.attributes.contains(&"/discovery".to_string()));
    assert!(keys.attributes.contains(&"/group".to_string()));
    assert!(keys.attributes.contains(&"Temp1".to_string()));
    assert!(keys.attributes.contains(&"Pressure".to_string()));
    assert!(keys.methods.contains(&"Reset".to_string()));
    assert!(keys.views.contains(&"Boiler".to_string()));

    harness.close().await;
}

#[tokio::test]
async fn test_lifecycle_without_browse_registers_well_known_only() {
    let harness = TestHarness::simulated(SimulatedEngine::new().with_demo_server(DEMO_URI));

    let message = Message::endpoint_command(
        CommandType::StartClient,
        EndpointFixtures::without_browse(DEMO_URI),
    );
    assert!(harness.send(message).is_ok());
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::ClientStarted).await);

    let keys = harness.receiver().start_keys(DEMO_URI).unwrap();
    assert_eq!(keys.attributes, vec!["/discovery".to_string(), "/group".to_string()]);
    assert!(keys.methods.is_empty());
    assert!(keys.views.is_empty());

    harness.close().await;
}

#[tokio::test]
async fn test_lifecycle_server_offline_and_back() {
    let harness = TestHarness::simulated(SimulatedEngine::new().with_demo_server(DEMO_URI));
    harness.start_client(DEMO_URI).await;

    assert!(harness.simulator().set_server_online(DEMO_URI, false));
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::Disconnected).await);
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Inactive));

    let keys_while_down = harness.manager().providers().keys();
    assert!(!keys_while_down.attributes.contains(&"Temp1".to_string()));

    harness.receiver().clear();
    assert!(harness.simulator().set_server_online(DEMO_URI, true));
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::ClientStarted).await);
    assert_eq!(
        harness.receiver().statuses(DEMO_URI),
        vec![StatusCode::Connected, StatusCode::ClientStarted]
    );

    let session = harness.manager().sessions().get(DEMO_URI).unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.activations(), 2);

    harness.close().await;
}

#[tokio::test]
async fn test_lifecycle_start_signal_completes_with_uri() {
    let harness = TestHarness::simulated(SimulatedEngine::new().with_demo_server(DEMO_URI));

    let (message, started) = MessageFixtures::start_client_signaled(DEMO_URI);
    assert!(harness.send(message).is_ok());

    let uri = tokio::time::timeout(Duration::from_secs(5), started)
        .await
        .expect("start signal timed out")
        .expect("start signal dropped");
    assert_eq!(uri, DEMO_URI);

    harness.close().await;
}

#[tokio::test]
async fn test_lifecycle_second_start_does_not_reconnect() {
    let harness = TestHarness::simulated(SimulatedEngine::new().with_demo_server(DEMO_URI));
    harness.start_client(DEMO_URI).await;
    assert_eq!(harness.simulator().connect_count(), 1);

    let (message, started) = MessageFixtures::start_client_signaled(DEMO_URI);
    assert!(harness.send(message).is_ok());
    let uri = tokio::time::timeout(Duration::from_secs(5), started)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(uri, DEMO_URI);
    assert_eq!(harness.simulator().connect_count(), 1);
    assert_eq!(harness.manager().sessions().len(), 1);

    harness.close().await;
}

#[tokio::test]
async fn test_lifecycle_sessions_are_independent() {
    let harness = TestHarness::simulated(
        SimulatedEngine::new()
            .with_demo_server(DEMO_URI)
            .with_demo_server(SECOND_URI),
    );
    harness.start_client(DEMO_URI).await;
    harness.start_client(SECOND_URI).await;

    assert!(harness.simulator().set_server_online(SECOND_URI, false));
    assert!(harness.wait_for_status(SECOND_URI, StatusCode::Disconnected).await);

    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Active));
    assert!(!harness.receiver().has_status(DEMO_URI, StatusCode::Disconnected));

    harness.close().await;
}

#[tokio::test]
async fn test_lifecycle_requests_allowed_while_connecting() {
    let engine = MockEngine::new();
    engine.manual_activation(true);
    engine.set_value("ns=2;s=Level".parse().unwrap(), 7i32);
    let harness = TestHarness::mocked(engine);

    assert!(harness.send(MessageFixtures::start_client(DEMO_URI)).is_ok());
    let mock = harness.mock().clone();
    assert!(harness.wait_until(|| mock.call_count("connect:") == 1).await);
    assert!(harness.wait_idle().await);
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Connecting));

    assert!(harness.send(MessageFixtures::read(DEMO_URI, "ns=2;s=Level", "r-1")).is_ok());
    assert!(harness.wait_until(|| harness.receiver().responses().len() == 1).await);

    assert!(mock.activate(DEMO_URI));
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::ClientStarted).await);
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Active));

    harness.close().await;
}

#[tokio::test]
async fn test_lifecycle_stalled_walk_does_not_block_other_sessions() {
    let engine = MockEngine::new();
    engine.stall_browse(DEMO_URI);
    let harness = TestHarness::mocked(engine);

    assert!(harness.send(MessageFixtures::start_client(DEMO_URI)).is_ok());
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::Connected).await);
    let mock = harness.mock().clone();
    assert!(harness.wait_until(|| mock.call_count("browse:") >= 1).await);

    harness.start_client(SECOND_URI).await;
    assert_eq!(session_state(&harness, SECOND_URI), Some(SessionState::Active));
    assert!(!harness.receiver().has_status(DEMO_URI, StatusCode::ClientStarted));

    assert!(mock.deactivate(DEMO_URI));
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::Disconnected).await);
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Inactive));
    assert!(!harness.receiver().has_status(DEMO_URI, StatusCode::ClientStarted));

    harness.close().await;
}

#[tokio::test]
async fn test_lifecycle_restart_inactive_session() {
    let harness = TestHarness::mocked(MockEngine::new());
    harness.start_client(DEMO_URI).await;

    let mock = harness.mock().clone();
    assert!(mock.deactivate(DEMO_URI));
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::Disconnected).await);
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Inactive));

    harness.receiver().clear();
    harness.start_client(DEMO_URI).await;
    assert_eq!(
        harness.receiver().statuses(DEMO_URI),
        vec![StatusCode::Connected, StatusCode::ClientStarted]
    );
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Active));
    assert_eq!(mock.call_count("open:"), 2);
    assert_eq!(mock.call_count("disconnect:"), 1);
    assert!(harness.manager().errors().is_empty());

    harness.close().await;
}

// =============================================================================
// Failure Tests
// =============================================================================

#[tokio::test]
async fn test_failure_connect_returns_to_disconnected() {
    let engine = MockEngine::new();
    engine.fail_connect(true);
    let harness = TestHarness::mocked(engine);

    assert!(harness.send(MessageFixtures::start_client(DEMO_URI)).is_ok());
    assert!(harness.wait_for_errors(1).await);

    let record = &harness.manager().errors().records_for(DEMO_URI)[0];
    assert_eq!(record.outcome.status, StatusCode::InternalError);
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Disconnected));
    assert_eq!(harness.mock().call_count("disconnect:"), 1);

    assert!(harness.wait_until(|| harness.receiver().errors().len() == 1).await);
    let error = &harness.receiver().errors()[0];
    assert_eq!(error.command, Some(CommandType::StartClient));
    assert!(harness.receiver().statuses(DEMO_URI).is_empty());

    harness.close().await;
}

#[tokio::test]
async fn test_failure_connect_can_be_retried() {
    let engine = MockEngine::new();
    engine.fail_connect(true);
    let harness = TestHarness::mocked(engine);

    assert!(harness.send(MessageFixtures::start_client(DEMO_URI)).is_ok());
    assert!(harness.wait_for_errors(1).await);

    harness.mock().fail_connect(false);
    harness.start_client(DEMO_URI).await;
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Active));

    harness.close().await;
}

#[tokio::test]
async fn test_failure_connect_drops_start_signal() {
    let engine = MockEngine::new();
    engine.fail_connect(true);
    let harness = TestHarness::mocked(engine);

    let (message, started) = MessageFixtures::start_client_signaled(DEMO_URI);
    assert!(harness.send(message).is_ok());

    let result = tokio::time::timeout(Duration::from_secs(5), started)
        .await
        .expect("start signal left pending");
    assert!(result.is_err());
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Disconnected));

    harness.close().await;
}

#[tokio::test]
async fn test_failure_unknown_server() {
    let harness = TestHarness::simulated(SimulatedEngine::new());

    assert!(harness.send(MessageFixtures::start_client(UNKNOWN_URI)).is_ok());
    assert!(harness.wait_for_errors(1).await);

    let records = harness.manager().errors().records_for(UNKNOWN_URI);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome.status, StatusCode::InternalError);
    assert_eq!(session_state(&harness, UNKNOWN_URI), Some(SessionState::Disconnected));

    harness.close().await;
}

#[tokio::test]
async fn test_failure_no_endpoint_for_policy() {
    let harness = TestHarness::mocked(MockEngine::new());

    let message = Message::endpoint_command(CommandType::StartClient, EndpointFixtures::secured(DEMO_URI));
    assert!(harness.send(message).is_ok());
    assert!(harness.wait_for_errors(1).await);

    assert_eq!(harness.mock().call_count("open:"), 0);
    assert_eq!(session_state(&harness, DEMO_URI), Some(SessionState::Disconnected));

    harness.close().await;
}

// =============================================================================
// Stop Tests
// =============================================================================

#[tokio::test]
async fn test_stop_removes_session() {
    let harness = TestHarness::simulated(SimulatedEngine::new().with_demo_server(DEMO_URI));
    harness.start_client(DEMO_URI).await;

    assert!(harness.send(MessageFixtures::stop_client(DEMO_URI)).is_ok());
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::StopClient).await);
    assert!(harness.manager().sessions().get(DEMO_URI).is_none());
    assert_eq!(harness.manager().providers().count_for(DEMO_URI), 0);

    harness.close().await;
}

#[tokio::test]
async fn test_stop_immediately_after_start() {
    let engine = MockEngine::new();
    engine.manual_activation(true);
    let harness = TestHarness::mocked(engine);

    assert!(harness.send(MessageFixtures::start_client(DEMO_URI)).is_ok());
    assert!(harness.send(MessageFixtures::stop_client(DEMO_URI)).is_ok());
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::StopClient).await);
    assert!(harness.manager().sessions().is_empty());

    // Activity after termination has no session to act on.
    harness.mock().activate(DEMO_URI);
    assert!(harness.wait_idle().await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!harness.receiver().has_status(DEMO_URI, StatusCode::Connected));
    assert!(!harness.receiver().has_status(DEMO_URI, StatusCode::ClientStarted));

    harness.close().await;
}

#[tokio::test]
async fn test_stop_unknown_endpoint_records_error() {
    let harness = TestHarness::mocked(MockEngine::new());

    assert!(harness.send(MessageFixtures::stop_client(UNKNOWN_URI)).is_ok());
    assert!(harness.wait_for_errors(1).await);

    let records = harness.manager().errors().records_for(UNKNOWN_URI);
    assert_eq!(records[0].outcome.status, StatusCode::InternalError);
    assert!(harness.receiver().statuses(UNKNOWN_URI).is_empty());

    harness.close().await;
}

#[tokio::test]
async fn test_stop_disconnect_failure_still_terminates() {
    let engine = MockEngine::new();
    engine.fail_disconnect(true);
    let harness = TestHarness::mocked(engine);
    harness.start_client(DEMO_URI).await;

    assert!(harness.send(MessageFixtures::stop_client(DEMO_URI)).is_ok());
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::StopClient).await);

    assert!(harness.manager().sessions().is_empty());
    let records = harness.manager().errors().records_for(DEMO_URI);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome.status, StatusCode::InternalError);

    harness.close().await;
}

#[tokio::test]
async fn test_stop_deletes_monitored_items() {
    let harness = TestHarness::mocked(MockEngine::new());
    harness.start_client(DEMO_URI).await;

    let subscribe = MessageFixtures::subscribe(DEMO_URI, "ns=2;s=Level", SubscriptionType::Create, "s-1");
    assert!(harness.send(subscribe).is_ok());
    let mock = harness.mock().clone();
    assert!(harness.wait_until(|| mock.monitored_item_count(DEMO_URI) == 1).await);

    assert!(harness.send(MessageFixtures::stop_client(DEMO_URI)).is_ok());
    assert!(harness.wait_for_status(DEMO_URI, StatusCode::StopClient).await);
    assert_eq!(mock.call_count("unmonitor:"), 1);
    assert_eq!(mock.monitored_item_count(DEMO_URI), 0);

    harness.close().await;
}
