// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Dispatch Integration Tests
//!
//! Validation at the `send` boundary, queue ordering, bounded queues and
//! the close/reuse cycle of the protocol manager.
//!
//! ## Test Categories
//!
//! - `test_validation_*`: messages rejected before queuing, including a
//!   validator that panics
//! - `test_order_*`: FIFO execution and delivery
//! - `test_capacity_*`: bounded queue behavior
//! - `test_close_*`: drain, idempotence and reuse

use edge_core::{
    CommandType, EndpointInfo, Message, NodeInfo, Request, StatusCode, SubRequest,
    SubscriptionType, Variant,
};
use std::sync::Arc;

use edge_core::ValidationError;
use edge_opcua::{DispatchSettings, NodeId, ProtocolManager, SimulatedEngine};

use edge_tests::common::fixtures::{MessageFixtures, DEMO_URI};
use edge_tests::common::harness::TestHarness;
use edge_tests::common::mocks::MockEngine;

const SETPOINT: &str = "ns=2;s=Setpoint";

// =============================================================================
// Validation Tests
// =============================================================================

#[tokio::test]
async fn test_validation_rejects_empty_message() {
    let harness = TestHarness::mocked(MockEngine::new());

    let outcome = harness.send(Message::default());
    assert_eq!(outcome.status, StatusCode::ParamInvalid);
    assert!(outcome.diagnostic.is_some());
    assert_eq!(harness.manager().send_queue_len(), 0);
    assert!(harness.manager().stats().send.is_none());

    harness.close().await;
}

#[tokio::test]
async fn test_validation_rejects_batch_method_and_subscribe() {
    let harness = TestHarness::mocked(MockEngine::new());

    let method = Message::batch(
        CommandType::InvokeMethod,
        EndpointInfo::new(DEMO_URI),
        vec![Request::new("Reset").with_value(Variant::Null)],
    );
    assert_eq!(harness.send(method).status, StatusCode::ParamInvalid);

    let subscribe = Message::batch(
        CommandType::Subscribe,
        EndpointInfo::new(DEMO_URI),
        vec![Request::new("Temp1").with_sub_request(SubRequest::new(SubscriptionType::Create))],
    );
    assert_eq!(harness.send(subscribe).status, StatusCode::ParamInvalid);

    assert!(harness.manager().stats().send.is_none());
    harness.close().await;
}

#[tokio::test]
async fn test_validation_rejects_empty_batch() {
    let harness = TestHarness::mocked(MockEngine::new());

    let empty = Message::batch(CommandType::Read, EndpointInfo::new(DEMO_URI), vec![]);
    let outcome = harness.send(empty);
    assert_eq!(outcome.status, StatusCode::ParamInvalid);
    assert!(outcome.diagnostic.is_some());
    assert!(harness.manager().stats().send.is_none());

    harness.close().await;
}

fn panicking_validator(_: &Message) -> Result<(), ValidationError> {
    panic!("validator bug");
}

#[tokio::test]
async fn test_validation_panic_is_param_invalid() {
    let engine = MockEngine::new();
    let manager = ProtocolManager::builder()
        .engine(Arc::new(engine.clone()))
        .validator(panicking_validator)
        .build()
        .unwrap();

    let outcome = manager.send(MessageFixtures::read(DEMO_URI, "Temp1", "r-1"));
    assert_eq!(outcome.status, StatusCode::ParamInvalid);
    assert_eq!(outcome.diagnostic.as_deref(), Some("validation failed"));
    assert_eq!(manager.send_queue_len(), 0);
    assert!(manager.stats().send.is_none());
    assert_eq!(engine.call_count("read"), 0);

    manager.close().await;
}

#[tokio::test]
async fn test_validation_requires_command_payloads() {
    let harness = TestHarness::mocked(MockEngine::new());

    let mut browse = MessageFixtures::browse(DEMO_URI, "Boiler", "b-1");
    browse.browse_parameter = None;
    assert_eq!(harness.send(browse).status, StatusCode::ParamInvalid);

    let subscribe = Message::single(CommandType::Subscribe, EndpointInfo::new(DEMO_URI), Request::new("Temp1"));
    assert_eq!(harness.send(subscribe).status, StatusCode::ParamInvalid);

    let method = Message::single(CommandType::InvokeMethod, EndpointInfo::new(DEMO_URI), Request::new("Reset"));
    assert_eq!(harness.send(method).status, StatusCode::ParamInvalid);

    let no_alias = Request::new("x").with_node_info(Some(NodeInfo {
        method_name: Some("Reset".to_string()),
        ..Default::default()
    }));
    let write = Message::single(CommandType::Write, EndpointInfo::new(DEMO_URI), no_alias.with_value(1i32));
    assert_eq!(harness.send(write).status, StatusCode::ParamInvalid);

    let mut start = MessageFixtures::start_client(DEMO_URI);
    start.endpoint_info = None;
    assert_eq!(harness.send(start).status, StatusCode::ParamInvalid);

    assert_eq!(harness.manager().send_queue_len(), 0);
    assert!(harness.manager().errors().is_empty());
    harness.close().await;
}

#[tokio::test]
async fn test_validation_accepts_endpoint_commands_without_alias() {
    let harness = TestHarness::mocked(MockEngine::new());

    assert!(harness.send(MessageFixtures::get_endpoints(DEMO_URI)).is_ok());
    assert!(harness.send(MessageFixtures::stop_server(DEMO_URI)).is_ok());

    harness.close().await;
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[tokio::test]
async fn test_order_writes_execute_in_send_order() {
    let harness = TestHarness::mocked(MockEngine::new());
    harness.start_client(DEMO_URI).await;

    for i in 0..20i32 {
        let outcome = harness.send(MessageFixtures::write(DEMO_URI, SETPOINT, i, &format!("w-{i}")));
        assert!(outcome.is_ok());
    }

    let mock = harness.mock().clone();
    assert!(harness.wait_until(|| mock.writes().len() == 20).await);

    let node: NodeId = SETPOINT.parse().unwrap();
    let values: Vec<Variant> = mock
        .writes()
        .into_iter()
        .map(|(written, value)| {
            assert_eq!(written, node);
            value
        })
        .collect();
    let expected: Vec<Variant> = (0..20i32).map(Variant::from).collect();
    assert_eq!(values, expected);

    assert!(harness.wait_until(|| harness.receiver().responses().len() == 20).await);
    let ids: Vec<String> = harness
        .receiver()
        .responses()
        .iter()
        .map(|m| m.responses[0].request_id.clone())
        .collect();
    let expected_ids: Vec<String> = (0..20).map(|i| format!("w-{i}")).collect();
    assert_eq!(ids, expected_ids);

    harness.close().await;
}

#[tokio::test]
async fn test_order_reads_deliver_in_send_order() {
    let engine = MockEngine::new();
    for i in 0..16i32 {
        engine.set_value(format!("ns=2;s=Tag{i}").parse().unwrap(), i);
    }
    let harness = TestHarness::mocked(engine);
    harness.start_client(DEMO_URI).await;

    for i in 0..16 {
        let read = MessageFixtures::read(DEMO_URI, &format!("ns=2;s=Tag{i}"), &format!("r-{i}"));
        assert!(harness.send(read).is_ok());
    }
    assert!(harness.wait_until(|| harness.receiver().responses().len() == 16).await);

    let delivered: Vec<(String, Option<Variant>)> = harness
        .receiver()
        .responses()
        .iter()
        .map(|m| (m.responses[0].request_id.clone(), m.responses[0].value.clone()))
        .collect();
    let expected: Vec<(String, Option<Variant>)> = (0..16i32)
        .map(|i| (format!("r-{i}"), Some(Variant::Int32(i))))
        .collect();
    assert_eq!(delivered, expected);

    let reads: Vec<String> = harness
        .mock()
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("read:"))
        .collect();
    let expected_reads: Vec<String> = (0..16).map(|i| format!("read:ns=2;s=Tag{i}")).collect();
    assert_eq!(reads, expected_reads);

    harness.close().await;
}

#[tokio::test]
async fn test_order_batch_responses_share_one_message() {
    let engine = MockEngine::new();
    engine.set_value("ns=2;s=A".parse().unwrap(), 1i32);
    engine.set_value("ns=2;s=B".parse().unwrap(), 2i32);
    let harness = TestHarness::mocked(engine);
    harness.start_client(DEMO_URI).await;

    assert!(harness
        .send(MessageFixtures::read_batch(DEMO_URI, &["ns=2;s=A", "ns=2;s=B"]))
        .is_ok());
    assert!(harness.wait_until(|| !harness.receiver().responses().is_empty()).await);

    let message = &harness.receiver().responses()[0];
    assert_eq!(message.command, Some(CommandType::Read));
    assert_eq!(message.responses.len(), 2);
    assert_eq!(message.responses[0].request_id, "r-0");
    assert_eq!(message.responses[0].value, Some(Variant::Int32(1)));
    assert_eq!(message.responses[1].value, Some(Variant::Int32(2)));

    harness.close().await;
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[tokio::test]
async fn test_capacity_full_send_queue_reports_enqueue_error() {
    let settings = DispatchSettings {
        send_queue_capacity: 1,
        receive_queue_capacity: 0,
    };
    let harness = TestHarness::simulated_with(SimulatedEngine::new(), settings);

    // The worker cannot run before this task yields.
    assert!(harness.send(MessageFixtures::get_endpoints(DEMO_URI)).is_ok());
    let outcome = harness.send(MessageFixtures::get_endpoints(DEMO_URI));
    assert_eq!(outcome.status, StatusCode::EnqueueError);

    let stats = harness.manager().stats().send.unwrap();
    assert_eq!(stats.enqueued, 1);
    assert_eq!(stats.rejected, 1);

    harness.close().await;
    assert_eq!(harness.receiver().devices().len(), 1);
}

// =============================================================================
// Close Tests
// =============================================================================

#[tokio::test]
async fn test_close_drains_queued_work() {
    let harness = TestHarness::mocked(MockEngine::new());
    harness.start_client(DEMO_URI).await;

    for i in 0..10i32 {
        assert!(harness
            .send(MessageFixtures::write(DEMO_URI, SETPOINT, i, &format!("w-{i}")))
            .is_ok());
    }
    harness.close().await;

    assert_eq!(harness.mock().writes().len(), 10);
    assert_eq!(harness.receiver().responses().len(), 10);
    assert!(harness.manager().sessions().is_empty());
    assert_eq!(harness.mock().call_count("disconnect:"), 1);
}

#[tokio::test]
async fn test_close_unused_manager_is_noop() {
    let harness = TestHarness::mocked(MockEngine::new());
    harness.close().await;
    harness.close().await;
    assert_eq!(harness.mock().release_count(), 0);
}

#[tokio::test]
async fn test_close_twice_and_reuse() {
    let harness = TestHarness::mocked(MockEngine::new());
    harness.start_client(DEMO_URI).await;

    harness.close().await;
    harness.close().await;
    assert_eq!(harness.mock().release_count(), 1);
    assert!(harness.manager().stats().send.is_none());
    assert!(harness.manager().stats().receive.is_none());

    harness.receiver().clear();
    harness.start_client(DEMO_URI).await;
    assert_eq!(harness.mock().call_count("connect:"), 2);

    harness.close().await;
    assert_eq!(harness.mock().release_count(), 2);
}
