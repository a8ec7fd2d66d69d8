// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Command Integration Tests
//!
//! Every command type end to end against the simulation engine, plus
//! failure conversion into error records and `ERROR` messages.
//!
//! ## Test Categories
//!
//! - `test_value_*`: READ, READ_SYNC, WRITE
//! - `test_browse_*`: BROWSE
//! - `test_method_*`: INVOKE_METHOD
//! - `test_subscribe_*`: SUBSCRIBE create/modify/delete and reports
//! - `test_discovery_*`: GET_ENDPOINTS and devices announced by other servers
//! - `test_server_*`: START_SERVER, namespace store, STOP_SERVER
//! - `test_error_*`: failures after queuing

use edge_core::{CommandType, EndpointDescription, MessageKind, NodeClass, StatusCode, SubscriptionType, Variant};
use edge_opcua::{NodeId, NodeItem, SimulatedEngine};

use edge_tests::common::fixtures::{MessageFixtures, DEMO_URI, SERVER_URI, UNKNOWN_URI};
use edge_tests::common::harness::TestHarness;
use edge_tests::common::mocks::MockEngine;

async fn demo_harness() -> TestHarness {
    let harness = TestHarness::simulated(SimulatedEngine::new().with_demo_server(DEMO_URI));
    harness.start_client(DEMO_URI).await;
    harness
}

// =============================================================================
// Value Tests
// =============================================================================

#[tokio::test]
async fn test_value_read() {
    let harness = demo_harness().await;

    assert!(harness.send(MessageFixtures::read(DEMO_URI, "Temp1", "r-1")).is_ok());
    assert!(harness.wait_until(|| harness.receiver().responses().len() == 1).await);

    let message = &harness.receiver().responses()[0];
    assert_eq!(message.command, Some(CommandType::Read));
    assert_eq!(message.kind, Some(MessageKind::GeneralResponse));
    assert_eq!(message.endpoint_uri(), Some(DEMO_URI));
    let response = &message.responses[0];
    assert_eq!(response.request_id, "r-1");
    assert_eq!(response.value, Some(Variant::Double(21.5)));
    assert!(response.result.is_ok());

    harness.close().await;
}

#[tokio::test]
async fn test_value_read_by_node_id() {
    let harness = demo_harness().await;

    assert!(harness.send(MessageFixtures::read(DEMO_URI, "ns=2;s=Pressure", "r-1")).is_ok());
    assert!(harness.wait_until(|| harness.receiver().responses().len() == 1).await);
    assert_eq!(
        harness.receiver().responses()[0].responses[0].value,
        Some(Variant::Double(1.2))
    );

    harness.close().await;
}

#[tokio::test]
async fn test_value_read_sync() {
    let harness = demo_harness().await;

    assert!(harness.send(MessageFixtures::read_sync(DEMO_URI, "Pressure", "rs-1")).is_ok());
    assert!(harness.wait_until(|| harness.receiver().responses().len() == 1).await);

    let message = &harness.receiver().responses()[0];
    assert_eq!(message.command, Some(CommandType::ReadSync));
    assert_eq!(message.responses[0].request_id, "rs-1");
    assert_eq!(message.responses[0].value, Some(Variant::Double(1.2)));

    harness.close().await;
}

#[tokio::test]
async fn test_value_write_then_read() {
    let harness = demo_harness().await;

    assert!(harness.send(MessageFixtures::write(DEMO_URI, "Temp1", 30.0, "w-1")).is_ok());
    assert!(harness.send(MessageFixtures::read(DEMO_URI, "Temp1", "r-1")).is_ok());
    assert!(harness.wait_until(|| harness.receiver().responses().len() == 2).await);

    let responses = harness.receiver().responses();
    assert_eq!(responses[0].command, Some(CommandType::Write));
    assert_eq!(responses[0].responses[0].value, Some(Variant::Double(30.0)));
    assert_eq!(responses[1].command, Some(CommandType::Read));
    assert_eq!(responses[1].responses[0].value, Some(Variant::Double(30.0)));

    harness.close().await;
}

#[tokio::test]
async fn test_value_batch_partial_failure() {
    let harness = demo_harness().await;

    assert!(harness
        .send(MessageFixtures::read_batch(DEMO_URI, &["Temp1", "NoSuchValue", "Pressure"]))
        .is_ok());
    assert!(harness
        .wait_until(|| harness.receiver().responses().len() == 1 && harness.receiver().errors().len() == 1)
        .await);

    let response = &harness.receiver().responses()[0];
    let ids: Vec<&str> = response.responses.iter().map(|r| r.request_id.as_str()).collect();
    assert_eq!(ids, vec!["r-0", "r-2"]);

    let error = &harness.receiver().errors()[0];
    assert_eq!(error.kind, Some(MessageKind::Error));
    assert_eq!(error.responses[0].request_id, "r-1");
    assert_eq!(error.result.as_ref().map(|r| r.status), Some(StatusCode::InternalError));

    let records = harness.manager().errors().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_id.as_deref(), Some("r-1"));

    harness.close().await;
}

// =============================================================================
// Browse Tests
// =============================================================================

#[tokio::test]
async fn test_browse_object() {
    let harness = demo_harness().await;

    assert!(harness.send(MessageFixtures::browse(DEMO_URI, "Boiler", "b-1")).is_ok());
    assert!(harness.wait_until(|| harness.receiver().browse_results().len() == 1).await);

    let (request_id, results) = harness.receiver().browse_results().remove(0);
    assert_eq!(request_id, "b-1");
    let names: Vec<&str> = results.iter().map(|r| r.browse_name.as_str()).collect();
    assert_eq!(names, vec!["Temp1", "Pressure", "Reset"]);
    assert_eq!(results[2].node_class, NodeClass::Method);
    assert!(harness.receiver().responses().is_empty());

    harness.close().await;
}

#[tokio::test]
async fn test_browse_unknown_node_fails() {
    let harness = demo_harness().await;

    assert!(harness.send(MessageFixtures::browse(DEMO_URI, "ns=2;s=Nowhere", "b-1")).is_ok());
    assert!(harness.wait_for_errors(1).await);
    assert_eq!(
        harness.manager().errors().records()[0].request_id.as_deref(),
        Some("b-1")
    );
    assert!(harness.receiver().browse_results().is_empty());

    harness.close().await;
}

// =============================================================================
// Method Tests
// =============================================================================

#[tokio::test]
async fn test_method_invoke() {
    let harness = demo_harness().await;

    assert!(harness
        .send(MessageFixtures::method(DEMO_URI, "Reset", vec![Variant::Int32(1)], "m-1"))
        .is_ok());
    assert!(harness.wait_until(|| harness.receiver().responses().len() == 1).await);

    let message = &harness.receiver().responses()[0];
    assert_eq!(message.command, Some(CommandType::InvokeMethod));
    assert_eq!(message.responses[0].request_id, "m-1");
    assert_eq!(message.responses[0].value, Some(Variant::Boolean(true)));

    harness.close().await;
}

#[tokio::test]
async fn test_method_unknown_alias_fails() {
    let harness = demo_harness().await;

    assert!(harness
        .send(MessageFixtures::method(DEMO_URI, "Explode", Vec::new(), "m-1"))
        .is_ok());
    assert!(harness.wait_for_errors(1).await);
    assert!(harness.wait_until(|| harness.receiver().errors().len() == 1).await);
    assert_eq!(
        harness.receiver().errors()[0].command,
        Some(CommandType::InvokeMethod)
    );

    harness.close().await;
}

// =============================================================================
// Subscription Tests
// =============================================================================

#[tokio::test]
async fn test_subscribe_reports_changes() {
    let harness = demo_harness().await;

    let create = MessageFixtures::subscribe(DEMO_URI, "Temp1", SubscriptionType::Create, "s-1");
    assert!(harness.send(create).is_ok());
    assert!(harness.wait_until(|| harness.receiver().reports().len() == 1).await);

    let initial = &harness.receiver().reports()[0];
    assert_eq!(initial.kind, Some(MessageKind::Report));
    assert_eq!(initial.responses[0].request_id, "s-1");
    assert_eq!(initial.responses[0].value, Some(Variant::Double(21.5)));

    harness
        .simulator()
        .inject_value(DEMO_URI, &NodeId::string(2, "Temp1"), Variant::Double(25.0))
        .unwrap();
    assert!(harness.wait_until(|| harness.receiver().reports().len() == 2).await);
    assert_eq!(
        harness.receiver().reports()[1].responses[0].value,
        Some(Variant::Double(25.0))
    );

    let session = harness.manager().sessions().get(DEMO_URI).unwrap();
    assert_eq!(session.monitored_aliases(), vec!["Temp1".to_string()]);

    harness.close().await;
}

#[tokio::test]
async fn test_subscribe_modify_and_delete() {
    let harness = demo_harness().await;

    for (sub_type, id) in [
        (SubscriptionType::Create, "s-1"),
        (SubscriptionType::Modify, "s-2"),
    ] {
        assert!(harness.send(MessageFixtures::subscribe(DEMO_URI, "Temp1", sub_type, id)).is_ok());
    }
    let simulator_items = || harness.simulator().monitored_items(DEMO_URI);
    assert!(harness.wait_until(|| simulator_items().len() == 1).await);
    assert!(harness.wait_idle().await);

    let delete = MessageFixtures::subscribe(DEMO_URI, "Temp1", SubscriptionType::Delete, "s-3");
    assert!(harness.send(delete).is_ok());
    assert!(harness.wait_until(|| simulator_items().is_empty()).await);
    assert!(harness.wait_idle().await);

    assert!(harness.manager().errors().is_empty());
    harness.close().await;
}

#[tokio::test]
async fn test_subscribe_twice_is_rejected() {
    let harness = demo_harness().await;

    for id in ["s-1", "s-2"] {
        let create = MessageFixtures::subscribe(DEMO_URI, "Temp1", SubscriptionType::Create, id);
        assert!(harness.send(create).is_ok());
    }
    assert!(harness.wait_for_errors(1).await);

    let records = harness.manager().errors().records();
    assert_eq!(records[0].request_id.as_deref(), Some("s-2"));
    assert_eq!(harness.simulator().monitored_item_count(DEMO_URI), 1);

    harness.close().await;
}

#[tokio::test]
async fn test_subscribe_delete_unknown_fails() {
    let harness = demo_harness().await;

    let delete = MessageFixtures::subscribe(DEMO_URI, "Pressure", SubscriptionType::Delete, "s-1");
    assert!(harness.send(delete).is_ok());
    assert!(harness.wait_for_errors(1).await);

    harness.close().await;
}

// =============================================================================
// Discovery Tests
// =============================================================================

#[tokio::test]
async fn test_discovery_get_endpoints() {
    let harness = TestHarness::simulated(SimulatedEngine::new().with_demo_server(DEMO_URI));

    assert!(harness.send(MessageFixtures::get_endpoints(DEMO_URI)).is_ok());
    assert!(harness.wait_until(|| harness.receiver().devices().len() == 1).await);

    let device = &harness.receiver().devices()[0];
    assert_eq!(device.address, "10.0.0.5");
    assert_eq!(device.port, 12686);
    assert_eq!(device.server_name, "edge-server");
    assert_eq!(device.endpoints.len(), 1);
    assert_eq!(device.endpoints[0].endpoint_url, DEMO_URI);

    // No session is needed.
    assert!(harness.manager().sessions().is_empty());
    harness.close().await;
}

#[tokio::test]
async fn test_discovery_unreachable_device_has_no_endpoints() {
    let harness = TestHarness::simulated(SimulatedEngine::new());

    assert!(harness.send(MessageFixtures::get_endpoints(UNKNOWN_URI)).is_ok());
    assert!(harness.wait_until(|| harness.receiver().devices().len() == 1).await);

    let device = &harness.receiver().devices()[0];
    assert_eq!(device.address, "10.0.0.99");
    assert!(device.endpoints.is_empty());

    harness.close().await;
}

#[tokio::test]
async fn test_discovery_malformed_uri_is_dropped() {
    let harness = TestHarness::mocked(MockEngine::new());

    assert!(harness.send(MessageFixtures::get_endpoints("http://10.0.0.5/edge-server")).is_ok());
    assert!(harness.wait_idle().await);
    harness.close().await;

    assert!(harness.receiver().devices().is_empty());
    assert!(harness.manager().errors().is_empty());
    assert_eq!(harness.mock().call_count("discover:"), 0);
}

#[tokio::test]
async fn test_discovery_announces_other_devices() {
    let harness = TestHarness::mocked(MockEngine::new());
    harness.mock().advertise(
        DEMO_URI,
        vec![
            EndpointDescription::unsecured("opc.tcp://10.0.0.7:4841/plc"),
            EndpointDescription::unsecured("not a url"),
        ],
    );

    assert!(harness.send(MessageFixtures::get_endpoints(DEMO_URI)).is_ok());
    assert!(harness.wait_until(|| harness.receiver().announced().len() == 1).await);

    let devices = harness.receiver().devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].endpoints.len(), 3);

    let announced = &harness.receiver().announced()[0];
    assert_eq!(announced.address, "10.0.0.7");
    assert_eq!(announced.port, 4841);
    assert_eq!(announced.server_name, "plc");
    assert_eq!(announced.endpoints.len(), 1);
    assert_eq!(announced.endpoints[0].endpoint_url, "opc.tcp://10.0.0.7:4841/plc");

    harness.close().await;
}

// =============================================================================
// Server Tests
// =============================================================================

#[tokio::test]
async fn test_server_ops_require_running_server() {
    let harness = TestHarness::simulated(SimulatedEngine::new());

    let outcome = harness.manager().create_namespace("urn:edge:plant", "ns=2;s=Plant", "Plant", "Plant");
    assert_eq!(outcome.status, StatusCode::NotStartServer);
    assert_eq!(
        harness.manager().get_nodes().unwrap_err().status,
        StatusCode::NotStartServer
    );

    harness.close().await;
}

#[tokio::test]
async fn test_server_lifecycle_and_namespace_store() {
    let harness = TestHarness::simulated(SimulatedEngine::new());
    let manager = harness.manager().clone();

    assert!(harness.send(MessageFixtures::start_server(SERVER_URI)).is_ok());
    assert!(harness.wait_for_status(SERVER_URI, StatusCode::ServerStarted).await);

    assert!(manager.create_namespace("urn:edge:plant", "ns=2;s=Plant", "Plant", "Plant").is_ok());
    assert_eq!(
        manager.create_namespace("urn:edge:plant", "ns=2;s=Plant", "Plant", "Plant").status,
        StatusCode::Error
    );
    assert!(manager.create_node("urn:edge:plant", NodeItem::variable("Speed", 1.5)).is_ok());
    assert_eq!(
        manager
            .create_node("urn:edge:plant", NodeItem::method("Start", None))
            .status,
        StatusCode::ParamInvalid
    );

    let speed = manager.get_nodes_by_browse_name("Speed").unwrap();
    assert_eq!(speed.len(), 1);
    assert_eq!(manager.get_nodes().unwrap().len(), 2);
    assert!(manager
        .modify_variable_node_value("urn:edge:plant", "Speed", Variant::Double(2.5))
        .is_ok());

    // A client in the same process reads the embedded server.
    harness.start_client(SERVER_URI).await;
    let read = MessageFixtures::read(SERVER_URI, &speed[0].to_string(), "r-1");
    assert!(harness.send(read).is_ok());
    assert!(harness.wait_until(|| harness.receiver().responses().len() == 1).await);
    assert_eq!(
        harness.receiver().responses()[0].responses[0].value,
        Some(Variant::Double(2.5))
    );

    assert!(harness.send(MessageFixtures::stop_server(SERVER_URI)).is_ok());
    assert!(harness.wait_for_status(SERVER_URI, StatusCode::StopServer).await);
    assert!(harness.wait_for_status(SERVER_URI, StatusCode::Disconnected).await);
    assert_eq!(
        manager.get_nodes().unwrap_err().status,
        StatusCode::NotStartServer
    );

    harness.close().await;
}

#[tokio::test]
async fn test_server_stop_without_start() {
    let harness = TestHarness::simulated(SimulatedEngine::new());

    assert!(harness.send(MessageFixtures::stop_server(SERVER_URI)).is_ok());
    assert!(harness.wait_for_errors(1).await);

    let record = &harness.manager().errors().records()[0];
    assert_eq!(record.outcome.status, StatusCode::NotStartServer);
    assert!(!harness.receiver().has_status(SERVER_URI, StatusCode::StopServer));

    harness.close().await;
}

// =============================================================================
// Error Tests
// =============================================================================

#[tokio::test]
async fn test_error_read_without_session() {
    let harness = TestHarness::mocked(MockEngine::new());

    let outcome = harness.send(MessageFixtures::read(UNKNOWN_URI, "Temp1", "r-1"));
    assert!(outcome.is_ok());
    assert!(harness.wait_for_errors(1).await);

    let record = &harness.manager().errors().records()[0];
    assert_eq!(record.endpoint.as_deref(), Some(UNKNOWN_URI));
    assert_eq!(record.request_id.as_deref(), Some("r-1"));
    assert_eq!(record.outcome.status, StatusCode::InternalError);

    assert!(harness.wait_until(|| harness.receiver().errors().len() == 1).await);
    let error = &harness.receiver().errors()[0];
    assert_eq!(error.command, Some(CommandType::Read));
    assert_eq!(error.responses[0].request_id, "r-1");

    harness.close().await;
}

#[tokio::test]
async fn test_error_engine_read_failure() {
    let engine = MockEngine::new();
    engine.fail_reads(true);
    let harness = TestHarness::mocked(engine);
    harness.start_client(DEMO_URI).await;

    assert!(harness.send(MessageFixtures::read(DEMO_URI, "ns=2;s=Level", "r-1")).is_ok());
    assert!(harness.wait_for_errors(1).await);

    let record = &harness.manager().errors().records_for(DEMO_URI)[0];
    assert_eq!(record.outcome.status, StatusCode::InternalError);
    assert!(record.outcome.diagnostic.as_deref().is_some_and(|d| d.contains("injected")));
    assert!(harness.receiver().responses().is_empty());

    harness.close().await;
}

#[tokio::test]
async fn test_error_write_without_alias_is_not_recorded() {
    let harness = TestHarness::mocked(MockEngine::new());

    let mut write = MessageFixtures::write(DEMO_URI, "Temp1", 1i32, "w-1");
    if let Some(request) = write.request.as_mut() {
        request.node_info = Some(Default::default());
    }
    assert_eq!(harness.send(write).status, StatusCode::ParamInvalid);
    assert!(harness.manager().errors().is_empty());

    harness.close().await;
}
