// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Configuration Integration Tests
//!
//! Configuration files loaded from disk and turned into the descriptors the
//! protocol manager consumes.
//!
//! ## Test Categories
//!
//! - `test_load_*`: reading YAML and TOML files
//! - `test_env_*`: placeholders and prefixed overrides
//! - `test_invalid_*`: files rejected by parsing or validation
//! - `test_apply_*`: driving a manager from a loaded configuration

use std::collections::HashMap;
use std::io::Write;

use edge_config::{ConfigError, ConfigLoader, GatewayConfig, LogFormat, LogLevel};
use edge_core::{CommandType, Message, StatusCode, Variant};
use edge_opcua::SimulatedEngine;
use tempfile::NamedTempFile;

use edge_tests::common::fixtures::{ConfigFixtures, DEMO_URI, SECOND_URI, SERVER_URI};
use edge_tests::common::harness::TestHarness;

fn write_config(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("edge-config-")
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn loader(vars: &[(&str, &str)]) -> ConfigLoader {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ConfigLoader::new().with_env_map(vars)
}

fn load_full_yaml(vars: &[(&str, &str)]) -> GatewayConfig {
    let file = write_config(ConfigFixtures::full_yaml(), ".yaml");
    loader(vars).load(file.path()).unwrap()
}

// =============================================================================
// Load Tests
// =============================================================================

#[test]
fn test_load_full_yaml() {
    let config = load_full_yaml(&[]);

    assert_eq!(config.gateway.id, "edge-test");
    assert_eq!(config.gateway.name, "Integration Gateway");
    assert_eq!(config.dispatch.send_queue_capacity, 64);
    assert_eq!(config.dispatch.receive_queue_capacity, 0);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.client.application_name, "edge-tests");
    assert_eq!(config.client.request_timeout_ms, 5000);

    assert_eq!(config.endpoints.len(), 2);
    let auto: Vec<&str> = config.auto_start_endpoints().map(|e| e.uri.as_str()).collect();
    assert_eq!(auto, vec![DEMO_URI]);
    assert!(!config.endpoint(SECOND_URI).unwrap().browse_address_space);

    assert!(config.server.enabled);
    assert_eq!(config.server.uri, SERVER_URI);
    assert_eq!(config.server.namespaces[0].root_browse_name(), "Plant");
    assert_eq!(config.server.namespaces[0].variables.len(), 3);
}

#[test]
fn test_load_full_toml() {
    let file = write_config(ConfigFixtures::full_toml(), ".toml");
    let config = loader(&[]).load(file.path()).unwrap();

    assert_eq!(config.gateway.id, "edge-test");
    assert_eq!(config.endpoints.len(), 2);
    assert_eq!(config.auto_start_endpoints().count(), 1);
    assert!(config.server.enabled);

    let namespace = &config.server.namespaces[0];
    assert_eq!(namespace.root_browse_name(), "urn:edge:plant");
    assert_eq!(namespace.node_items()[0].value, Variant::Double(1.5));
}

#[test]
fn test_load_endpoint_descriptors() {
    let config = load_full_yaml(&[]);

    let first = config.endpoints[0].to_endpoint_info(&config.client);
    assert_eq!(first.endpoint_uri, DEMO_URI);
    let first_config = first.config.unwrap();
    assert_eq!(first_config.application_name, "edge-tests");
    assert_eq!(first_config.request_timeout_ms, 5000);
    assert!(first_config.view_node_enabled);
    assert!(!first_config.uses_security());

    let second = config.endpoints[1].to_endpoint_info(&config.client);
    assert!(!second.config.unwrap().view_node_enabled);

    assert_eq!(config.server.to_endpoint_info().endpoint_uri, SERVER_URI);
}

#[test]
fn test_load_node_items_convert_values() {
    let config = load_full_yaml(&[]);
    let items = config.server.namespaces[0].node_items();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].browse_name, "Speed");
    assert_eq!(items[0].value, Variant::Double(1.5));
    assert_eq!(items[1].value, Variant::Boolean(true));
    assert_eq!(items[2].browse_name, "Label");
    assert_eq!(items[2].display_name, "Line label");
    assert_eq!(items[2].value, Variant::String("line-1".to_string()));
}

// =============================================================================
// Environment Tests
// =============================================================================

#[test]
fn test_env_placeholder_resolves_from_lookup() {
    let config = load_full_yaml(&[("GATEWAY_ID", "line-7")]);
    assert_eq!(config.gateway.id, "line-7");
}

#[test]
fn test_env_overrides_take_precedence() {
    let config = load_full_yaml(&[
        ("GATEWAY_ID", "line-7"),
        ("EDGE_GATEWAY_ID", "override"),
        ("EDGE_LOG_LEVEL", "warn"),
        ("EDGE_LOG_FORMAT", "compact"),
        ("EDGE_REQUEST_TIMEOUT_MS", "750"),
    ]);

    assert_eq!(config.gateway.id, "override");
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.logging.format, LogFormat::Compact);
    assert_eq!(config.client.request_timeout_ms, 750);
}

#[test]
fn test_env_invalid_override_is_rejected() {
    let file = write_config(ConfigFixtures::full_yaml(), ".yaml");

    let err = loader(&[("EDGE_LOG_LEVEL", "loud")]).load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "EDGE_LOG_LEVEL"));

    let err = loader(&[("EDGE_REQUEST_TIMEOUT_MS", "soon")]).load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
}

// =============================================================================
// Invalid Configuration Tests
// =============================================================================

#[test]
fn test_invalid_endpoint_scheme() {
    let file = write_config(ConfigFixtures::invalid_endpoint_yaml(), ".yaml");
    let err = loader(&[]).load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "endpoints[0].uri"));
}

#[test]
fn test_invalid_unknown_field() {
    let file = write_config("gateway:\n  id: edge\n  colour: blue\n", ".yaml");
    let err = loader(&[]).load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_invalid_missing_file_and_extension() {
    let dir = tempfile::tempdir().unwrap();

    let err = loader(&[]).load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));

    let file = write_config(ConfigFixtures::full_yaml(), ".ini");
    let err = loader(&[]).load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
}

#[test]
fn test_invalid_duplicate_endpoints() {
    let content = "endpoints:\n  - uri: opc.tcp://a:4840\n  - uri: opc.tcp://a:4840\n";
    let file = write_config(content, ".yaml");
    let err = loader(&[]).load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "endpoints[1].uri"));
}

// =============================================================================
// Apply Tests
// =============================================================================

#[tokio::test]
async fn test_apply_server_namespaces() {
    let config = load_full_yaml(&[]);
    let harness = TestHarness::simulated(SimulatedEngine::new());
    let manager = harness.manager().clone();

    let start = Message::endpoint_command(CommandType::StartServer, config.server.to_endpoint_info());
    assert!(harness.send(start).is_ok());
    assert!(harness.wait_for_status(SERVER_URI, StatusCode::ServerStarted).await);

    for namespace in &config.server.namespaces {
        assert!(manager
            .create_namespace(
                &namespace.name,
                &namespace.root_node_id,
                namespace.root_browse_name(),
                namespace.root_display_name(),
            )
            .is_ok());
        for item in namespace.node_items() {
            assert!(manager.create_node(&namespace.name, item).is_ok());
        }
    }

    assert_eq!(manager.get_nodes_by_browse_name("Label").unwrap().len(), 1);
    assert_eq!(manager.get_nodes_by_browse_name("Running").unwrap().len(), 1);
    assert!(manager.get_nodes_by_browse_name("Absent").unwrap().is_empty());

    harness.close().await;
}
