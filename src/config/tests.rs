//! Config module tests

use std::time::Duration;

use super::*;
use crate::bridge::{ConnectorSource, RoutingType};

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("MGMT_TEST_VAR_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${MGMT_TEST_VAR_SIMPLE}\"").unwrap();
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("MGMT_TEST_VAR_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    // Unset var should use default
    std::env::remove_var("MGMT_TEST_VAR_UNSET");
    let result = substitute_env_vars("value = \"${MGMT_TEST_VAR_UNSET:-default_value}\"").unwrap();
    assert_eq!(result, "value = \"default_value\"");

    // Set var should use env value
    std::env::set_var("MGMT_TEST_VAR_SET", "env_value");
    let result = substitute_env_vars("value = \"${MGMT_TEST_VAR_SET:-default_value}\"").unwrap();
    assert_eq!(result, "value = \"env_value\"");
    std::env::remove_var("MGMT_TEST_VAR_SET");
}

#[test]
fn test_substitute_env_vars_missing_no_default() {
    std::env::remove_var("MGMT_TEST_VAR_MISSING");
    let result = substitute_env_vars("value = \"${MGMT_TEST_VAR_MISSING}\"").unwrap();
    assert_eq!(result, "value = \"\"");
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.log.level, "info");
    assert!(config.bridge.is_empty());
    assert_eq!(config.bridge_overrides, BridgeOverrides::default());
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_config() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.log.level, "info");
    assert!(config.bridge.is_empty());
}

#[test]
fn test_parse_bridge_config() {
    let content = r#"
[log]
level = "debug"

[[bridge]]
name = "orders-to-dc2"
queue_name = "orders"
forwarding_address = "dc2.orders"
static_connectors = ["dc2-a", "dc2-b"]
retry_interval = 1000
retry_interval_multiplier = 2.0
max_retry_interval = 30000
producer_window_size = -1
user = "bridge"
credential_reference = { store = "vault", alias = "bridge-pw" }

[[bridge]]
name = "audit"
queue_name = "audit"
discovery_group = "dg-group1"
enabled = false

[bridge_overrides]
call_timeout = 45000

[bridge_overrides.bridges.orders-to-dc2]
routing_type = "anycast"
"#;

    let config = Config::parse(content).unwrap();
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.bridge.len(), 2);

    let orders = &config.bridge[0];
    assert_eq!(orders.forwarding_address.as_deref(), Some("dc2.orders"));
    assert_eq!(orders.retry_interval, 1000);
    assert_eq!(orders.producer_window_size, -1);
    assert_eq!(
        orders.credential_reference,
        Some(CredentialReference {
            store: "vault".to_string(),
            alias: "bridge-pw".to_string(),
        })
    );
    assert!(!config.bridge[1].enabled);

    let specs = config.resolved_bridges().unwrap();
    assert_eq!(specs[0].routing_type, RoutingType::Anycast);
    assert_eq!(specs[0].call_timeout, Duration::from_millis(45_000));
    assert_eq!(specs[0].producer_window_size, None);
    assert_eq!(
        specs[0].retry.interval_for_attempt(2),
        Duration::from_millis(4_000)
    );
    assert_eq!(
        specs[1].connectors,
        ConnectorSource::DiscoveryGroup("dg-group1".to_string())
    );
    assert_eq!(specs[1].routing_type, RoutingType::Pass);
}

#[test]
fn test_invalid_log_level() {
    let result = Config::parse("[log]\nlevel = \"loud\"\n");
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_duplicate_bridge_names() {
    let content = r#"
[[bridge]]
name = "b"
queue_name = "q1"
static_connectors = ["c"]

[[bridge]]
name = "b"
queue_name = "q2"
static_connectors = ["c"]
"#;
    let err = Config::parse(content).unwrap_err();
    assert!(err.to_string().contains("Duplicate bridge name 'b'"));
}

#[test]
fn test_bridge_without_connectors_rejected() {
    let content = r#"
[[bridge]]
name = "b"
queue_name = "q"
"#;
    let err = Config::parse(content).unwrap_err();
    assert!(err.to_string().contains("bridge 'b'"));
}

#[test]
fn test_override_for_unknown_bridge_rejected() {
    let content = r#"
[[bridge]]
name = "b"
queue_name = "q"
static_connectors = ["c"]

[bridge_overrides.bridges.ghost]
call_timeout = 1000
"#;
    let err = Config::parse(content).unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn test_invalid_override_value_rejected() {
    let content = r#"
[[bridge]]
name = "b"
queue_name = "q"
static_connectors = ["c"]

[bridge_overrides.bridges.b]
routing_type = "FANOUT"
"#;
    assert!(matches!(
        Config::parse(content),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_parse_error() {
    assert!(matches!(
        Config::parse("[[bridge]\nname = "),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_load_config_with_env_substitution() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("mgmt.toml");

    std::env::set_var("MGMT_TEST_BRIDGE_QUEUE", "payments");

    let config_content = r#"
[[bridge]]
name = "payments"
queue_name = "${MGMT_TEST_BRIDGE_QUEUE}"
static_connectors = ["${MGMT_TEST_CONNECTOR:-remote}"]
retry_interval = ${MGMT_TEST_RETRY:-500}
"#;
    std::fs::write(&config_path, config_content).unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.bridge.len(), 1);
    assert_eq!(config.bridge[0].queue_name, "payments");
    assert_eq!(
        config.bridge[0].static_connectors,
        Some(vec!["remote".to_string()])
    );
    assert_eq!(config.bridge[0].retry_interval, 500);
    assert_eq!(config.bridge[0].call_timeout, 30_000);

    std::env::remove_var("MGMT_TEST_BRIDGE_QUEUE");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.log.level, "info");
    assert!(config.bridge.is_empty());
}

#[test]
fn test_load_file_requires_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("typo.toml");
    match Config::load_file(&missing) {
        Err(ConfigError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected missing file error, got {:?}", other),
    }

    let present = dir.path().join("mgmt.toml");
    std::fs::write(&present, "[log]\nlevel = \"debug\"\n").unwrap();
    assert_eq!(Config::load_file(&present).unwrap().log.level, "debug");
}
