//! Bridge Module Tests

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use test_case::test_case;

use crate::broker::{BrokerCall, BrokerError, InMemoryBroker, QueueOptions};
use crate::config::{BridgeConfig, BridgeOverrides, CredentialReference};

use super::*;

fn broker_with_queue(queue: &str) -> InMemoryBroker {
    let broker = InMemoryBroker::new();
    broker
        .create_queue(queue, queue, QueueOptions::default().anycast())
        .unwrap();
    broker.clear_journal();
    broker
}

fn manager(broker: &InMemoryBroker) -> BridgeManager {
    BridgeManager::new(Arc::new(broker.clone()), BridgeOverrides::default())
}

fn orders_bridge() -> BridgeConfig {
    BridgeConfig::with_static_connectors("orders-bridge", "orders", &["remote"])
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_resolve_defaults() {
    let spec = resolve_bridge_spec(&orders_bridge(), &BridgeOverrides::default()).unwrap();

    assert_eq!(spec.name, "orders-bridge");
    assert_eq!(spec.queue_name, "orders");
    assert_eq!(
        spec.connectors,
        ConnectorSource::Static(vec!["remote".to_string()])
    );
    assert_eq!(spec.routing_type, RoutingType::Pass);
    assert_eq!(spec.call_timeout, Duration::from_millis(30_000));
    assert_eq!(spec.check_period, Some(Duration::from_millis(30_000)));
    assert_eq!(spec.connection_ttl, Some(Duration::from_millis(60_000)));
    assert_eq!(spec.min_large_message_size, 102_400);
    assert_eq!(spec.confirmation_window_size, Some(10 * 1024 * 1024));
    assert_eq!(spec.producer_window_size, Some(1024 * 1024));
    assert_eq!(spec.retry.retry_interval, Duration::from_millis(2_000));
    assert_eq!(spec.retry.reconnect_attempts, AttemptLimit::Unlimited);
    assert_eq!(
        spec.retry.reconnect_attempts_on_same_node,
        AttemptLimit::Limited(10)
    );
    assert!(spec.use_duplicate_detection);
    assert!(spec.credentials.is_none());
}

#[test]
fn test_resolve_discovery_group() {
    let config = BridgeConfig::with_discovery_group("b", "orders", "dg-group1");
    let spec = resolve_bridge_spec(&config, &BridgeOverrides::default()).unwrap();
    assert_eq!(
        spec.connectors,
        ConnectorSource::DiscoveryGroup("dg-group1".to_string())
    );
}

#[test]
fn test_resolve_rejects_both_connector_sources() {
    let config = BridgeConfig {
        discovery_group: Some("dg-group1".to_string()),
        ..orders_bridge()
    };
    let err = resolve_bridge_spec(&config, &BridgeOverrides::default()).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Configuration { ref bridge, .. } if bridge == "orders-bridge"
    ));
}

#[test]
fn test_resolve_rejects_no_connector_source() {
    let config = BridgeConfig {
        static_connectors: Some(vec![]),
        ..orders_bridge()
    };
    let err = resolve_bridge_spec(&config, &BridgeOverrides::default()).unwrap_err();
    assert!(err.to_string().contains("one of discovery_group or static_connectors"));
}

#[test_case(BridgeConfig { retry_interval: -5, ..orders_bridge() } ; "negative retry interval")]
#[test_case(BridgeConfig { max_retry_interval: -1, ..orders_bridge() } ; "negative max retry interval")]
#[test_case(BridgeConfig { retry_interval_multiplier: -0.5, ..orders_bridge() } ; "negative multiplier")]
#[test_case(BridgeConfig { retry_interval_multiplier: f64::NAN, ..orders_bridge() } ; "nan multiplier")]
#[test_case(BridgeConfig { reconnect_attempts: -2, ..orders_bridge() } ; "reconnect attempts below -1")]
#[test_case(BridgeConfig { initial_connect_attempts: -7, ..orders_bridge() } ; "initial attempts below -1")]
#[test_case(BridgeConfig { confirmation_window_size: -3, ..orders_bridge() } ; "confirmation window below -1")]
#[test_case(BridgeConfig { min_large_message_size: -1, ..orders_bridge() } ; "negative large message size")]
#[test_case(BridgeConfig { call_timeout: -1, ..orders_bridge() } ; "negative call timeout")]
#[test_case(BridgeConfig { routing_type: "BROADCAST".to_string(), ..orders_bridge() } ; "unknown routing type")]
#[test_case(BridgeConfig { queue_name: " ".to_string(), ..orders_bridge() } ; "blank queue name")]
#[test_case(BridgeConfig { name: String::new(), ..orders_bridge() } ; "empty name")]
fn test_resolve_rejects(config: BridgeConfig) {
    let err = resolve_bridge_spec(&config, &BridgeOverrides::default()).unwrap_err();
    assert!(matches!(err, BridgeError::Configuration { .. }), "{}", err);
}

#[test]
fn test_resolve_disabled_windows_and_periods() {
    let config = BridgeConfig {
        check_period: -1,
        connection_ttl: -1,
        producer_window_size: -1,
        confirmation_window_size: -1,
        ..orders_bridge()
    };
    let spec = resolve_bridge_spec(&config, &BridgeOverrides::default()).unwrap();
    assert_eq!(spec.check_period, None);
    assert_eq!(spec.connection_ttl, None);
    assert_eq!(spec.producer_window_size, None);
    assert_eq!(spec.confirmation_window_size, None);
}

#[test]
fn test_resolve_password_and_reference_exclusive() {
    let config = BridgeConfig {
        user: Some("bridge".to_string()),
        password: Some("secret".to_string()),
        credential_reference: Some(CredentialReference {
            store: "vault".to_string(),
            alias: "bridge-pw".to_string(),
        }),
        ..orders_bridge()
    };
    let err = resolve_bridge_spec(&config, &BridgeOverrides::default()).unwrap_err();
    assert!(err.to_string().contains("mutually exclusive"));
}

#[test]
fn test_resolve_credential_reference() {
    let reference = CredentialReference {
        store: "vault".to_string(),
        alias: "bridge-pw".to_string(),
    };
    let config = BridgeConfig {
        user: Some("bridge".to_string()),
        credential_reference: Some(reference.clone()),
        ..orders_bridge()
    };
    let spec = resolve_bridge_spec(&config, &BridgeOverrides::default()).unwrap();
    assert_eq!(
        spec.credentials,
        Some(BridgeCredentials {
            user: Some("bridge".to_string()),
            password: Some(PasswordSource::Reference(reference)),
        })
    );
}

#[test]
fn test_resolved_spec_json_redacts_password() {
    let config = BridgeConfig {
        user: Some("bridge".to_string()),
        password: Some("hunter2".to_string()),
        ..orders_bridge()
    };
    let spec = resolve_bridge_spec(&config, &BridgeOverrides::default()).unwrap();
    let json = serde_json::to_value(&spec).unwrap();

    assert_eq!(json["credentials"]["password"], "***");
    assert_eq!(json["call_timeout"], 30_000);
    assert_eq!(json["routing_type"], "PASS");
    assert_eq!(json["retry"]["reconnect_attempts"], -1);
    assert!(!format!("{:?}", spec).contains("hunter2"));
}

// =============================================================================
// Override Tests
// =============================================================================

#[test]
fn test_per_bridge_override_beats_global_and_declared() {
    let overrides = BridgeOverrides {
        call_timeout: Some(45_000),
        ..Default::default()
    }
    .with_call_timeout("orders-bridge", 5_000)
    .with_routing_type("orders-bridge", "anycast");

    let config = BridgeConfig {
        call_timeout: 1_000,
        routing_type: "MULTICAST".to_string(),
        ..orders_bridge()
    };
    let spec = resolve_bridge_spec(&config, &overrides).unwrap();
    assert_eq!(spec.call_timeout, Duration::from_millis(5_000));
    assert_eq!(spec.routing_type, RoutingType::Anycast);
}

#[test]
fn test_global_override_beats_declared() {
    let overrides = BridgeOverrides {
        call_timeout: Some(45_000),
        ..Default::default()
    };
    let config = BridgeConfig {
        call_timeout: 1_000,
        routing_type: "strip".to_string(),
        ..orders_bridge()
    };
    let spec = resolve_bridge_spec(&config, &overrides).unwrap();
    assert_eq!(spec.call_timeout, Duration::from_millis(45_000));
    assert_eq!(spec.routing_type, RoutingType::Strip);
}

#[test]
fn test_override_for_other_bridge_ignored() {
    let overrides = BridgeOverrides::default().with_call_timeout("other", 5_000);
    let spec = resolve_bridge_spec(&orders_bridge(), &overrides).unwrap();
    assert_eq!(spec.call_timeout, Duration::from_millis(30_000));
}

#[test]
fn test_invalid_routing_override_is_configuration_error() {
    let overrides = BridgeOverrides::default().with_routing_type("orders-bridge", "FANOUT");
    let err = resolve_bridge_spec(&orders_bridge(), &overrides).unwrap_err();
    assert!(err.to_string().contains("FANOUT"));
}

// =============================================================================
// Manager Tests
// =============================================================================

#[tokio::test]
async fn test_deploy_journal_order() {
    let broker = broker_with_queue("orders");
    let spec = manager(&broker).deploy(&orders_bridge()).await.unwrap();

    assert_eq!(spec.name, "orders-bridge");
    assert_eq!(
        broker.journal(),
        vec![
            BrokerCall::IsStarted,
            BrokerCall::ClearPendingIo,
            BrokerCall::DeployBridge("orders-bridge".to_string()),
            BrokerCall::WaitOnPendingIo,
            BrokerCall::ClearPendingIo,
        ]
    );
    assert_eq!(broker.bridge("orders-bridge"), Some(spec));
}

#[tokio::test]
async fn test_invalid_config_makes_no_broker_call() {
    let broker = broker_with_queue("orders");
    let config = BridgeConfig {
        discovery_group: Some("dg".to_string()),
        ..orders_bridge()
    };

    let err = manager(&broker).deploy(&config).await.unwrap_err();
    assert!(matches!(err, BridgeError::Configuration { .. }));
    assert!(broker.journal().is_empty());
}

#[tokio::test]
async fn test_deploy_requires_started_broker() {
    let broker = broker_with_queue("orders");
    broker.set_started(false);

    let err = manager(&broker).deploy(&orders_bridge()).await.unwrap_err();
    assert_eq!(err, BridgeError::BrokerNotStarted);
    assert_eq!(broker.journal(), vec![BrokerCall::IsStarted]);
}

#[tokio::test]
async fn test_refused_deploy_still_releases_io() {
    let broker = broker_with_queue("orders");
    broker.refuse_bridge_deployments(true);

    let err = manager(&broker).deploy(&orders_bridge()).await.unwrap_err();
    assert_eq!(err, BridgeError::DeploymentFailed("orders-bridge".to_string()));
    assert_eq!(
        broker.journal(),
        vec![
            BrokerCall::IsStarted,
            BrokerCall::ClearPendingIo,
            BrokerCall::DeployBridge("orders-bridge".to_string()),
            BrokerCall::WaitOnPendingIo,
            BrokerCall::ClearPendingIo,
        ]
    );
    assert!(broker.bridge_names().is_empty());
}

#[tokio::test]
async fn test_deploy_twice_fails() {
    let broker = broker_with_queue("orders");
    let manager = manager(&broker);

    manager.deploy(&orders_bridge()).await.unwrap();
    let err = manager.deploy(&orders_bridge()).await.unwrap_err();
    assert_eq!(err, BridgeError::DeploymentFailed("orders-bridge".to_string()));
}

#[tokio::test]
async fn test_deploy_error_wins_over_release_error() {
    let broker = broker_with_queue("orders");
    broker.refuse_bridge_deployments(true);
    broker.fail_pending_io(Some("disk full"));

    let err = manager(&broker).deploy(&orders_bridge()).await.unwrap_err();
    assert_eq!(err, BridgeError::DeploymentFailed("orders-bridge".to_string()));
}

#[tokio::test]
async fn test_release_error_surfaces_after_successful_deploy() {
    let broker = broker_with_queue("orders");
    broker.fail_pending_io(Some("disk full"));

    let err = manager(&broker).deploy(&orders_bridge()).await.unwrap_err();
    assert_eq!(
        err,
        BridgeError::Broker(BrokerError::Io("disk full".to_string()))
    );
    assert_eq!(broker.journal().last(), Some(&BrokerCall::ClearPendingIo));
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let broker = broker_with_queue("orders");
    let manager = manager(&broker);
    manager.deploy(&orders_bridge()).await.unwrap();
    broker.clear_journal();

    assert!(manager.remove("orders-bridge").await.unwrap());
    assert!(!manager.remove("orders-bridge").await.unwrap());

    assert_eq!(
        &broker.journal()[..5],
        &[
            BrokerCall::IsStarted,
            BrokerCall::ClearPendingIo,
            BrokerCall::DestroyBridge {
                name: "orders-bridge".to_string(),
                force: false,
            },
            BrokerCall::WaitOnPendingIo,
            BrokerCall::ClearPendingIo,
        ]
    );
}

#[tokio::test]
async fn test_remove_requires_started_broker() {
    let broker = broker_with_queue("orders");
    broker.set_started(false);
    let err = manager(&broker).remove("orders-bridge").await.unwrap_err();
    assert_eq!(err, BridgeError::BrokerNotStarted);
}

#[tokio::test]
async fn test_redeploy_replaces_spec() {
    let broker = broker_with_queue("orders");
    let manager = manager(&broker);
    manager.deploy(&orders_bridge()).await.unwrap();

    let updated = BridgeConfig {
        filter: Some("AMQPriority > 4".to_string()),
        ..orders_bridge()
    };
    manager.redeploy(&updated).await.unwrap();

    let deployed = broker.bridge("orders-bridge").unwrap();
    assert_eq!(deployed.filter.as_deref(), Some("AMQPriority > 4"));
}

#[tokio::test]
async fn test_redeploy_invalid_config_keeps_running_bridge() {
    let broker = broker_with_queue("orders");
    let manager = manager(&broker);
    manager.deploy(&orders_bridge()).await.unwrap();

    let invalid = BridgeConfig {
        retry_interval: -1,
        ..orders_bridge()
    };
    assert!(manager.redeploy(&invalid).await.is_err());
    assert_eq!(broker.bridge_names(), vec!["orders-bridge".to_string()]);
}

#[tokio::test]
async fn test_deploy_all_skips_disabled_and_continues_on_failure() {
    let broker = broker_with_queue("orders");
    let configs = vec![
        orders_bridge(),
        BridgeConfig {
            enabled: false,
            ..BridgeConfig::with_static_connectors("disabled", "orders", &["remote"])
        },
        BridgeConfig::with_static_connectors("missing-queue", "nope", &["remote"]),
        BridgeConfig::with_discovery_group("by-group", "orders", "dg"),
    ];

    let outcomes = manager(&broker).deploy_all(&configs).await;
    let summary: Vec<_> = outcomes
        .iter()
        .map(|(name, r)| (name.as_str(), r.is_ok()))
        .collect();

    assert_eq!(
        summary,
        vec![
            ("orders-bridge", true),
            ("missing-queue", false),
            ("by-group", true),
        ]
    );
    assert_eq!(
        broker.bridge_names(),
        vec!["by-group".to_string(), "orders-bridge".to_string()]
    );
}
