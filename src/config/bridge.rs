//! Bridge Configuration
//!
//! Declarative bridge definitions as they appear in the configuration file,
//! and the override table that can replace a few attributes per bridge.
//!
//! Durations are milliseconds. Numeric fields are signed so that bad values
//! reach validation and are reported with the bridge name; `-1` means
//! "unlimited" or "disabled" where the broker allows it.

use std::collections::HashMap;

use serde::Deserialize;

/// Reference to a password held in a credential store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialReference {
    /// Credential store name
    pub store: String,
    /// Alias of the entry within the store
    pub alias: String,
}

/// Configuration for a single bridge
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Unique name for this bridge
    pub name: String,

    /// Local queue the bridge consumes from
    pub queue_name: String,

    /// Address on the remote side (defaults to the message's original address)
    #[serde(default)]
    pub forwarding_address: Option<String>,

    /// Only messages matching this filter are forwarded
    #[serde(default)]
    pub filter: Option<String>,

    /// Transformer applied to messages before forwarding
    #[serde(default)]
    pub transformer_class_name: Option<String>,

    /// Discovery group used to locate the remote side
    #[serde(default)]
    pub discovery_group: Option<String>,

    /// Connectors for the remote side (exclusive with `discovery_group`)
    #[serde(default)]
    pub static_connectors: Option<Vec<String>>,

    /// Messages larger than this are sent as large messages (bytes)
    #[serde(default = "default_min_large_message_size")]
    pub min_large_message_size: i64,

    /// Connection failure check period (ms, -1 disables)
    #[serde(default = "default_check_period")]
    pub check_period: i64,

    /// Connection time-to-live (ms, -1 disables)
    #[serde(default = "default_connection_ttl")]
    pub connection_ttl: i64,

    /// Delay before the first retry (ms)
    #[serde(default = "default_retry_interval")]
    pub retry_interval: i64,

    /// Factor applied to the retry interval after each attempt
    #[serde(default = "default_retry_interval_multiplier")]
    pub retry_interval_multiplier: f64,

    /// Ceiling for the retry interval (ms)
    #[serde(default = "default_max_retry_interval")]
    pub max_retry_interval: i64,

    /// Attempts before the bridge gives up at startup (-1 = unlimited)
    #[serde(default = "default_unlimited")]
    pub initial_connect_attempts: i64,

    /// Attempts after an established link drops (-1 = unlimited)
    #[serde(default = "default_unlimited")]
    pub reconnect_attempts: i64,

    /// Attempts on the same node before trying others (-1 = unlimited)
    #[serde(default = "default_reconnect_attempts_on_same_node")]
    pub reconnect_attempts_on_same_node: i64,

    /// Tag forwarded messages so the remote side can drop duplicates
    #[serde(default = "default_true")]
    pub use_duplicate_detection: bool,

    /// Bytes sent before the remote side must confirm (-1 disables)
    #[serde(default = "default_confirmation_window_size")]
    pub confirmation_window_size: i64,

    /// Producer flow control window in bytes (-1 disables)
    #[serde(default = "default_producer_window_size")]
    pub producer_window_size: i64,

    /// Whether the bridge supports high-availability failover
    #[serde(default)]
    pub ha: bool,

    /// User for the remote connection
    #[serde(default)]
    pub user: Option<String>,

    /// Password for the remote connection
    #[serde(default)]
    pub password: Option<String>,

    /// Password held in a credential store (exclusive with `password`)
    #[serde(default)]
    pub credential_reference: Option<CredentialReference>,

    /// Blocking call timeout (ms)
    #[serde(default = "default_call_timeout")]
    pub call_timeout: i64,

    /// Routing type applied to forwarded messages:
    /// ANYCAST, MULTICAST, PASS or STRIP
    #[serde(default = "default_routing_type")]
    pub routing_type: String,

    /// Whether this bridge is deployed by `deploy_all`
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_min_large_message_size() -> i64 {
    100 * 1024
}

fn default_check_period() -> i64 {
    30_000
}

fn default_connection_ttl() -> i64 {
    60_000
}

fn default_retry_interval() -> i64 {
    2_000
}

fn default_retry_interval_multiplier() -> f64 {
    1.0
}

fn default_max_retry_interval() -> i64 {
    2_000
}

fn default_unlimited() -> i64 {
    -1
}

fn default_reconnect_attempts_on_same_node() -> i64 {
    10
}

fn default_confirmation_window_size() -> i64 {
    10 * 1024 * 1024
}

fn default_producer_window_size() -> i64 {
    1024 * 1024
}

fn default_call_timeout() -> i64 {
    30_000
}

fn default_routing_type() -> String {
    "PASS".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            queue_name: String::new(),
            forwarding_address: None,
            filter: None,
            transformer_class_name: None,
            discovery_group: None,
            static_connectors: None,
            min_large_message_size: default_min_large_message_size(),
            check_period: default_check_period(),
            connection_ttl: default_connection_ttl(),
            retry_interval: default_retry_interval(),
            retry_interval_multiplier: default_retry_interval_multiplier(),
            max_retry_interval: default_max_retry_interval(),
            initial_connect_attempts: default_unlimited(),
            reconnect_attempts: default_unlimited(),
            reconnect_attempts_on_same_node: default_reconnect_attempts_on_same_node(),
            use_duplicate_detection: true,
            confirmation_window_size: default_confirmation_window_size(),
            producer_window_size: default_producer_window_size(),
            ha: false,
            user: None,
            password: None,
            credential_reference: None,
            call_timeout: default_call_timeout(),
            routing_type: default_routing_type(),
            enabled: true,
        }
    }
}

impl BridgeConfig {
    /// Bridge from `queue_name` to a set of static connectors, all other
    /// attributes at their defaults
    pub fn with_static_connectors(name: &str, queue_name: &str, connectors: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            queue_name: queue_name.to_string(),
            static_connectors: Some(connectors.iter().map(|c| c.to_string()).collect()),
            ..Default::default()
        }
    }

    /// Bridge from `queue_name` located through a discovery group
    pub fn with_discovery_group(name: &str, queue_name: &str, group: &str) -> Self {
        Self {
            name: name.to_string(),
            queue_name: queue_name.to_string(),
            discovery_group: Some(group.to_string()),
            ..Default::default()
        }
    }
}

/// Per-bridge attribute overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeOverride {
    /// Replaces the declared `call_timeout` (ms)
    pub call_timeout: Option<i64>,
    /// Replaces the declared `routing_type`
    pub routing_type: Option<String>,
}

/// Overrides consulted before the declared bridge attributes.
///
/// Precedence: per-bridge entry, then the global `call_timeout`, then the
/// value declared on the bridge itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeOverrides {
    /// Call timeout applied to every bridge without its own override (ms)
    pub call_timeout: Option<i64>,
    /// Overrides keyed by bridge name
    pub bridges: HashMap<String, BridgeOverride>,
}

impl BridgeOverrides {
    pub fn call_timeout_for(&self, bridge: &str) -> Option<i64> {
        self.bridges
            .get(bridge)
            .and_then(|o| o.call_timeout)
            .or(self.call_timeout)
    }

    pub fn routing_type_for(&self, bridge: &str) -> Option<&str> {
        self.bridges
            .get(bridge)
            .and_then(|o| o.routing_type.as_deref())
    }

    /// Set a call timeout override for one bridge
    pub fn with_call_timeout(mut self, bridge: &str, call_timeout: i64) -> Self {
        self.bridges
            .entry(bridge.to_string())
            .or_default()
            .call_timeout = Some(call_timeout);
        self
    }

    /// Set a routing type override for one bridge
    pub fn with_routing_type(mut self, bridge: &str, routing_type: &str) -> Self {
        self.bridges
            .entry(bridge.to_string())
            .or_default()
            .routing_type = Some(routing_type.to_string());
        self
    }
}
