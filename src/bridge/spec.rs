//! Resolved Bridge Specification
//!
//! [`resolve_bridge_spec`] turns a declarative [`BridgeConfig`] plus the
//! override table into an immutable [`BridgeSpec`]. Every structural rule is
//! checked here, before anything reaches the broker.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::error::BridgeError;
use crate::config::{BridgeConfig, BridgeOverrides, CredentialReference};

/// Routing type applied to messages a bridge forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoutingType {
    /// Force anycast on the remote address
    Anycast,
    /// Force multicast on the remote address
    Multicast,
    /// Keep the routing type the message already carries
    #[default]
    Pass,
    /// Remove the routing type and let the remote address decide
    Strip,
}

impl fmt::Display for RoutingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingType::Anycast => write!(f, "ANYCAST"),
            RoutingType::Multicast => write!(f, "MULTICAST"),
            RoutingType::Pass => write!(f, "PASS"),
            RoutingType::Strip => write!(f, "STRIP"),
        }
    }
}

impl FromStr for RoutingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ANYCAST" => Ok(RoutingType::Anycast),
            "MULTICAST" => Ok(RoutingType::Multicast),
            "PASS" => Ok(RoutingType::Pass),
            "STRIP" => Ok(RoutingType::Strip),
            _ => Err(format!("unknown routing type '{}'", s)),
        }
    }
}

/// How the bridge locates the remote side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorSource {
    DiscoveryGroup(String),
    Static(Vec<String>),
}

/// Upper bound on connection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptLimit {
    Unlimited,
    Limited(u32),
}

impl AttemptLimit {
    /// Convert the configured value; -1 means unlimited
    pub fn from_config(value: i64) -> Option<Self> {
        match value {
            -1 => Some(AttemptLimit::Unlimited),
            n => u32::try_from(n).ok().map(AttemptLimit::Limited),
        }
    }

    /// The value as written in configuration
    pub fn as_config(&self) -> i64 {
        match self {
            AttemptLimit::Unlimited => -1,
            AttemptLimit::Limited(n) => *n as i64,
        }
    }

    /// Whether attempt number `attempt` (zero-based) is still allowed
    pub fn permits(&self, attempt: u32) -> bool {
        match self {
            AttemptLimit::Unlimited => true,
            AttemptLimit::Limited(n) => attempt < *n,
        }
    }
}

impl Serialize for AttemptLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_config())
    }
}

/// Retry and reconnect policy handed to the broker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryPolicy {
    #[serde(serialize_with = "millis")]
    pub retry_interval: Duration,
    pub retry_interval_multiplier: f64,
    #[serde(serialize_with = "millis")]
    pub max_retry_interval: Duration,
    pub initial_connect_attempts: AttemptLimit,
    pub reconnect_attempts: AttemptLimit,
    pub reconnect_attempts_on_same_node: AttemptLimit,
}

impl RetryPolicy {
    /// Delay the broker waits before attempt `attempt` (zero-based).
    ///
    /// The first retry waits `retry_interval`; each later one multiplies the
    /// previous delay, capped at `max_retry_interval`.
    pub fn interval_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.retry_interval;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.retry_interval.as_secs_f64() * self.retry_interval_multiplier.powi(exponent);
        let ceiling = self.max_retry_interval.as_secs_f64();
        if !scaled.is_finite() || scaled >= ceiling {
            self.max_retry_interval
        } else {
            Duration::from_secs_f64(scaled)
        }
    }
}

/// Where the bridge password comes from
#[derive(Clone, PartialEq, Eq)]
pub enum PasswordSource {
    Clear(String),
    Reference(CredentialReference),
}

impl fmt::Debug for PasswordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordSource::Clear(_) => write!(f, "Clear(***)"),
            PasswordSource::Reference(r) => f
                .debug_struct("Reference")
                .field("store", &r.store)
                .field("alias", &r.alias)
                .finish(),
        }
    }
}

impl Serialize for PasswordSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        match self {
            PasswordSource::Clear(_) => serializer.serialize_str("***"),
            PasswordSource::Reference(r) => {
                let mut s = serializer.serialize_struct("CredentialReference", 2)?;
                s.serialize_field("store", &r.store)?;
                s.serialize_field("alias", &r.alias)?;
                s.end()
            }
        }
    }
}

/// Credentials for the remote connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeCredentials {
    pub user: Option<String>,
    pub password: Option<PasswordSource>,
}

/// A validated, immutable bridge definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeSpec {
    pub name: String,
    pub queue_name: String,
    pub forwarding_address: Option<String>,
    pub filter: Option<String>,
    pub transformer_class_name: Option<String>,
    pub connectors: ConnectorSource,
    pub retry: RetryPolicy,
    pub min_large_message_size: u32,
    #[serde(serialize_with = "optional_millis")]
    pub check_period: Option<Duration>,
    #[serde(serialize_with = "optional_millis")]
    pub connection_ttl: Option<Duration>,
    pub use_duplicate_detection: bool,
    /// `None` when disabled
    pub confirmation_window_size: Option<u32>,
    /// `None` when producer flow control is disabled
    pub producer_window_size: Option<u32>,
    pub ha: bool,
    pub credentials: Option<BridgeCredentials>,
    #[serde(serialize_with = "millis")]
    pub call_timeout: Duration,
    pub routing_type: RoutingType,
}

fn millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(d.as_millis() as u64)
}

fn optional_millis<S: Serializer>(d: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => serializer.serialize_u64(d.as_millis() as u64),
        None => serializer.serialize_i64(-1),
    }
}

fn non_negative_millis(field: &str, value: i64) -> Result<Duration, String> {
    u64::try_from(value)
        .map(Duration::from_millis)
        .map_err(|_| format!("{} must not be negative (got {})", field, value))
}

/// -1 disables, anything else must be non-negative
fn disabled_or_millis(field: &str, value: i64) -> Result<Option<Duration>, String> {
    match value {
        -1 => Ok(None),
        v => non_negative_millis(field, v).map(Some),
    }
}

fn disabled_or_size(field: &str, value: i64) -> Result<Option<u32>, String> {
    match value {
        -1 => Ok(None),
        v => u32::try_from(v)
            .map(Some)
            .map_err(|_| format!("{} must be -1 or between 0 and {} (got {})", field, u32::MAX, v)),
    }
}

fn attempt_limit(field: &str, value: i64) -> Result<AttemptLimit, String> {
    AttemptLimit::from_config(value)
        .ok_or_else(|| format!("{} must be -1 or a non-negative count (got {})", field, value))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn connector_source(config: &BridgeConfig) -> Result<ConnectorSource, String> {
    let discovery = non_empty(&config.discovery_group);
    let connectors = config
        .static_connectors
        .as_ref()
        .filter(|list| !list.is_empty());

    match (discovery, connectors) {
        (Some(group), None) => Ok(ConnectorSource::DiscoveryGroup(group.to_string())),
        (None, Some(list)) => {
            if list.iter().any(|c| c.trim().is_empty()) {
                return Err("static_connectors must not contain empty names".to_string());
            }
            Ok(ConnectorSource::Static(list.clone()))
        }
        (Some(_), Some(_)) => {
            Err("discovery_group and static_connectors are mutually exclusive".to_string())
        }
        (None, None) => Err("one of discovery_group or static_connectors is required".to_string()),
    }
}

fn credentials(config: &BridgeConfig) -> Result<Option<BridgeCredentials>, String> {
    let password = match (&config.password, &config.credential_reference) {
        (Some(_), Some(_)) => {
            return Err("password and credential_reference are mutually exclusive".to_string())
        }
        (Some(p), None) => Some(PasswordSource::Clear(p.clone())),
        (None, Some(r)) => Some(PasswordSource::Reference(r.clone())),
        (None, None) => None,
    };

    if config.user.is_none() && password.is_none() {
        return Ok(None);
    }
    Ok(Some(BridgeCredentials {
        user: config.user.clone(),
        password,
    }))
}

fn build(config: &BridgeConfig, overrides: &BridgeOverrides) -> Result<BridgeSpec, String> {
    if config.name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }
    if config.queue_name.trim().is_empty() {
        return Err("queue_name must not be empty".to_string());
    }

    let connectors = connector_source(config)?;

    let routing_type = overrides
        .routing_type_for(&config.name)
        .unwrap_or(&config.routing_type)
        .parse::<RoutingType>()?;

    let call_timeout = non_negative_millis(
        "call_timeout",
        overrides
            .call_timeout_for(&config.name)
            .unwrap_or(config.call_timeout),
    )?;

    let multiplier = config.retry_interval_multiplier;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(format!(
            "retry_interval_multiplier must be a non-negative number (got {})",
            multiplier
        ));
    }

    let retry = RetryPolicy {
        retry_interval: non_negative_millis("retry_interval", config.retry_interval)?,
        retry_interval_multiplier: multiplier,
        max_retry_interval: non_negative_millis("max_retry_interval", config.max_retry_interval)?,
        initial_connect_attempts: attempt_limit(
            "initial_connect_attempts",
            config.initial_connect_attempts,
        )?,
        reconnect_attempts: attempt_limit("reconnect_attempts", config.reconnect_attempts)?,
        reconnect_attempts_on_same_node: attempt_limit(
            "reconnect_attempts_on_same_node",
            config.reconnect_attempts_on_same_node,
        )?,
    };

    let min_large_message_size = u32::try_from(config.min_large_message_size).map_err(|_| {
        format!(
            "min_large_message_size must not be negative (got {})",
            config.min_large_message_size
        )
    })?;

    Ok(BridgeSpec {
        name: config.name.clone(),
        queue_name: config.queue_name.clone(),
        forwarding_address: config.forwarding_address.clone(),
        filter: non_empty(&config.filter).map(str::to_string),
        transformer_class_name: non_empty(&config.transformer_class_name).map(str::to_string),
        connectors,
        retry,
        min_large_message_size,
        check_period: disabled_or_millis("check_period", config.check_period)?,
        connection_ttl: disabled_or_millis("connection_ttl", config.connection_ttl)?,
        use_duplicate_detection: config.use_duplicate_detection,
        confirmation_window_size: disabled_or_size(
            "confirmation_window_size",
            config.confirmation_window_size,
        )?,
        producer_window_size: disabled_or_size("producer_window_size", config.producer_window_size)?,
        ha: config.ha,
        credentials: credentials(config)?,
        call_timeout,
        routing_type,
    })
}

/// Resolve a declarative bridge against the override table.
///
/// Pure: reads nothing but its arguments.
pub fn resolve_bridge_spec(
    config: &BridgeConfig,
    overrides: &BridgeOverrides,
) -> Result<BridgeSpec, BridgeError> {
    build(config, overrides).map_err(|reason| BridgeError::Configuration {
        bridge: config.name.clone(),
        reason,
    })
}
