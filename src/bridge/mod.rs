//! Core Bridge Module
//!
//! Turns declarative bridge definitions into forwarding links deployed inside
//! the broker. The broker owns connection management and retry scheduling;
//! this module validates the definition, applies overrides, enforces the
//! broker preconditions and scopes the storage I/O of each deployment.
//!
//! # Example Configuration
//!
//! ```toml
//! [[bridge]]
//! name = "orders-to-dc2"
//! queue_name = "orders"
//! forwarding_address = "dc2.orders"
//! static_connectors = ["dc2-connector"]
//! retry_interval = 1000
//! retry_interval_multiplier = 2.0
//! max_retry_interval = 30000
//! reconnect_attempts = -1
//!
//! [bridge_overrides.bridges.orders-to-dc2]
//! routing_type = "ANYCAST"
//! ```

mod error;
mod io_scope;
mod manager;
mod spec;

#[cfg(test)]
mod tests;

pub use error::BridgeError;
pub use manager::{BridgeManager, DeployOutcome};
pub use spec::{
    resolve_bridge_spec, AttemptLimit, BridgeCredentials, BridgeSpec, ConnectorSource,
    PasswordSource, RetryPolicy, RoutingType,
};

// Re-export config types from the config module for convenience
pub use crate::config::{BridgeConfig, BridgeOverride, BridgeOverrides, CredentialReference};
