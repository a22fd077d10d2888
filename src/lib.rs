//! VibeMQ Management - bridge lifecycle and topic subscription administration
//!
//! The management layer a host uses to operate an embedded broker:
//! declarative bridges are validated, resolved against overrides and
//! deployed inside a scoped storage I/O context, and topic subscriptions are
//! listed, counted, filtered and dropped through the broker's queue and
//! address controls.
//!
//! The broker itself is reached only through the traits in [`broker`].

pub mod bridge;
pub mod broker;
pub mod config;
pub mod subscription;

pub use bridge::{BridgeError, BridgeManager, BridgeSpec};
pub use broker::{BrokerError, BrokerHandle, InMemoryBroker};
pub use config::Config;
pub use subscription::{AdminError, SubscriptionAdmin, TopicOperation};
