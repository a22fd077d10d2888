//! Broker Control Surface
//!
//! Traits for the embedded broker that the management layer drives. The
//! broker owns routing, storage, delivery and bridge scheduling; this crate
//! only issues control calls through these handles and interprets the
//! results.
//!
//! [`InMemoryBroker`] implements every trait with in-process state and is
//! what the test suites run against.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::bridge::BridgeSpec;

mod filter;
mod memory;

pub use filter::Filter;
pub use memory::{BrokerCall, InMemoryBroker, PauseState, QueueOptions};

/// Error type for broker control operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The named resource does not exist
    NotFound(String),
    /// A resource with this name already exists
    AlreadyExists(String),
    /// The resource is in use and cannot be removed without force
    InUse(String),
    /// A filter expression could not be parsed
    InvalidFilter(String),
    /// Waiting on storage operations failed
    Io(String),
    /// Other error
    Other(String),
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::NotFound(name) => write!(f, "Not found: {}", name),
            BrokerError::AlreadyExists(name) => write!(f, "Already exists: {}", name),
            BrokerError::InUse(name) => write!(f, "In use: {}", name),
            BrokerError::InvalidFilter(msg) => write!(f, "Invalid filter: {}", msg),
            BrokerError::Io(msg) => write!(f, "IO error: {}", msg),
            BrokerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BrokerError {}

/// Routing type of a queue as reported by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueRoutingType {
    /// Point-to-point: each message goes to one queue
    Anycast,
    /// Publish-subscribe: each message goes to every queue on the address
    Multicast,
}

impl fmt::Display for QueueRoutingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueRoutingType::Anycast => write!(f, "ANYCAST"),
            QueueRoutingType::Multicast => write!(f, "MULTICAST"),
        }
    }
}

/// A message as held by the broker
#[derive(Debug, Clone, PartialEq)]
pub struct CoreMessage {
    /// Broker-assigned identifier (0 until sent)
    pub message_id: u64,
    /// Client-assigned identifier
    pub user_id: Option<String>,
    pub durable: bool,
    /// 0 (lowest) to 9 (highest)
    pub priority: u8,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    /// Milliseconds since the epoch, 0 = never expires
    pub expiration: i64,
    pub group_id: Option<String>,
    pub properties: BTreeMap<String, serde_json::Value>,
    pub body: Bytes,
}

impl CoreMessage {
    /// Create a durable message with default priority
    pub fn new(body: impl Into<Bytes>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        Self {
            message_id: 0,
            user_id: None,
            durable: true,
            priority: 4,
            timestamp,
            expiration: 0,
            group_id: None,
            properties: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(9);
        self
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn non_durable(mut self) -> Self {
        self.durable = false;
        self
    }

    /// Read a string property
    pub fn string_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

/// A consumer attached to a queue, as reported in the queue's consumer JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerInfo {
    #[serde(rename = "consumerID", default)]
    pub consumer_id: String,
    #[serde(rename = "connectionID", default)]
    pub connection_id: String,
    #[serde(rename = "sessionID", default)]
    pub session_id: String,
    #[serde(rename = "browseOnly", default)]
    pub browse_only: bool,
    #[serde(rename = "creationTime", default)]
    pub creation_time: i64,
}

/// Control surface of a single queue
#[async_trait]
pub trait QueueControl: Send + Sync {
    /// Queue name
    fn name(&self) -> &str;

    fn is_durable(&self) -> bool;

    fn routing_type(&self) -> QueueRoutingType;

    /// Filter the queue was created with (native syntax)
    fn filter(&self) -> Option<String>;

    /// Number of messages currently in the queue
    fn message_count(&self) -> Result<u64, BrokerError>;

    /// Number of messages delivered to consumers but not yet acknowledged
    fn delivering_count(&self) -> Result<u64, BrokerError>;

    /// Consumers as a JSON array
    fn consumers_as_json(&self) -> Result<String, BrokerError>;

    /// Count messages matching a native filter (`None` = all)
    async fn count_messages(&self, filter: Option<&str>) -> Result<u64, BrokerError>;

    /// Remove messages matching a native filter (`None` = all), returning the count
    async fn remove_messages(&self, filter: Option<&str>) -> Result<u64, BrokerError>;

    /// List messages matching a native filter (`None` = all)
    async fn list_messages(&self, filter: Option<&str>) -> Result<Vec<CoreMessage>, BrokerError>;
}

/// Control surface of an address
pub trait AddressControl: Send + Sync {
    /// Address name
    fn address(&self) -> &str;

    /// Names of every queue bound to the address, placeholder included
    fn queue_names(&self) -> Vec<String>;

    /// The queue kept bound to this address only to keep the address alive.
    ///
    /// The broker tracks this by identity; callers must not guess it from
    /// queue names.
    fn placeholder_queue(&self) -> Option<String>;
}

/// Handle on a running broker
///
/// Supplied by the host. Implementations must be safe to share across
/// concurrent management calls.
#[async_trait]
pub trait BrokerHandle: Send + Sync {
    /// Whether the broker has finished starting
    fn is_started(&self) -> bool;

    /// Reset the storage operation context of the calling task.
    ///
    /// A no-op when the broker has no storage (e.g. a passive backup).
    fn clear_pending_io(&self);

    /// Block until storage operations issued in the current context complete.
    ///
    /// A no-op when storage is absent or not started.
    fn wait_on_pending_io(&self) -> Result<(), BrokerError>;

    /// Deploy a bridge. `Ok(false)` means the broker refused it.
    async fn deploy_bridge(&self, spec: &BridgeSpec) -> Result<bool, BrokerError>;

    /// Destroy a bridge. `force` drops in-flight messages instead of draining.
    async fn destroy_bridge(&self, name: &str, force: bool) -> Result<(), BrokerError>;

    /// Destroy a queue and its messages.
    ///
    /// Without `remove_consumers` the call fails with [`BrokerError::InUse`]
    /// while consumers are attached.
    async fn destroy_queue(&self, name: &str, remove_consumers: bool) -> Result<(), BrokerError>;

    /// Names of queues bound to an address, in broker order
    fn list_queue_names_under_address(&self, address: &str) -> Result<Vec<String>, BrokerError>;

    fn queue_control(&self, queue_name: &str) -> Option<Arc<dyn QueueControl>>;

    fn address_control(&self, address: &str) -> Option<Arc<dyn AddressControl>>;

    /// Stop delivery on an address. `persist` keeps it paused across restarts.
    async fn pause_address(&self, address: &str, persist: bool) -> Result<(), BrokerError>;

    async fn resume_address(&self, address: &str) -> Result<(), BrokerError>;
}
