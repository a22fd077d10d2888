//! Subscription and message views
//!
//! Computed per request from the broker's queue controls. The serialized
//! field names are part of the management interface and must not change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::naming::{decompose_durable, NamingError};
use crate::broker::{ConsumerInfo, CoreMessage, QueueControl, QueueRoutingType};

/// Client id and subscription name reported for non-durable multicast queues
pub const NON_DURABLE_SENTINEL: &str = "ActiveMQ";

/// Which subscriptions to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DurabilityType {
    #[default]
    All,
    Durable,
    NonDurable,
}

impl DurabilityType {
    pub fn includes(&self, durable: bool) -> bool {
        match self {
            DurabilityType::All => true,
            DurabilityType::Durable => durable,
            DurabilityType::NonDurable => !durable,
        }
    }
}

/// Snapshot of one subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    #[serde(rename = "queueName")]
    pub queue_name: String,
    pub durable: bool,
    #[serde(rename = "messageCount")]
    pub message_count: u64,
    #[serde(rename = "deliveringCount")]
    pub delivering_count: u64,
    pub consumers: Vec<ConsumerInfo>,
    #[serde(rename = "clientID")]
    pub client_id: Option<String>,
    pub selector: Option<String>,
    pub name: Option<String>,
}

/// Client id and subscription name for a queue, by durability and routing
pub fn subscription_identity(
    queue_name: &str,
    durable: bool,
    routing_type: QueueRoutingType,
) -> Result<(Option<String>, Option<String>), NamingError> {
    match (durable, routing_type) {
        (true, QueueRoutingType::Multicast) => {
            let (client_id, name) = decompose_durable(queue_name)?;
            Ok((client_id, Some(name)))
        }
        // Hierarchical topic queues do not follow the naming convention
        (false, QueueRoutingType::Multicast) => Ok((
            Some(NON_DURABLE_SENTINEL.to_string()),
            Some(NON_DURABLE_SENTINEL.to_string()),
        )),
        (_, QueueRoutingType::Anycast) => Ok((None, None)),
    }
}

impl SubscriptionInfo {
    /// Build the view from a queue control.
    ///
    /// Errors are returned as text; the caller reports them as a listing
    /// failure for the whole address.
    pub fn from_queue(queue: &dyn QueueControl) -> Result<Self, String> {
        let (client_id, name) =
            subscription_identity(queue.name(), queue.is_durable(), queue.routing_type())
                .map_err(|e| e.to_string())?;

        let consumers_json = queue.consumers_as_json().map_err(|e| e.to_string())?;
        let consumers: Vec<ConsumerInfo> = serde_json::from_str(&consumers_json).map_err(|e| {
            format!(
                "Malformed consumer list for queue '{}': {}",
                queue.name(),
                e
            )
        })?;

        Ok(Self {
            queue_name: queue.name().to_string(),
            durable: queue.is_durable(),
            message_count: queue.message_count().map_err(|e| e.to_string())?,
            delivering_count: queue.delivering_count().map_err(|e| e.to_string())?,
            consumers,
            client_id,
            selector: queue.filter(),
            name,
        })
    }
}

/// Delivery mode as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMode {
    Persistent,
    NonPersistent,
}

/// A queued message with client-facing header names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    #[serde(rename = "JMSMessageID")]
    pub jms_message_id: Option<String>,
    #[serde(rename = "JMSPriority")]
    pub priority: u8,
    #[serde(rename = "JMSTimestamp")]
    pub timestamp: i64,
    #[serde(rename = "JMSExpiration")]
    pub expiration: i64,
    #[serde(rename = "JMSDeliveryMode")]
    pub delivery_mode: DeliveryMode,
    #[serde(rename = "messageID")]
    pub message_id: u64,
    #[serde(flatten)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl From<&CoreMessage> for MessageView {
    fn from(message: &CoreMessage) -> Self {
        Self {
            jms_message_id: message.user_id.clone(),
            priority: message.priority,
            timestamp: message.timestamp,
            expiration: message.expiration,
            delivery_mode: if message.durable {
                DeliveryMode::Persistent
            } else {
                DeliveryMode::NonPersistent
            },
            message_id: message.message_id,
            properties: message.properties.clone(),
        }
    }
}

/// Aggregate counters for a topic address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TopicStatistics {
    pub subscription_count: u64,
    pub durable_subscription_count: u64,
    pub non_durable_subscription_count: u64,
    pub message_count: u64,
    pub durable_message_count: u64,
    pub non_durable_message_count: u64,
    pub delivering_count: u64,
}

impl TopicStatistics {
    pub(crate) fn record(&mut self, info: &SubscriptionInfo) {
        self.subscription_count += 1;
        self.message_count += info.message_count;
        self.delivering_count += info.delivering_count;
        if info.durable {
            self.durable_subscription_count += 1;
            self.durable_message_count += info.message_count;
        } else {
            self.non_durable_subscription_count += 1;
            self.non_durable_message_count += info.message_count;
        }
    }
}
