//! Topic Subscription Administration
//!
//! Lists, counts, filters and drops the subscriptions of a topic address.
//! A subscription is a queue bound to the topic's multicast address; the
//! queue's name encodes the client id and subscription name (see
//! [`naming`]). Every topic also carries a placeholder queue that only keeps
//! the address alive; it is never reported or dropped.
//!
//! All state lives in the broker. Each call reads the current queue controls
//! and holds nothing between calls.

mod error;
mod info;
pub mod naming;
mod operation;
pub mod selector;


use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::broker::{AddressControl, BrokerError, BrokerHandle, QueueControl};

pub use error::AdminError;
pub use info::{
    subscription_identity, DeliveryMode, DurabilityType, MessageView, SubscriptionInfo,
    TopicStatistics, NON_DURABLE_SENTINEL,
};
pub use naming::NamingError;
pub use operation::{OperationResult, TopicOperation};
pub use selector::{to_core_filter, SelectorError};

/// Address prefix of topics
pub const TOPIC_ADDRESS_PREFIX: &str = "jms.topic.";

/// Address of a topic, adding the topic prefix when it is missing
pub fn topic_address(topic: &str) -> String {
    if topic.starts_with(TOPIC_ADDRESS_PREFIX) {
        topic.to_string()
    } else {
        format!("{}{}", TOPIC_ADDRESS_PREFIX, topic)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

/// Subscription administration for topic addresses
pub struct SubscriptionAdmin {
    broker: Arc<dyn BrokerHandle>,
}

impl SubscriptionAdmin {
    pub fn new(broker: Arc<dyn BrokerHandle>) -> Self {
        Self { broker }
    }

    fn address_control(&self, address: &str) -> Result<Arc<dyn AddressControl>, AdminError> {
        self.broker
            .address_control(address)
            .ok_or_else(|| AdminError::AddressNotFound(address.to_string()))
    }

    /// Queue controls of the subscriptions under an address, in broker order
    fn subscription_queues(
        &self,
        durability: DurabilityType,
        address: &str,
    ) -> Result<Vec<Arc<dyn QueueControl>>, AdminError> {
        let control = self.address_control(address)?;
        let placeholder = control.placeholder_queue();
        let names = self
            .broker
            .list_queue_names_under_address(address)
            .map_err(|e| AdminError::Listing {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let queues = names
            .iter()
            .filter(|name| placeholder.as_deref() != Some(name.as_str()))
            .filter_map(|name| {
                let queue = self.broker.queue_control(name);
                if queue.is_none() {
                    debug!("Subscriptions of {}: Queue '{}' vanished", address, name);
                }
                queue
            })
            .filter(|q| durability.includes(q.is_durable()))
            .collect();
        Ok(queues)
    }

    /// Snapshot the subscriptions of an address.
    ///
    /// Zero matches yield an empty list.
    pub fn list_subscriptions(
        &self,
        durability: DurabilityType,
        address: &str,
    ) -> Result<Vec<SubscriptionInfo>, AdminError> {
        let queues = self.subscription_queues(durability, address)?;
        let infos = queues
            .iter()
            .map(|q| SubscriptionInfo::from_queue(q.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| AdminError::Listing {
                address: address.to_string(),
                reason,
            })?;
        debug!(
            "Subscriptions of {}: Listed {} ({:?})",
            address,
            infos.len(),
            durability
        );
        Ok(infos)
    }

    /// [`Self::list_subscriptions`] as a JSON array
    pub fn list_subscriptions_json(
        &self,
        durability: DurabilityType,
        address: &str,
    ) -> Result<String, AdminError> {
        let infos = self.list_subscriptions(durability, address)?;
        to_json(&infos).map_err(|reason| AdminError::Listing {
            address: address.to_string(),
            reason,
        })
    }

    /// Messages queued for a subscription, bodies omitted
    pub async fn list_messages(&self, queue_name: &str) -> Result<Vec<MessageView>, AdminError> {
        let queue = self
            .broker
            .queue_control(queue_name)
            .ok_or_else(|| AdminError::NoSuchQueue(queue_name.to_string()))?;
        let messages = queue.list_messages(None).await?;
        Ok(messages.iter().map(MessageView::from).collect())
    }

    /// [`Self::list_messages`] as a JSON array
    pub async fn list_messages_json(&self, queue_name: &str) -> Result<String, AdminError> {
        let messages = self.list_messages(queue_name).await?;
        to_json(&messages).map_err(|e| AdminError::Broker(BrokerError::Other(e)))
    }

    fn durable_subscription_queue(
        &self,
        client_id: &str,
        subscription_name: &str,
    ) -> Result<(String, Arc<dyn QueueControl>), AdminError> {
        if client_id.is_empty() {
            return Err(AdminError::InvalidArgument(
                "client id must not be empty".to_string(),
            ));
        }
        if subscription_name.is_empty() {
            return Err(AdminError::InvalidArgument(
                "subscription name must not be empty".to_string(),
            ));
        }

        let queue_name = naming::durable_queue_name(Some(client_id), subscription_name);
        match self.broker.queue_control(&queue_name) {
            Some(queue) => Ok((queue_name, queue)),
            None => Err(AdminError::NoSuchSubscription {
                client_id: client_id.to_string(),
                subscription_name: subscription_name.to_string(),
                queue_name,
            }),
        }
    }

    /// Count the messages of a durable subscription matching a selector.
    ///
    /// A blank selector counts every message.
    pub async fn count_messages(
        &self,
        client_id: &str,
        subscription_name: &str,
        selector: Option<&str>,
    ) -> Result<u64, AdminError> {
        let (_, queue) = self.durable_subscription_queue(client_id, subscription_name)?;
        let filter = to_core_filter(selector)?;
        Ok(queue.count_messages(filter.as_deref()).await?)
    }

    /// Destroy a durable subscription, disconnecting its consumers
    pub async fn drop_durable_subscription(
        &self,
        client_id: &str,
        subscription_name: &str,
    ) -> Result<(), AdminError> {
        let (queue_name, _) = self.durable_subscription_queue(client_id, subscription_name)?;
        if let Err(e) = self.broker.destroy_queue(&queue_name, true).await {
            error!("Subscription '{}': Failed to drop: {}", queue_name, e);
            return Err(e.into());
        }
        info!("Subscription '{}': Dropped", queue_name);
        Ok(())
    }

    /// Destroy every subscription of an address, keeping the placeholder.
    ///
    /// Consumers are not force-removed; a queue with consumers fails the call.
    /// Returns the number of queues destroyed.
    pub async fn drop_all_subscriptions(&self, address: &str) -> Result<usize, AdminError> {
        let control = self.address_control(address)?;
        let placeholder = control.placeholder_queue();

        let mut dropped = 0;
        for queue in control.queue_names() {
            if placeholder.as_deref() == Some(queue.as_str()) {
                continue;
            }
            if let Err(e) = self.broker.destroy_queue(&queue, false).await {
                error!("Subscription '{}': Failed to drop: {}", queue, e);
                return Err(e.into());
            }
            dropped += 1;
        }
        info!("Subscriptions of {}: Dropped {}", address, dropped);
        Ok(dropped)
    }

    /// Remove matching messages from every queue of an address.
    ///
    /// Stops at the first failing queue and reports how many messages had
    /// been removed before it.
    pub async fn remove_messages(
        &self,
        selector: Option<&str>,
        address: &str,
    ) -> Result<u64, AdminError> {
        let filter = to_core_filter(selector)?;
        let control = self.address_control(address)?;

        let mut removed = 0;
        for name in control.queue_names() {
            let Some(queue) = self.broker.queue_control(&name) else {
                continue;
            };
            match queue.remove_messages(filter.as_deref()).await {
                Ok(count) => removed += count,
                Err(source) => {
                    error!(
                        "Subscriptions of {}: Removing messages failed on '{}' after {}: {}",
                        address, name, removed, source
                    );
                    return Err(AdminError::PartialRemoval {
                        queue: name,
                        removed,
                        source,
                    });
                }
            }
        }
        info!("Subscriptions of {}: Removed {} messages", address, removed);
        Ok(removed)
    }

    /// Stop delivery on an address
    pub async fn pause(&self, address: &str, persist: bool) -> Result<(), AdminError> {
        self.broker
            .pause_address(address, persist)
            .await
            .inspect_err(|e| warn!("Topic {}: Failed to pause: {}", address, e))?;
        info!("Topic {}: Paused (persist={})", address, persist);
        Ok(())
    }

    /// Resume delivery on an address. Resuming a running address succeeds.
    pub async fn resume(&self, address: &str) -> Result<(), AdminError> {
        self.broker
            .resume_address(address)
            .await
            .inspect_err(|e| warn!("Topic {}: Failed to resume: {}", address, e))?;
        info!("Topic {}: Resumed", address);
        Ok(())
    }

    /// Subscription and message counters for an address
    pub fn statistics(&self, address: &str) -> Result<TopicStatistics, AdminError> {
        let mut stats = TopicStatistics::default();
        for info in self.list_subscriptions(DurabilityType::All, address)? {
            stats.record(&info);
        }
        Ok(stats)
    }

    fn listing(
        &self,
        durability: DurabilityType,
        as_json: bool,
        address: &str,
    ) -> Result<OperationResult, AdminError> {
        if as_json {
            self.list_subscriptions_json(durability, address)
                .map(OperationResult::Json)
        } else {
            self.list_subscriptions(durability, address)
                .map(OperationResult::Subscriptions)
        }
    }

    /// Run a management operation against an address
    pub async fn execute(
        &self,
        address: &str,
        operation: TopicOperation,
    ) -> Result<OperationResult, AdminError> {
        if operation.is_read_only() {
            debug!("Topic {}: Executing {}", address, operation.name());
        } else {
            info!("Topic {}: Executing {}", address, operation.name());
        }

        match operation {
            TopicOperation::ListAllSubscriptions => self.listing(DurabilityType::All, false, address),
            TopicOperation::ListAllSubscriptionsAsJson => {
                self.listing(DurabilityType::All, true, address)
            }
            TopicOperation::ListDurableSubscriptions => {
                self.listing(DurabilityType::Durable, false, address)
            }
            TopicOperation::ListDurableSubscriptionsAsJson => {
                self.listing(DurabilityType::Durable, true, address)
            }
            TopicOperation::ListNonDurableSubscriptions => {
                self.listing(DurabilityType::NonDurable, false, address)
            }
            TopicOperation::ListNonDurableSubscriptionsAsJson => {
                self.listing(DurabilityType::NonDurable, true, address)
            }
            TopicOperation::ListMessagesForSubscription { queue_name } => self
                .list_messages(&queue_name)
                .await
                .map(OperationResult::Messages),
            TopicOperation::ListMessagesForSubscriptionAsJson { queue_name } => self
                .list_messages_json(&queue_name)
                .await
                .map(OperationResult::Json),
            TopicOperation::CountMessagesForSubscription {
                client_id,
                subscription_name,
                filter,
            } => self
                .count_messages(&client_id, &subscription_name, filter.as_deref())
                .await
                .map(OperationResult::Count),
            TopicOperation::DropDurableSubscription {
                client_id,
                subscription_name,
            } => self
                .drop_durable_subscription(&client_id, &subscription_name)
                .await
                .map(|()| OperationResult::None),
            TopicOperation::DropAllSubscriptions => self
                .drop_all_subscriptions(address)
                .await
                .map(|_| OperationResult::None),
            TopicOperation::RemoveMessages { filter } => self
                .remove_messages(filter.as_deref(), address)
                .await
                .map(OperationResult::Count),
            TopicOperation::Pause { persist } => self
                .pause(address, persist)
                .await
                .map(|()| OperationResult::None),
            TopicOperation::Resume => self.resume(address).await.map(|()| OperationResult::None),
        }
    }

    /// Run a management operation against a topic by name
    pub async fn execute_on_topic(
        &self,
        topic: &str,
        operation: TopicOperation,
    ) -> Result<OperationResult, AdminError> {
        self.execute(&topic_address(topic), operation).await
    }
}
