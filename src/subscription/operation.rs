//! Topic management operations
//!
//! The serde tags are the management operation names, so a request such as
//! `{"operation": "count-messages-for-subscription", "client-id": "c",
//! "subscription-name": "s"}` deserializes straight into a [`TopicOperation`].

use serde::{Deserialize, Serialize};

use super::info::{MessageView, SubscriptionInfo};

/// A management operation on one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "operation",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case"
)]
pub enum TopicOperation {
    ListAllSubscriptions,
    ListAllSubscriptionsAsJson,
    ListDurableSubscriptions,
    ListDurableSubscriptionsAsJson,
    ListNonDurableSubscriptions,
    ListNonDurableSubscriptionsAsJson,
    ListMessagesForSubscription {
        queue_name: String,
    },
    ListMessagesForSubscriptionAsJson {
        queue_name: String,
    },
    CountMessagesForSubscription {
        client_id: String,
        subscription_name: String,
        #[serde(default)]
        filter: Option<String>,
    },
    DropDurableSubscription {
        client_id: String,
        subscription_name: String,
    },
    DropAllSubscriptions,
    RemoveMessages {
        #[serde(default)]
        filter: Option<String>,
    },
    Pause {
        #[serde(default)]
        persist: bool,
    },
    Resume,
}

impl TopicOperation {
    /// Management name of the operation
    pub fn name(&self) -> &'static str {
        match self {
            TopicOperation::ListAllSubscriptions => "list-all-subscriptions",
            TopicOperation::ListAllSubscriptionsAsJson => "list-all-subscriptions-as-json",
            TopicOperation::ListDurableSubscriptions => "list-durable-subscriptions",
            TopicOperation::ListDurableSubscriptionsAsJson => "list-durable-subscriptions-as-json",
            TopicOperation::ListNonDurableSubscriptions => "list-non-durable-subscriptions",
            TopicOperation::ListNonDurableSubscriptionsAsJson => {
                "list-non-durable-subscriptions-as-json"
            }
            TopicOperation::ListMessagesForSubscription { .. } => "list-messages-for-subscription",
            TopicOperation::ListMessagesForSubscriptionAsJson { .. } => {
                "list-messages-for-subscription-as-json"
            }
            TopicOperation::CountMessagesForSubscription { .. } => {
                "count-messages-for-subscription"
            }
            TopicOperation::DropDurableSubscription { .. } => "drop-durable-subscription",
            TopicOperation::DropAllSubscriptions => "drop-all-subscriptions",
            TopicOperation::RemoveMessages { .. } => "remove-messages",
            TopicOperation::Pause { .. } => "pause",
            TopicOperation::Resume => "resume",
        }
    }

    /// Whether the operation leaves broker state unchanged
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            TopicOperation::ListAllSubscriptions
                | TopicOperation::ListAllSubscriptionsAsJson
                | TopicOperation::ListDurableSubscriptions
                | TopicOperation::ListDurableSubscriptionsAsJson
                | TopicOperation::ListNonDurableSubscriptions
                | TopicOperation::ListNonDurableSubscriptionsAsJson
                | TopicOperation::ListMessagesForSubscription { .. }
                | TopicOperation::ListMessagesForSubscriptionAsJson { .. }
                | TopicOperation::CountMessagesForSubscription { .. }
        )
    }
}

/// Reply of a [`TopicOperation`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationResult {
    Subscriptions(Vec<SubscriptionInfo>),
    Messages(Vec<MessageView>),
    Json(String),
    Count(u64),
    None,
}
