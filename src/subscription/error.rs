//! Subscription administration errors

use std::fmt;

use super::selector::SelectorError;
use crate::broker::BrokerError;

/// Error type for subscription administration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// No address control for the topic
    AddressNotFound(String),
    /// No queue backs the durable subscription
    NoSuchSubscription {
        client_id: String,
        subscription_name: String,
        queue_name: String,
    },
    /// No queue of that name
    NoSuchQueue(String),
    /// A required argument is missing or empty
    InvalidArgument(String),
    InvalidSelector(SelectorError),
    /// Enumerating the address failed
    Listing { address: String, reason: String },
    /// Message removal failed part way through the address
    PartialRemoval {
        queue: String,
        removed: u64,
        source: BrokerError,
    },
    Broker(BrokerError),
}

impl fmt::Display for AdminError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminError::AddressNotFound(address) => write!(f, "Address not found: {}", address),
            AdminError::NoSuchSubscription {
                client_id,
                subscription_name,
                queue_name,
            } => write!(
                f,
                "No subscription '{}' for client '{}' (queue {})",
                subscription_name, client_id, queue_name
            ),
            AdminError::NoSuchQueue(name) => write!(f, "No subscription with queue name {}", name),
            AdminError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            AdminError::InvalidSelector(e) => write!(f, "{}", e),
            AdminError::Listing { address, reason } => {
                write!(f, "Failed to list subscriptions of {}: {}", address, reason)
            }
            AdminError::PartialRemoval {
                queue,
                removed,
                source,
            } => write!(
                f,
                "Removing messages failed on queue {} after {} were removed: {}",
                queue, removed, source
            ),
            AdminError::Broker(e) => write!(f, "Broker error: {}", e),
        }
    }
}

impl std::error::Error for AdminError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdminError::InvalidSelector(e) => Some(e),
            AdminError::PartialRemoval { source, .. } => Some(source),
            AdminError::Broker(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BrokerError> for AdminError {
    fn from(e: BrokerError) -> Self {
        AdminError::Broker(e)
    }
}

impl From<SelectorError> for AdminError {
    fn from(e: SelectorError) -> Self {
        AdminError::InvalidSelector(e)
    }
}
