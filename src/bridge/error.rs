//! Bridge error types

use std::fmt;

use crate::broker::BrokerError;

/// Error type for bridge lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The declared bridge violates a structural rule
    Configuration { bridge: String, reason: String },
    /// The broker has not finished starting
    BrokerNotStarted,
    /// The broker refused to deploy the bridge
    DeploymentFailed(String),
    /// A broker control call failed
    Broker(BrokerError),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Configuration { bridge, reason } => {
                write!(f, "Invalid configuration for bridge '{}': {}", bridge, reason)
            }
            BridgeError::BrokerNotStarted => write!(f, "Broker is not started"),
            BridgeError::DeploymentFailed(name) => write!(f, "Failed to deploy bridge '{}'", name),
            BridgeError::Broker(e) => write!(f, "Broker error: {}", e),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Broker(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BrokerError> for BridgeError {
    fn from(e: BrokerError) -> Self {
        BridgeError::Broker(e)
    }
}
