//! Bridge Manager
//!
//! Deploys and removes bridges on the broker. Configuration is resolved and
//! validated before any broker call; every mutation runs inside an
//! [`IoScope`] so storage operations it triggers are flushed before the
//! call returns.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::BridgeError;
use super::io_scope::IoScope;
use super::spec::{resolve_bridge_spec, BridgeSpec};
use crate::broker::{BrokerError, BrokerHandle};
use crate::config::{BridgeConfig, BridgeOverrides};

/// Outcome of deploying one bridge from a batch
pub type DeployOutcome = (String, Result<BridgeSpec, BridgeError>);

/// Deploys bridges onto a broker
pub struct BridgeManager {
    broker: Arc<dyn BrokerHandle>,
    overrides: BridgeOverrides,
}

impl BridgeManager {
    pub fn new(broker: Arc<dyn BrokerHandle>, overrides: BridgeOverrides) -> Self {
        Self { broker, overrides }
    }

    /// Resolve a bridge config without touching the broker
    pub fn resolve(&self, config: &BridgeConfig) -> Result<BridgeSpec, BridgeError> {
        resolve_bridge_spec(config, &self.overrides)
    }

    /// Resolve and deploy a bridge.
    ///
    /// Configuration errors are reported before the broker is consulted.
    pub async fn deploy(&self, config: &BridgeConfig) -> Result<BridgeSpec, BridgeError> {
        let spec = self.resolve(config).inspect_err(|e| {
            warn!("Bridge '{}': {}", config.name, e);
        })?;
        self.deploy_spec(&spec).await?;
        Ok(spec)
    }

    /// Deploy an already resolved bridge
    pub async fn deploy_spec(&self, spec: &BridgeSpec) -> Result<(), BridgeError> {
        if !self.broker.is_started() {
            warn!("Bridge '{}': Broker is not started", spec.name);
            return Err(BridgeError::BrokerNotStarted);
        }

        let scope = IoScope::enter(self.broker.as_ref());
        let deployed = match self.broker.deploy_bridge(spec).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(BrokerError::AlreadyExists(_)) => {
                Err(BridgeError::DeploymentFailed(spec.name.clone()))
            }
            Err(e) => Err(BridgeError::Broker(e)),
        };
        let released = scope.release();

        match (deployed, released) {
            (Ok(()), Ok(())) => {
                info!(
                    "Bridge '{}': Deployed from queue '{}'",
                    spec.name, spec.queue_name
                );
                Ok(())
            }
            (Ok(()), Err(e)) => {
                error!("Bridge '{}': Failed to flush pending I/O: {}", spec.name, e);
                Err(BridgeError::Broker(e))
            }
            (Err(e), released) => {
                if let Err(io) = released {
                    warn!("Bridge '{}': Failed to flush pending I/O: {}", spec.name, io);
                }
                error!("Bridge '{}': {}", spec.name, e);
                Err(e)
            }
        }
    }

    /// Destroy a bridge, letting in-flight messages drain.
    ///
    /// Returns `false` when no bridge of that name was deployed.
    pub async fn remove(&self, name: &str) -> Result<bool, BridgeError> {
        if !self.broker.is_started() {
            warn!("Bridge '{}': Broker is not started", name);
            return Err(BridgeError::BrokerNotStarted);
        }

        let scope = IoScope::enter(self.broker.as_ref());
        let destroyed = match self.broker.destroy_bridge(name, false).await {
            Ok(()) => Ok(true),
            Err(BrokerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        };
        let released = scope.release();

        match (destroyed, released) {
            (Ok(true), Ok(())) => {
                info!("Bridge '{}': Removed", name);
                Ok(true)
            }
            (Ok(false), Ok(())) => {
                warn!("Bridge '{}': Not deployed, nothing to remove", name);
                Ok(false)
            }
            (Ok(_), Err(e)) => {
                error!("Bridge '{}': Failed to flush pending I/O: {}", name, e);
                Err(BridgeError::Broker(e))
            }
            (Err(e), released) => {
                if let Err(io) = released {
                    warn!("Bridge '{}': Failed to flush pending I/O: {}", name, io);
                }
                error!("Bridge '{}': Failed to remove: {}", name, e);
                Err(BridgeError::Broker(e))
            }
        }
    }

    /// Replace a running bridge with a newly resolved definition.
    ///
    /// An invalid config leaves the running bridge untouched.
    pub async fn redeploy(&self, config: &BridgeConfig) -> Result<BridgeSpec, BridgeError> {
        let spec = self.resolve(config)?;
        self.remove(&spec.name).await?;
        self.deploy_spec(&spec).await?;
        Ok(spec)
    }

    /// Deploy every enabled bridge in order.
    ///
    /// A failing bridge does not stop the others.
    pub async fn deploy_all(&self, configs: &[BridgeConfig]) -> Vec<DeployOutcome> {
        let mut outcomes = Vec::with_capacity(configs.len());
        for config in configs {
            if !config.enabled {
                debug!("Bridge '{}': Disabled, skipping", config.name);
                continue;
            }
            let result = self.deploy(config).await;
            outcomes.push((config.name.clone(), result));
        }

        let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            warn!(
                "Bridge manager: {} of {} bridges failed to deploy",
                failed,
                outcomes.len()
            );
        } else {
            info!("Bridge manager: Deployed {} bridges", outcomes.len());
        }
        outcomes
    }
}
