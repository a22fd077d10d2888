//! Configuration Module
//!
//! TOML configuration for the management layer:
//! - Log level
//! - Declarative bridges (`[[bridge]]`)
//! - Bridge attribute overrides (`[bridge_overrides]`)
//! - Environment variable overrides (`VIBEMQ_MGMT__*`)

use std::collections::HashSet;
use std::path::Path;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

use crate::bridge::{resolve_bridge_spec, BridgeSpec};

// Re-export bridge config types
pub use bridge::{BridgeConfig, BridgeOverride, BridgeOverrides, CredentialReference};

mod bridge;

/// Prefix of environment variables that override configuration keys
pub const ENV_PREFIX: &str = "VIBEMQ_MGMT";

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}")
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    Ok(re
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .to_string())
}

#[cfg(test)]
mod tests;

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Bridge definitions
    pub bridge: Vec<BridgeConfig>,
    /// Overrides applied when resolving bridges
    pub bridge_overrides: BridgeOverrides,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `VIBEMQ_MGMT__` prefix with double underscores for nesting:
    ///    - `VIBEMQ_MGMT__LOG__LEVEL=debug` overrides `log.level`
    ///    - `VIBEMQ_MGMT__BRIDGE_OVERRIDES__CALL_TIMEOUT=45000` overrides
    ///      `bridge_overrides.call_timeout`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => Self::build(Some(&content)),
            // File doesn't exist, use defaults
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::build(None),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Like [`Config::load`], but a missing file is an error
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::build(Some(&content))
    }

    fn build(content: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().set_default("log.level", "info")?;

        if let Some(content) = content {
            let substituted = substitute_env_vars(content)?;
            builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
        }

        // Double underscore separates nested keys, single underscore preserved in field names
        let cfg = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a string (for testing, no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "log.level must be one of {} (got '{}')",
                LOG_LEVELS.join(", "),
                self.log.level
            )));
        }

        let mut names = HashSet::new();
        for bridge in &self.bridge {
            if !names.insert(bridge.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate bridge name '{}'",
                    bridge.name
                )));
            }
            resolve_bridge_spec(bridge, &self.bridge_overrides)
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }

        let mut overridden: Vec<_> = self
            .bridge_overrides
            .bridges
            .keys()
            .filter(|name| !names.contains(name.as_str()))
            .collect();
        overridden.sort();
        if let Some(name) = overridden.first() {
            return Err(ConfigError::Validation(format!(
                "bridge_overrides names unknown bridge '{}'",
                name
            )));
        }

        Ok(())
    }

    /// Resolve every configured bridge against the overrides
    pub fn resolved_bridges(&self) -> Result<Vec<BridgeSpec>, ConfigError> {
        self.bridge
            .iter()
            .map(|b| {
                resolve_bridge_spec(b, &self.bridge_overrides)
                    .map_err(|e| ConfigError::Validation(e.to_string()))
            })
            .collect()
    }
}
