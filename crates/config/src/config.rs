//! Main configuration module for Lampyre.
//!
//! All node settings are defined in one `lampyre.toml` file with full
//! defaults. Durations are given in milliseconds in the file and exposed
//! as [`Duration`] values to the rest of the system.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration struct containing all Lampyre settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Protocol timing and ring parameters
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Local node settings
    #[serde(default)]
    pub node: NodeConfig,

    /// Protocol behaviour selection
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a TOML file and validates it.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!("loading configuration from {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content)?;

        debug!("configuration parsed, validating");
        config.validate()?;

        Ok(config)
    }

    /// Validates the parameter combination.
    pub fn validate(&self) -> ConfigResult<()> {
        self.protocol.validate()?;
        self.strategy.validate()?;
        Ok(())
    }
}

/// Protocol timing and ring parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Number of rings (K) in the overlay
    pub num_rings: u32,
    /// Maximum rings a member may disable in a valid mask (F)
    pub max_disabled_rings: u32,
    /// Milliseconds between gossip rounds
    pub gossip_interval_ms: u64,
    /// Milliseconds between monitor rounds
    pub monitor_interval_ms: u64,
    /// Milliseconds a standing accusation has before the accused is
    /// declared dead
    pub accusation_timeout_ms: u64,
    /// Milliseconds between accusation timer sweeps
    pub sweep_interval_ms: u64,
    /// Consecutive failed pings before a successor is accused
    pub ping_retry_limit: u32,
    /// Hard deadline on every outgoing RPC, milliseconds
    pub rpc_deadline_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            num_rings: 10,
            max_disabled_rings: 3,
            gossip_interval_ms: 1_000,
            monitor_interval_ms: 2_000,
            accusation_timeout_ms: 5_000,
            sweep_interval_ms: 1_000,
            ping_retry_limit: 3,
            rpc_deadline_ms: 3_000,
        }
    }
}

impl ProtocolConfig {
    /// Gossip round interval.
    pub fn gossip_interval(&self) -> Duration {
        Duration::from_millis(self.gossip_interval_ms)
    }

    /// Monitor round interval.
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Standing-accusation deadline.
    pub fn accusation_timeout(&self) -> Duration {
        Duration::from_millis(self.accusation_timeout_ms)
    }

    /// Accusation timer sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Outgoing RPC deadline.
    pub fn rpc_deadline(&self) -> Duration {
        Duration::from_millis(self.rpc_deadline_ms)
    }

    /// Set the ring count.
    pub fn num_rings(mut self, num_rings: u32) -> Self {
        self.num_rings = num_rings;
        self
    }

    /// Set the gossip interval in milliseconds.
    pub fn gossip_interval_ms(mut self, ms: u64) -> Self {
        self.gossip_interval_ms = ms;
        self
    }

    /// Set the accusation timeout in milliseconds.
    pub fn accusation_timeout_ms(mut self, ms: u64) -> Self {
        self.accusation_timeout_ms = ms;
        self
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.num_rings == 0 {
            return Err(ConfigError::InvalidValue {
                field: "protocol.num_rings",
                reason: "at least one ring is required".to_string(),
            });
        }
        if self.max_disabled_rings >= self.num_rings {
            return Err(ConfigError::InvalidValue {
                field: "protocol.max_disabled_rings",
                reason: format!(
                    "must be smaller than num_rings ({})",
                    self.num_rings
                ),
            });
        }
        for (field, value) in [
            ("protocol.gossip_interval_ms", self.gossip_interval_ms),
            ("protocol.monitor_interval_ms", self.monitor_interval_ms),
            ("protocol.sweep_interval_ms", self.sweep_interval_ms),
            ("protocol.rpc_deadline_ms", self.rpc_deadline_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be non-zero".to_string(),
                });
            }
        }
        // A rebuttal needs at least one full gossip round trip to land
        // before the accusation deadline fires.
        if self.accusation_timeout_ms < self.gossip_interval_ms * 2 {
            return Err(ConfigError::InvalidValue {
                field: "protocol.accusation_timeout_ms",
                reason: format!(
                    "must be at least twice the gossip interval ({})",
                    self.gossip_interval_ms
                ),
            });
        }
        if self.ping_retry_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "protocol.ping_retry_limit",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Local node settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Gossip addresses of existing members used to join the network.
    /// Empty for the first node of a fresh network.
    #[serde(default)]
    pub entry_addrs: Vec<String>,
}

impl NodeConfig {
    /// Add an entry-point address.
    pub fn entry_addr(mut self, addr: impl Into<String>) -> Self {
        self.entry_addrs.push(addr.into());
        self
    }
}

/// Which protocol behaviour the node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// The correct Fireflies behaviour
    #[default]
    Correct,
    /// Adversarial behaviour for resilience experiments: fabricate
    /// accusations against every known member
    SpamAccusations,
}

/// Protocol behaviour selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StrategyConfig {
    /// Selected behaviour
    #[serde(default)]
    pub kind: StrategyKind,
}

impl StrategyConfig {
    fn validate(&self) -> ConfigResult<()> {
        // Both kinds are valid; the adversarial one is announced loudly at
        // node startup rather than rejected here.
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter directive (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
