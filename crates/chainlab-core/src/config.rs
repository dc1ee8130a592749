//! Harness configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) yields
//! the stock single-channel, single-proposal topology.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    pub exec: ExecConfig,
    pub binaries: BinaryConfig,
    pub governance: GovernanceConfig,
    pub bridge: BridgeConfig,
    pub poll: PollConfig,
    pub runner: RunnerConfig,
}

impl HarnessConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> HarnessResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.exec.deadline_secs == 0 {
            return Err(HarnessError::Config("exec.deadline_secs must be > 0".into()));
        }
        if self.binaries.node.is_empty() || self.binaries.relayer.is_empty() {
            return Err(HarnessError::Config("binary names must not be empty".into()));
        }
        if self.runner.max_concurrent == 0 {
            return Err(HarnessError::Config("runner.max_concurrent must be > 0".into()));
        }
        Ok(())
    }
}

/// Per-exec settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecConfig {
    /// Deadline covering create, start and output drain.
    pub deadline_secs: u64,
    /// User the exec runs as inside the container.
    pub user: String,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 60,
            user: "root".to_string(),
        }
    }
}

/// Names of the binaries invoked inside containers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BinaryConfig {
    pub node: String,
    pub relayer: String,
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            node: "ledgerd".to_string(),
            relayer: "hermes".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Upgrade plan name (the target software version).
    pub upgrade_name: String,
    pub title: String,
    pub description: String,
    pub upgrade_height: u64,
    /// Deposit amount, e.g. `10000000stake`.
    pub deposit: String,
    pub key_name: String,
    pub keyring_backend: String,
    pub broadcast_mode: String,
    /// Used when the submit output does not name the new proposal.
    pub default_proposal_id: u64,
    pub tx_success_marker: String,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            upgrade_name: "v2".to_string(),
            title: "v2 upgrade".to_string(),
            description: "v2 upgrade proposal".to_string(),
            upgrade_height: 75,
            deposit: "10000000stake".to_string(),
            key_name: "val".to_string(),
            keyring_backend: "test".to_string(),
            broadcast_mode: "block".to_string(),
            default_proposal_id: 1,
            tx_success_marker: "code: 0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    pub port_a: String,
    pub port_b: String,
    /// Used when the channel-open output does not name the channel.
    pub default_channel: String,
    pub timeout_height_offset: u64,
    /// Reported by the relayer on stderr.
    pub channel_open_marker: String,
    pub tx_success_marker: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port_a: "transfer".to_string(),
            port_b: "transfer".to_string(),
            default_channel: "channel-0".to_string(),
            timeout_height_offset: 1000,
            channel_open_marker: "successfully opened init channel".to_string(),
            tx_success_marker: "code: 0".to_string(),
        }
    }
}

/// Height polling used by the upgrade scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            max_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunnerMode {
    #[default]
    Sequential,
    FanOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    pub mode: RunnerMode,
    /// Only used in fan-out mode.
    pub max_concurrent: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: RunnerMode::Sequential,
            max_concurrent: 4,
        }
    }
}
