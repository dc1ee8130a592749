//! Declarative inputs to the chain builder.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::coin::Coin;

/// State pruning strategy written into a node's `app.toml`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pruning {
    #[default]
    Default,
    Nothing,
    Everything,
    /// Uses `pruning_keep_recent` and `pruning_interval`
    Custom,
}

impl Pruning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pruning::Default => "default",
            Pruning::Nothing => "nothing",
            Pruning::Everything => "everything",
            Pruning::Custom => "custom",
        }
    }
}

/// Per-validator configuration applied after genesis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Overrides the generated `<chain_id>-val-<i>` moniker.
    pub moniker: Option<String>,
    pub pruning: Pruning,
    /// Keep the last N states (custom pruning only).
    pub pruning_keep_recent: u64,
    /// Prune every Nth block (custom pruning only).
    pub pruning_interval: u64,
    /// State-sync snapshot every Nth block, 0 disables.
    pub snapshot_interval: u64,
    /// Snapshots to keep, 0 keeps all.
    pub snapshot_keep_recent: u32,
}

/// Parameters for the shared genesis state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenesisConfig {
    /// Staking bond denomination.
    pub bond_denom: String,
    /// Balances credited to every validator account.
    pub account_balances: Vec<Coin>,
    /// Self-delegation recorded for every validator.
    pub self_delegation: Coin,
    /// Minimum deposit before a proposal enters voting.
    pub min_deposit: Coin,
    /// Governance voting period in seconds.
    pub voting_period_secs: u64,
    /// Maximum deposit period in seconds.
    pub max_deposit_period_secs: u64,
    /// Bech32-style human readable prefix for account addresses.
    pub address_prefix: String,
    /// `minimum-gas-prices` written to every node's `app.toml`.
    pub minimum_gas_prices: String,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            bond_denom: "stake".to_string(),
            account_balances: vec![
                Coin::new(100_000_000_000, "stake"),
                Coin::new(100_000_000_000, "utoken"),
            ],
            self_delegation: Coin::new(100_000_000_000, "stake"),
            min_deposit: Coin::new(10_000_000, "stake"),
            voting_period_secs: 10,
            max_deposit_period_secs: 10,
            address_prefix: "chain".to_string(),
            minimum_gas_prices: "0utoken".to_string(),
        }
    }
}

/// Full chain setup as read from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainSetup {
    pub chain_id: String,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub genesis: GenesisConfig,
    pub validators: Vec<ValidatorConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_setup_from_toml() {
        let raw = r#"
            chain_id = "chain-a"
            data_dir = "/tmp/chainlab"

            [genesis]
            voting_period_secs = 30

            [[validators]]
            pruning = "nothing"

            [[validators]]
            moniker = "beta"
            snapshot_interval = 1500
        "#;
        let setup: ChainSetup = toml::from_str(raw).unwrap();
        assert_eq!(setup.chain_id, "chain-a");
        assert_eq!(setup.genesis.voting_period_secs, 30);
        assert_eq!(setup.genesis.bond_denom, "stake");
        assert_eq!(setup.validators.len(), 2);
        assert_eq!(setup.validators[0].pruning, Pruning::Nothing);
        assert_eq!(setup.validators[1].moniker.as_deref(), Some("beta"));
        assert_eq!(setup.validators[1].snapshot_interval, 1500);
    }

    #[test]
    fn test_validator_config_default() {
        let cfg = ValidatorConfig::default();
        assert_eq!(cfg.pruning, Pruning::Default);
        assert!(cfg.moniker.is_none());
        assert_eq!(cfg.snapshot_interval, 0);
    }
}
