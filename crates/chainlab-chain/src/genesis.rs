//! Shared genesis state written into every validator home.
//!
//! Only the fields the test cluster depends on are modelled; the node binary
//! owns the full format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::Validator;
use crate::coin::Coin;
use crate::config::GenesisConfig;

/// Funded account in genesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisAccount {
    pub address: String,
    pub coins: Vec<Coin>,
}

/// Bonded validator entry (the gentx equivalent).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisValidator {
    pub address: String,
    pub pubkey: String,
    pub self_delegation: Coin,
}

/// Governance parameters relevant to the upgrade scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GovParams {
    pub min_deposit: Vec<Coin>,
    pub max_deposit_period: String,
    pub voting_period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakingParams {
    pub bond_denom: String,
}

/// Genesis document shared by all validators of a chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisState {
    pub chain_id: String,
    pub genesis_time: DateTime<Utc>,
    pub initial_height: String,
    pub accounts: Vec<GenesisAccount>,
    pub validators: Vec<GenesisValidator>,
    pub gov: GovParams,
    pub staking: StakingParams,
}

impl GenesisState {
    /// Genesis with no accounts and default parameters.
    pub fn empty(chain_id: &str) -> Self {
        Self::build(chain_id, &[], &GenesisConfig::default())
    }

    /// Fund and bond every validator according to `config`.
    pub fn build(chain_id: &str, validators: &[Validator], config: &GenesisConfig) -> Self {
        let accounts = validators
            .iter()
            .map(|v| GenesisAccount {
                address: v.keys.address.clone(),
                coins: config.account_balances.clone(),
            })
            .collect();
        let bonded = validators
            .iter()
            .map(|v| GenesisValidator {
                address: v.keys.address.clone(),
                pubkey: v.keys.validator_pubkey.clone(),
                self_delegation: config.self_delegation.clone(),
            })
            .collect();

        Self {
            chain_id: chain_id.to_string(),
            genesis_time: Utc::now(),
            initial_height: "1".to_string(),
            accounts,
            validators: bonded,
            gov: GovParams {
                min_deposit: vec![config.min_deposit.clone()],
                max_deposit_period: format!("{}s", config.max_deposit_period_secs),
                voting_period: format!("{}s", config.voting_period_secs),
            },
            staking: StakingParams {
                bond_denom: config.bond_denom.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_genesis_uses_default_params() {
        let genesis = GenesisState::empty("c");
        assert_eq!(genesis.chain_id, "c");
        assert!(genesis.accounts.is_empty());
        assert_eq!(genesis.gov.voting_period, "10s");
        assert_eq!(genesis.staking.bond_denom, "stake");
        assert_eq!(genesis.gov.min_deposit, vec![Coin::new(10_000_000, "stake")]);
    }
}
