//! Chain build pipeline.

use std::path::Path;

use tracing::{info, instrument};

use crate::chain::{Chain, ChainDescriptor};
use crate::config::{ChainSetup, ValidatorConfig};
use crate::error::{BuildStep, ChainError, ChainResult};
use crate::provisioner::{FsProvisioner, NodeProvisioner};

/// Builds chains through a [`NodeProvisioner`].
///
/// Steps run strictly in order and stop at the first failure. Nothing is
/// cleaned up on failure; the data directory is left as-is for inspection.
pub struct ChainBuilder<P = FsProvisioner> {
    provisioner: P,
}

impl Default for ChainBuilder<FsProvisioner> {
    fn default() -> Self {
        Self::new(FsProvisioner::default())
    }
}

impl ChainBuilder<FsProvisioner> {
    /// Filesystem builder using the genesis parameters of `setup`.
    pub fn from_setup(setup: &ChainSetup) -> Self {
        Self::new(FsProvisioner::new(setup.genesis.clone()))
    }
}

impl<P: NodeProvisioner> ChainBuilder<P> {
    pub fn new(provisioner: P) -> Self {
        Self { provisioner }
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Build a chain with one validator per entry in `validator_configs`.
    #[instrument(skip(self, validator_configs), fields(validators = validator_configs.len()))]
    pub fn init(
        &self,
        id: &str,
        data_dir: &Path,
        validator_configs: &[ValidatorConfig],
    ) -> ChainResult<ChainDescriptor> {
        if validator_configs.is_empty() {
            return Err(ChainError::NoValidators(id.to_string()));
        }

        let mut chain =
            Chain::new(id, data_dir).map_err(|e| ChainError::at(BuildStep::Allocate, e))?;

        self.init_nodes(&mut chain, validator_configs.len())
            .map_err(|e| ChainError::at(BuildStep::InitNodes, e))?;

        self.init_genesis(&mut chain)
            .map_err(|e| ChainError::at(BuildStep::Genesis, e))?;

        self.init_validator_configs(&mut chain, validator_configs)
            .map_err(|e| ChainError::at(BuildStep::ValidatorConfigs, e))?;

        let descriptor = chain
            .export()
            .map_err(|e| ChainError::at(BuildStep::Export, e))?;

        info!(chain_id = %id, validators = descriptor.len(), "chain initialized");
        Ok(descriptor)
    }

    fn init_nodes(&self, chain: &mut Chain, count: usize) -> ChainResult<()> {
        for index in 0..count {
            let validator = self.provisioner.init_node(chain, index)?;
            chain.validators.push(validator);
        }
        Ok(())
    }

    fn init_genesis(&self, chain: &mut Chain) -> ChainResult<()> {
        let genesis = self.provisioner.init_genesis(chain)?;
        chain.genesis = Some(genesis);
        Ok(())
    }

    fn init_validator_configs(
        &self,
        chain: &mut Chain,
        configs: &[ValidatorConfig],
    ) -> ChainResult<()> {
        if chain.genesis.is_none() {
            return Err(ChainError::GenesisMissing(chain.id.clone()));
        }
        if configs.len() != chain.validators.len() {
            return Err(ChainError::ConfigCountMismatch {
                expected: chain.validators.len(),
                actual: configs.len(),
            });
        }

        for (index, config) in configs.iter().enumerate() {
            if let Some(moniker) = &config.moniker {
                chain.validators[index].moniker = moniker.clone();
            }
        }
        for (index, config) in configs.iter().enumerate() {
            self.provisioner
                .apply_config(chain, &chain.validators[index], config)?;
            chain.validators[index].config = Some(config.clone());
        }
        Ok(())
    }
}

/// Build a chain with the default filesystem provisioner.
pub fn init(
    id: &str,
    data_dir: &Path,
    validator_configs: &[ValidatorConfig],
) -> ChainResult<ChainDescriptor> {
    ChainBuilder::default().init(id, data_dir, validator_configs)
}

/// Build the chain described by `setup`, genesis parameters included.
pub fn init_from_setup(setup: &ChainSetup) -> ChainResult<ChainDescriptor> {
    ChainBuilder::from_setup(setup).init(&setup.chain_id, &setup.data_dir, &setup.validators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_rejects_empty_config_list() {
        let dir = tempdir().unwrap();
        let err = init("c", dir.path(), &[]).unwrap_err();
        assert!(matches!(err, ChainError::NoValidators(_)));
    }

    #[test]
    fn test_moniker_override_reaches_descriptor() {
        let dir = tempdir().unwrap();
        let configs = vec![
            ValidatorConfig::default(),
            ValidatorConfig {
                moniker: Some("bravo".to_string()),
                ..Default::default()
            },
        ];
        let descriptor = init("c", dir.path(), &configs).unwrap();
        assert_eq!(descriptor.validators()[0].moniker, "c-val-0");
        assert_eq!(descriptor.validators()[1].moniker, "bravo");
    }

    #[test]
    fn test_setup_genesis_reaches_genesis_file() {
        let dir = tempdir().unwrap();
        let raw = format!(
            r#"
chain_id = "osmo-1"
data_dir = "{}"

[genesis]
bond_denom = "uosmo"
voting_period_secs = 30
min_deposit = "500uosmo"
address_prefix = "osmo"

[[validators]]

[[validators]]
"#,
            dir.path().display()
        );
        let setup: ChainSetup = toml::from_str(&raw).unwrap();

        let descriptor = init_from_setup(&setup).unwrap();
        assert!(descriptor.validators()[0].address.starts_with("osmo1"));

        for validator in descriptor.validators() {
            let raw = std::fs::read(validator.home_dir.join("config").join("genesis.json")).unwrap();
            let genesis: crate::genesis::GenesisState = serde_json::from_slice(&raw).unwrap();
            assert_eq!(genesis.gov.voting_period, "30s");
            assert_eq!(genesis.gov.max_deposit_period, "10s");
            assert_eq!(genesis.staking.bond_denom, "uosmo");
            assert_eq!(genesis.gov.min_deposit[0].to_string(), "500uosmo");
        }
    }

    #[test]
    fn test_empty_chain_id_fails_at_allocate() {
        let dir = tempdir().unwrap();
        let err = init(" ", dir.path(), &[ValidatorConfig::default()]).unwrap_err();
        assert_eq!(err.step(), Some(BuildStep::Allocate));
    }
}
