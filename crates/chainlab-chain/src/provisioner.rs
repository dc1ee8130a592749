//! Node provisioning: identities, genesis files and per-node configuration.
//!
//! [`NodeProvisioner`] is the seam between the build pipeline and the node
//! format. [`FsProvisioner`] writes everything straight to the data
//! directory so a chain can be built without the node binary installed.

use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::chain::{Chain, NodeKeys, Ports, Validator};
use crate::config::{GenesisConfig, Pruning, ValidatorConfig};
use crate::error::{ChainError, ChainResult};
use crate::genesis::GenesisState;

/// Keyring entry every validator signs with.
pub const VALIDATOR_KEY_NAME: &str = "val";

/// Operations the builder delegates to the node format.
pub trait NodeProvisioner {
    /// Create identity and home directory for validator `index`.
    fn init_node(&self, chain: &Chain, index: usize) -> ChainResult<Validator>;

    /// Generate genesis and distribute it to every validator home.
    fn init_genesis(&self, chain: &Chain) -> ChainResult<GenesisState>;

    /// Write node and app configuration for one validator.
    fn apply_config(
        &self,
        chain: &Chain,
        validator: &Validator,
        config: &ValidatorConfig,
    ) -> ChainResult<()>;
}

/// Provisioner that writes node files directly.
#[derive(Debug, Clone, Default)]
pub struct FsProvisioner {
    genesis: GenesisConfig,
}

impl FsProvisioner {
    pub fn new(genesis: GenesisConfig) -> Self {
        Self { genesis }
    }

    pub fn genesis_config(&self) -> &GenesisConfig {
        &self.genesis
    }

    fn derive_keys(&self, chain_id: &str, index: usize) -> NodeKeys {
        let mut seed = Sha256::new();
        seed.update(uuid::Uuid::new_v4().as_bytes());
        seed.update(chain_id.as_bytes());
        seed.update(index.to_le_bytes());
        let node_key = hex::encode(seed.finalize());

        let node_id = sha256_hex(node_key.as_bytes())[..40].to_string();
        let validator_pubkey = sha256_hex(format!("consensus:{node_key}").as_bytes());
        let address = format!(
            "{}1{}",
            self.genesis.address_prefix,
            &sha256_hex(validator_pubkey.as_bytes())[..38]
        );

        NodeKeys {
            node_id,
            node_key,
            validator_pubkey,
            address,
        }
    }
}

impl NodeProvisioner for FsProvisioner {
    fn init_node(&self, chain: &Chain, index: usize) -> ChainResult<Validator> {
        let moniker = format!("{}-val-{}", chain.id(), index);
        let home_dir = chain.root_dir().join(&moniker);
        let keys = self.derive_keys(chain.id(), index);

        let validator = Validator {
            index,
            moniker,
            home_dir,
            key_name: VALIDATOR_KEY_NAME.to_string(),
            keys,
            ports: Ports::default(),
            config: None,
        };

        let config_dir = validator.config_dir();
        std::fs::create_dir_all(&config_dir)?;
        std::fs::create_dir_all(validator.home_dir.join("data"))?;
        std::fs::create_dir_all(validator.home_dir.join("keyring-test"))?;

        write_json(
            &config_dir.join("node_key.json"),
            &serde_json::json!({
                "id": validator.keys.node_id,
                "priv_key": validator.keys.node_key,
            }),
        )?;
        write_json(
            &config_dir.join("priv_validator_key.json"),
            &serde_json::json!({
                "address": validator.keys.address,
                "pub_key": validator.keys.validator_pubkey,
            }),
        )?;
        write_json(
            &validator.home_dir.join("data").join("priv_validator_state.json"),
            &serde_json::json!({ "height": "0", "round": 0, "step": 0 }),
        )?;
        write_json(
            &validator
                .home_dir
                .join("keyring-test")
                .join(format!("{}.info", validator.key_name)),
            &serde_json::json!({
                "name": validator.key_name,
                "address": validator.keys.address,
            }),
        )?;

        debug!(chain_id = %chain.id(), validator = %validator.moniker, "initialized node");
        Ok(validator)
    }

    fn init_genesis(&self, chain: &Chain) -> ChainResult<GenesisState> {
        if chain.validators().is_empty() {
            return Err(ChainError::NoValidators(chain.id().to_string()));
        }
        let genesis = GenesisState::build(chain.id(), chain.validators(), &self.genesis);
        for validator in chain.validators() {
            write_json(&validator.config_dir().join("genesis.json"), &genesis)?;
        }
        debug!(
            chain_id = %chain.id(),
            accounts = genesis.accounts.len(),
            "wrote genesis"
        );
        Ok(genesis)
    }

    fn apply_config(
        &self,
        chain: &Chain,
        validator: &Validator,
        config: &ValidatorConfig,
    ) -> ChainResult<()> {
        let peers: Vec<String> = chain
            .validators()
            .iter()
            .filter(|v| v.index != validator.index)
            .map(Validator::p2p_address)
            .collect();

        let node = NodeToml {
            moniker: validator.moniker.clone(),
            p2p: P2pSection {
                laddr: format!("tcp://0.0.0.0:{}", validator.ports.p2p),
                external_address: format!("{}:{}", validator.moniker, validator.ports.p2p),
                persistent_peers: peers.join(","),
            },
            rpc: RpcSection {
                laddr: format!("tcp://0.0.0.0:{}", validator.ports.rpc),
            },
        };
        write_toml(&validator.config_dir().join("config.toml"), &node)?;

        let (keep_recent, interval) = match config.pruning {
            Pruning::Custom => (config.pruning_keep_recent, config.pruning_interval),
            _ => (0, 0),
        };
        let app = AppToml {
            minimum_gas_prices: self.genesis.minimum_gas_prices.clone(),
            pruning: config.pruning.as_str().to_string(),
            pruning_keep_recent: keep_recent.to_string(),
            pruning_interval: interval.to_string(),
            api: ApiSection {
                enable: true,
                address: format!("tcp://0.0.0.0:{}", validator.ports.api),
            },
            grpc: GrpcSection {
                address: format!("0.0.0.0:{}", validator.ports.grpc),
            },
            state_sync: StateSyncSection {
                snapshot_interval: config.snapshot_interval,
                snapshot_keep_recent: config.snapshot_keep_recent,
            },
        };
        write_toml(&validator.config_dir().join("app.toml"), &app)?;

        debug!(
            chain_id = %chain.id(),
            validator = %validator.moniker,
            peers = peers.len(),
            "applied validator config"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct NodeToml {
    moniker: String,
    p2p: P2pSection,
    rpc: RpcSection,
}

#[derive(Serialize)]
struct P2pSection {
    laddr: String,
    external_address: String,
    persistent_peers: String,
}

#[derive(Serialize)]
struct RpcSection {
    laddr: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct AppToml {
    minimum_gas_prices: String,
    pruning: String,
    pruning_keep_recent: String,
    pruning_interval: String,
    api: ApiSection,
    grpc: GrpcSection,
    state_sync: StateSyncSection,
}

#[derive(Serialize)]
struct ApiSection {
    enable: bool,
    address: String,
}

#[derive(Serialize)]
struct GrpcSection {
    address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct StateSyncSection {
    snapshot_interval: u64,
    snapshot_keep_recent: u32,
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> ChainResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> ChainResult<()> {
    let text = toml::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_derived_keys_are_well_formed() {
        let provisioner = FsProvisioner::default();
        let keys = provisioner.derive_keys("c", 0);
        assert_eq!(keys.node_id.len(), 40);
        assert_eq!(keys.node_key.len(), 64);
        assert!(keys.address.starts_with("chain1"));
    }

    #[test]
    fn test_derived_keys_differ_per_node() {
        let provisioner = FsProvisioner::default();
        let a = provisioner.derive_keys("c", 0);
        let b = provisioner.derive_keys("c", 1);
        assert_ne!(a.node_id, b.node_id);
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn test_init_node_creates_home() {
        let dir = tempdir().unwrap();
        let chain = Chain::new("c", dir.path()).unwrap();
        let validator = FsProvisioner::default().init_node(&chain, 0).unwrap();

        assert_eq!(validator.moniker, "c-val-0");
        assert!(validator.config_dir().join("node_key.json").exists());
        assert!(validator.home_dir.join("keyring-test/val.info").exists());
    }

    #[test]
    fn test_genesis_without_nodes_fails() {
        let dir = tempdir().unwrap();
        let chain = Chain::new("c", dir.path()).unwrap();
        let err = FsProvisioner::default().init_genesis(&chain).unwrap_err();
        assert!(matches!(err, ChainError::NoValidators(_)));
    }

    #[test]
    fn test_custom_pruning_written_to_app_toml() {
        let dir = tempdir().unwrap();
        let provisioner = FsProvisioner::default();
        let mut chain = Chain::new("c", dir.path()).unwrap();
        let validator = provisioner.init_node(&chain, 0).unwrap();
        chain.validators.push(validator.clone());

        let config = ValidatorConfig {
            pruning: Pruning::Custom,
            pruning_keep_recent: 100,
            pruning_interval: 10,
            snapshot_interval: 1500,
            ..Default::default()
        };
        provisioner.apply_config(&chain, &validator, &config).unwrap();

        let app = std::fs::read_to_string(validator.config_dir().join("app.toml")).unwrap();
        assert!(app.contains("pruning = \"custom\""));
        assert!(app.contains("pruning-keep-recent = \"100\""));
        assert!(app.contains("snapshot-interval = 1500"));
    }
}
