//! Chain and validator entities, and the immutable descriptor they export.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ValidatorConfig;
use crate::error::{ChainError, ChainResult};
use crate::genesis::GenesisState;

/// Listen ports used inside every validator container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ports {
    pub p2p: u16,
    pub rpc: u16,
    pub grpc: u16,
    pub api: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            p2p: 26656,
            rpc: 26657,
            grpc: 9090,
            api: 1317,
        }
    }
}

/// Key material derived for one validator node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeKeys {
    /// P2P node id (40 hex chars).
    pub node_id: String,
    /// Hex-encoded node private key; never exported.
    pub node_key: String,
    /// Hex-encoded consensus public key.
    pub validator_pubkey: String,
    /// Account address holding the validator's funds.
    pub address: String,
}

/// A validator node owned by its chain during construction.
#[derive(Debug, Clone)]
pub struct Validator {
    pub index: usize,
    pub moniker: String,
    pub home_dir: PathBuf,
    /// Keyring entry name used with `--from`.
    pub key_name: String,
    pub keys: NodeKeys,
    pub ports: Ports,
    /// Set once the validator's configuration has been applied.
    pub config: Option<ValidatorConfig>,
}

impl Validator {
    /// Directory holding `genesis.json`, `config.toml` and `app.toml`.
    pub fn config_dir(&self) -> PathBuf {
        self.home_dir.join("config")
    }

    /// Persistent-peer address as seen from other containers.
    pub fn p2p_address(&self) -> String {
        format!("{}@{}:{}", self.keys.node_id, self.moniker, self.ports.p2p)
    }

    fn export(&self) -> ValidatorRef {
        ValidatorRef {
            index: self.index,
            moniker: self.moniker.clone(),
            home_dir: self.home_dir.clone(),
            key_name: self.key_name.clone(),
            node_id: self.keys.node_id.clone(),
            validator_pubkey: self.keys.validator_pubkey.clone(),
            address: self.keys.address.clone(),
            ports: self.ports,
        }
    }
}

/// A chain under construction.
///
/// Mutable only inside this crate; other components observe it through
/// [`ChainDescriptor`].
#[derive(Debug, Clone)]
pub struct Chain {
    pub(crate) id: String,
    pub(crate) data_dir: PathBuf,
    pub(crate) validators: Vec<Validator>,
    pub(crate) genesis: Option<GenesisState>,
}

impl Chain {
    /// Allocate a chain rooted at `<data_dir>/<id>`.
    pub(crate) fn new(id: &str, data_dir: &Path) -> ChainResult<Self> {
        if id.trim().is_empty() {
            return Err(ChainError::Provisioner("chain id must not be empty".to_string()));
        }
        let chain = Self {
            id: id.to_string(),
            data_dir: data_dir.to_path_buf(),
            validators: Vec::new(),
            genesis: None,
        };
        std::fs::create_dir_all(chain.root_dir())?;
        Ok(chain)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding every validator home of this chain.
    pub fn root_dir(&self) -> PathBuf {
        self.data_dir.join(&self.id)
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn genesis(&self) -> Option<&GenesisState> {
        self.genesis.as_ref()
    }

    fn configured_count(&self) -> usize {
        self.validators.iter().filter(|v| v.config.is_some()).count()
    }

    /// Snapshot the chain into a descriptor.
    ///
    /// Fails unless genesis exists and every validator has been configured.
    pub(crate) fn export(&self) -> ChainResult<ChainDescriptor> {
        if self.genesis.is_none() {
            return Err(ChainError::GenesisMissing(self.id.clone()));
        }
        let configured = self.configured_count();
        if configured != self.validators.len() || self.validators.is_empty() {
            return Err(ChainError::NotFinalized {
                chain_id: self.id.clone(),
                configured,
                total: self.validators.len(),
            });
        }
        Ok(ChainDescriptor {
            id: self.id.clone(),
            data_dir: self.data_dir.clone(),
            validators: self.validators.iter().map(Validator::export).collect(),
        })
    }
}

/// Read-only view of one exported validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatorRef {
    pub index: usize,
    pub moniker: String,
    pub home_dir: PathBuf,
    pub key_name: String,
    pub node_id: String,
    pub validator_pubkey: String,
    pub address: String,
    pub ports: Ports,
}

/// Immutable export of a built chain.
///
/// Owns copies of everything it exposes, so nothing done to the originating
/// [`Chain`] afterwards is visible through it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainDescriptor {
    id: String,
    data_dir: PathBuf,
    validators: Vec<ValidatorRef>,
}

impl ChainDescriptor {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Validators in index order.
    pub fn validators(&self) -> &[ValidatorRef] {
        &self.validators
    }

    pub fn validator(&self, index: usize) -> Option<&ValidatorRef> {
        self.validators.get(index)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
