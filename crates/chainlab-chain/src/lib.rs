//! Chainlab Chain - validator and chain descriptor builder
//!
//! Turns a declarative validator list into a chain on disk:
//! - Allocates node identities and home directories
//! - Writes the shared genesis state
//! - Applies per-validator node and app configuration
//! - Exports an immutable [`ChainDescriptor`] for later stages

pub mod builder;
pub mod chain;
pub mod coin;
pub mod config;
pub mod error;
pub mod genesis;
pub mod provisioner;

pub use builder::{init, init_from_setup, ChainBuilder};
pub use chain::{Chain, ChainDescriptor, NodeKeys, Ports, Validator, ValidatorRef};
pub use coin::Coin;
pub use config::{ChainSetup, GenesisConfig, Pruning, ValidatorConfig};
pub use error::{BuildStep, ChainError, ChainResult};
pub use genesis::GenesisState;
pub use provisioner::{FsProvisioner, NodeProvisioner, VALIDATOR_KEY_NAME};
