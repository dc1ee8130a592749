//! Orchestration context passed explicitly into every workflow.
//!
//! Maps chain ids to their descriptors and validator containers, names the
//! relayer container, and carries topology resolved at runtime (open
//! channels, submitted proposals).

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chainlab_chain::ChainDescriptor;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::exec::ContainerId;

/// On-chain governance proposal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relay channel identifier, e.g. `channel-0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifiers resolved while the scenario runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topology {
    /// Keyed by `"<src>/<dst>"`; the channel on `src` leading to `dst`.
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelId>,
    /// Keyed like `channels`; the port bound on `src` for that channel.
    #[serde(default)]
    pub ports: BTreeMap<String, String>,
    /// Upgrade proposal per chain id.
    #[serde(default)]
    pub proposals: BTreeMap<String, ProposalId>,
}

impl Topology {
    fn channel_key(src: &str, dst: &str) -> String {
        format!("{src}/{dst}")
    }

    pub fn set_channel(&mut self, src: &str, dst: &str, channel: ChannelId) {
        self.channels.insert(Self::channel_key(src, dst), channel);
    }

    pub fn channel(&self, src: &str, dst: &str) -> Option<&ChannelId> {
        self.channels.get(&Self::channel_key(src, dst))
    }

    pub fn set_port(&mut self, src: &str, dst: &str, port: impl Into<String>) {
        self.ports.insert(Self::channel_key(src, dst), port.into());
    }

    pub fn port(&self, src: &str, dst: &str) -> Option<&str> {
        self.ports.get(&Self::channel_key(src, dst)).map(String::as_str)
    }

    pub fn set_proposal(&mut self, chain_id: &str, proposal: ProposalId) {
        self.proposals.insert(chain_id.to_string(), proposal);
    }

    pub fn proposal(&self, chain_id: &str) -> Option<ProposalId> {
        self.proposals.get(chain_id).copied()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestrationContext {
    chains: BTreeMap<String, ChainDescriptor>,
    validator_containers: BTreeMap<String, Vec<ContainerId>>,
    relayer: Option<ContainerId>,
    #[serde(default)]
    pub topology: Topology,
}

impl OrchestrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chain with one container per validator, in validator order.
    pub fn add_chain(
        &mut self,
        descriptor: ChainDescriptor,
        containers: Vec<ContainerId>,
    ) -> HarnessResult<()> {
        if containers.len() != descriptor.len() {
            return Err(HarnessError::Config(format!(
                "chain {} has {} validators but {} containers",
                descriptor.id(),
                descriptor.len(),
                containers.len()
            )));
        }
        let id = descriptor.id().to_string();
        self.validator_containers.insert(id.clone(), containers);
        self.chains.insert(id, descriptor);
        Ok(())
    }

    pub fn set_relayer(&mut self, container: ContainerId) {
        self.relayer = Some(container);
    }

    pub fn chain(&self, chain_id: &str) -> HarnessResult<&ChainDescriptor> {
        self.chains
            .get(chain_id)
            .ok_or_else(|| HarnessError::UnknownChain(chain_id.to_string()))
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// Containers of `chain_id` in validator order.
    pub fn validator_containers(&self, chain_id: &str) -> HarnessResult<&[ContainerId]> {
        self.validator_containers
            .get(chain_id)
            .map(Vec::as_slice)
            .ok_or_else(|| HarnessError::UnknownChain(chain_id.to_string()))
    }

    pub fn validator_container(&self, chain_id: &str, index: usize) -> HarnessResult<&ContainerId> {
        self.validator_containers(chain_id)?
            .get(index)
            .ok_or_else(|| HarnessError::MissingContainer {
                chain_id: chain_id.to_string(),
                index,
            })
    }

    pub fn relayer(&self) -> HarnessResult<&ContainerId> {
        self.relayer.as_ref().ok_or(HarnessError::MissingRelayer)
    }

    pub fn load(path: &Path) -> HarnessResult<Self> {
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        let raw = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}
