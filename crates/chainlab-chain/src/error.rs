//! Error types for chain construction

use std::fmt;

use thiserror::Error;

/// Ordered steps of the chain build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStep {
    /// Allocate the chain and its data directory
    Allocate,
    /// Create validator node identities and home directories
    InitNodes,
    /// Generate the shared genesis state
    Genesis,
    /// Apply per-validator configuration
    ValidatorConfigs,
    /// Snapshot the chain into a descriptor
    Export,
}

impl BuildStep {
    /// Stable step name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            BuildStep::Allocate => "allocate",
            BuildStep::InitNodes => "init_nodes",
            BuildStep::Genesis => "genesis",
            BuildStep::ValidatorConfigs => "validator_configs",
            BuildStep::Export => "export",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur while building a chain
#[derive(Error, Debug)]
pub enum ChainError {
    /// A pipeline step failed; wraps the underlying cause
    #[error("chain build step `{step}` failed: {source}")]
    Step {
        step: BuildStep,
        #[source]
        source: Box<ChainError>,
    },

    /// No validator configs were supplied
    #[error("chain {0} requires at least one validator")]
    NoValidators(String),

    /// Validator configuration attempted before genesis existed
    #[error("genesis state missing for chain {0}")]
    GenesisMissing(String),

    /// Export attempted before every validator was configured
    #[error("chain {chain_id} not finalized: {configured}/{total} validators configured")]
    NotFinalized {
        chain_id: String,
        configured: usize,
        total: usize,
    },

    /// Validator config count does not match the node count
    #[error("expected {expected} validator configs, got {actual}")]
    ConfigCountMismatch { expected: usize, actual: usize },

    /// Coin string could not be parsed
    #[error("invalid coin: {0}")]
    InvalidCoin(String),

    /// Provisioner-specific failure
    #[error("provisioner error: {0}")]
    Provisioner(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl ChainError {
    /// Wrap an error with the pipeline step it occurred in.
    pub fn at(step: BuildStep, source: ChainError) -> Self {
        ChainError::Step {
            step,
            source: Box::new(source),
        }
    }

    /// The pipeline step that failed, if known.
    pub fn step(&self) -> Option<BuildStep> {
        match self {
            ChainError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type for chain construction
pub type ChainResult<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wrapper_names_step() {
        let err = ChainError::at(
            BuildStep::Genesis,
            ChainError::Provisioner("disk full".to_string()),
        );
        assert_eq!(err.step(), Some(BuildStep::Genesis));
        let msg = err.to_string();
        assert!(msg.contains("genesis"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_unwrapped_error_has_no_step() {
        let err = ChainError::NoValidators("c1".to_string());
        assert!(err.step().is_none());
    }
}
