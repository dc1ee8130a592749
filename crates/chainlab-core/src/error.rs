//! Error taxonomy for command execution and workflows.
//!
//! Infrastructure failures (the exec could not be created, started, or
//! finished in time) and assertion failures (the exec finished but its output
//! lacks the success marker) are kept in separate variants so a report can
//! tell them apart.

use crate::exec::ContainerId;
use crate::outcome::Stream;

/// Failures of the container runtime or the exec deadline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InfraError {
    #[error("failed to create exec in container {container}: {reason}")]
    CreateFailed { container: ContainerId, reason: String },

    #[error("failed to start exec in container {container}: {reason}")]
    StartFailed { container: ContainerId, reason: String },

    #[error("exec in container {container} timed out after {limit_ms}ms")]
    Timeout { container: ContainerId, limit_ms: u64 },

    #[error("exec in container {container} has an empty command")]
    EmptyCommand { container: ContainerId },
}

impl InfraError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, InfraError::Timeout { .. })
    }
}

/// Broad class of a [`HarnessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The runtime or deadline failed.
    Infrastructure,
    /// The command ran but the chain or relay rejected the operation.
    Assertion,
    /// Missing chains, containers, bad config or out-of-order calls.
    Setup,
}

/// Errors surfaced by workflows and scenarios.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("step {step} on container {container}: {source}")]
    Infra {
        step: String,
        container: ContainerId,
        #[source]
        source: InfraError,
    },

    #[error(
        "step {step} on container {container}: {stream} lacks {marker:?}; stdout: {stdout}, stderr: {stderr}"
    )]
    Assertion {
        step: String,
        container: ContainerId,
        marker: String,
        stream: Stream,
        stdout: String,
        stderr: String,
    },

    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("chain {chain_id} has no container for validator {index}")]
    MissingContainer { chain_id: String, index: usize },

    #[error("no relayer container registered")]
    MissingRelayer,

    #[error("proposal {proposal_id} cannot {action} while {state}")]
    ProposalOrder {
        proposal_id: u64,
        action: &'static str,
        state: String,
    },

    #[error("container {container} did not reach height {target} after {attempts} polls (last seen {last_seen:?})")]
    HeightNotReached {
        container: ContainerId,
        target: u64,
        attempts: u32,
        last_seen: Option<u64>,
    },

    #[error("chain error: {0}")]
    Chain(#[from] chainlab_chain::ChainError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn kind(&self) -> FailureKind {
        match self {
            HarnessError::Infra { .. } => FailureKind::Infrastructure,
            HarnessError::Assertion { .. } => FailureKind::Assertion,
            _ => FailureKind::Setup,
        }
    }

    pub fn is_assertion(&self) -> bool {
        self.kind() == FailureKind::Assertion
    }

    pub fn is_infra(&self) -> bool {
        self.kind() == FailureKind::Infrastructure
    }

    /// Name of the workflow step that failed, when there was one.
    pub fn step(&self) -> Option<&str> {
        match self {
            HarnessError::Infra { step, .. } | HarnessError::Assertion { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Result type for workflow operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_separates_infra_and_assertion() {
        let infra = HarnessError::Infra {
            step: "vote".into(),
            container: ContainerId::new("c1"),
            source: InfraError::Timeout {
                container: ContainerId::new("c1"),
                limit_ms: 60_000,
            },
        };
        let assertion = HarnessError::Assertion {
            step: "vote".into(),
            container: ContainerId::new("c1"),
            marker: "code: 0".into(),
            stream: Stream::Stdout,
            stdout: "code: 5".into(),
            stderr: String::new(),
        };

        assert_eq!(infra.kind(), FailureKind::Infrastructure);
        assert!(infra.is_infra());
        assert_eq!(assertion.kind(), FailureKind::Assertion);
        assert!(assertion.is_assertion());
        assert_eq!(
            HarnessError::MissingRelayer.kind(),
            FailureKind::Setup
        );
    }

    #[test]
    fn test_assertion_message_carries_output() {
        let err = HarnessError::Assertion {
            step: "deposit".into(),
            container: ContainerId::new("val0"),
            marker: "code: 0".into(),
            stream: Stream::Stdout,
            stdout: "code: 13".into(),
            stderr: "insufficient fee".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("deposit"));
        assert!(msg.contains("val0"));
        assert!(msg.contains("code: 13"));
        assert!(msg.contains("insufficient fee"));
        assert_eq!(err.step(), Some("deposit"));
    }
}
