//! Chainlab Core - command execution and workflows for test clusters
//!
//! Talks to already-running validator and relayer containers:
//! - Executes commands under a bounded deadline ([`CommandExecutor`])
//! - Judges success from captured output ([`OutcomeJudge`])
//! - Drives governance upgrades and relayer bridging
//! - Probes node status for height gating

pub mod bridge;
pub mod config;
pub mod context;
pub mod docker;
pub mod error;
pub mod exec;
pub mod fakes;
pub mod governance;
pub mod outcome;
pub mod runner;
pub mod scenario;
pub mod status;
pub mod step;
pub mod telemetry;

pub use bridge::{parse_channel_ids, BridgeWorkflow};
pub use config::{
    BinaryConfig, BridgeConfig, ExecConfig, GovernanceConfig, HarnessConfig, PollConfig,
    RunnerConfig, RunnerMode,
};
pub use context::{ChannelId, OrchestrationContext, ProposalId, Topology};
pub use docker::DockerCliRuntime;
pub use error::{FailureKind, HarnessError, HarnessResult, InfraError};
pub use exec::{
    CommandExecutor, ContainerId, ContainerRuntime, ExecId, ExecOutput, ExecRequest,
    RuntimeError, DEFAULT_EXEC_DEADLINE,
};
pub use governance::{
    parse_proposal_id, GovernanceWorkflow, Proposal, ProposalState, Resolution,
};
pub use outcome::{
    contains_marker, CommandOutcome, OutcomeJudge, ReasonCode, Stream, SubstringJudge,
    SuccessMarker,
};
pub use runner::TaskRunner;
pub use scenario::{ScenarioReport, UpgradeScenario};
pub use status::{parse_latest_height, StatusPoller};
pub use step::{ExecJournal, StepRecord, StepRunner, StepStatus};
pub use telemetry::init_tracing;

/// Chainlab version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
