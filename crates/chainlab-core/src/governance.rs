//! Software-upgrade governance workflow.
//!
//! A proposal moves `Created -> Submitted -> Deposited -> Voted`. Every
//! transaction runs on a validator container and must print the configured
//! success marker on stdout. Votes are issued in validator order through a
//! [`TaskRunner`] and stop at the first failure.

use std::fmt;
use std::sync::Mutex;

use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::{BinaryConfig, GovernanceConfig};
use crate::context::{OrchestrationContext, ProposalId};
use crate::error::{HarnessError, HarnessResult};
use crate::outcome::SuccessMarker;
use crate::runner::TaskRunner;
use crate::step::StepRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalState {
    Created,
    Submitted,
    Deposited,
    /// Every validator voted yes.
    Voted { count: usize },
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalState::Created => f.write_str("created"),
            ProposalState::Submitted => f.write_str("submitted"),
            ProposalState::Deposited => f.write_str("deposited"),
            ProposalState::Voted { count } => write!(f, "voted ({count})"),
        }
    }
}

/// Final result as reported by the chain once the voting period ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Passed,
    Failed,
    Unknown,
}

/// Upgrade proposal tracked through one test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub id: ProposalId,
    pub chain_id: String,
    pub upgrade_name: String,
    pub upgrade_height: u64,
    pub state: ProposalState,
    /// Validator indices whose vote succeeded.
    pub voters: Vec<usize>,
}

impl Proposal {
    fn require(&self, expected: ProposalState, action: &'static str) -> HarnessResult<()> {
        if self.state != expected {
            return Err(HarnessError::ProposalOrder {
                proposal_id: self.id.0,
                action,
                state: self.state.to_string(),
            });
        }
        Ok(())
    }
}

pub struct GovernanceWorkflow<'a> {
    steps: &'a StepRunner,
    binaries: &'a BinaryConfig,
    config: &'a GovernanceConfig,
    runner: TaskRunner,
}

impl<'a> GovernanceWorkflow<'a> {
    pub fn new(
        steps: &'a StepRunner,
        binaries: &'a BinaryConfig,
        config: &'a GovernanceConfig,
    ) -> Self {
        Self {
            steps,
            binaries,
            config,
            runner: TaskRunner::Sequential,
        }
    }

    pub fn with_runner(mut self, runner: TaskRunner) -> Self {
        self.runner = runner;
        self
    }

    fn tx_marker(&self) -> SuccessMarker {
        SuccessMarker::stdout(&self.config.tx_success_marker)
    }

    /// Flags shared by every governance transaction.
    fn tx_flags(&self, chain_id: &str) -> Vec<String> {
        vec![
            format!("--from={}", self.config.key_name),
            format!("--chain-id={chain_id}"),
            format!("-b={}", self.config.broadcast_mode),
            "--yes".to_string(),
            format!("--keyring-backend={}", self.config.keyring_backend),
        ]
    }

    pub fn submit_argv(&self, chain_id: &str) -> Vec<String> {
        let mut argv = vec![
            self.binaries.node.clone(),
            "tx".to_string(),
            "gov".to_string(),
            "submit-proposal".to_string(),
            "software-upgrade".to_string(),
            self.config.upgrade_name.clone(),
            format!("--title={}", self.config.title),
            format!("--description={}", self.config.description),
            format!("--upgrade-height={}", self.config.upgrade_height),
            "--upgrade-info=".to_string(),
        ];
        argv.extend(self.tx_flags(chain_id));
        argv
    }

    pub fn deposit_argv(&self, chain_id: &str, proposal: ProposalId) -> Vec<String> {
        let mut argv = vec![
            self.binaries.node.clone(),
            "tx".to_string(),
            "gov".to_string(),
            "deposit".to_string(),
            proposal.to_string(),
            self.config.deposit.clone(),
        ];
        argv.extend(self.tx_flags(chain_id));
        argv
    }

    pub fn vote_argv(&self, chain_id: &str, proposal: ProposalId) -> Vec<String> {
        let mut argv = vec![
            self.binaries.node.clone(),
            "tx".to_string(),
            "gov".to_string(),
            "vote".to_string(),
            proposal.to_string(),
            "yes".to_string(),
        ];
        argv.extend(self.tx_flags(chain_id));
        argv
    }

    /// Submit the upgrade proposal from validator 0.
    ///
    /// The proposal id is read from the transaction output when present and
    /// recorded in the context topology.
    #[instrument(skip(self, ctx))]
    pub async fn submit_proposal(
        &self,
        ctx: &mut OrchestrationContext,
        chain_id: &str,
    ) -> HarnessResult<Proposal> {
        ctx.chain(chain_id)?;
        let container = ctx.validator_container(chain_id, 0)?.clone();

        let output = self
            .steps
            .run_checked(
                "submit_proposal",
                &container,
                self.submit_argv(chain_id),
                &self.tx_marker(),
            )
            .await?;

        let id = match parse_proposal_id(&output.stdout_lossy()) {
            Some(id) => id,
            None => {
                warn!(
                    chain_id = %chain_id,
                    fallback = self.config.default_proposal_id,
                    "proposal id not found in submit output"
                );
                ProposalId(self.config.default_proposal_id)
            }
        };
        ctx.topology.set_proposal(chain_id, id);
        info!(chain_id = %chain_id, proposal_id = %id, "submitted upgrade proposal");

        Ok(Proposal {
            id,
            chain_id: chain_id.to_string(),
            upgrade_name: self.config.upgrade_name.clone(),
            upgrade_height: self.config.upgrade_height,
            state: ProposalState::Submitted,
            voters: Vec::new(),
        })
    }

    /// Deposit the configured amount from validator 0.
    #[instrument(skip(self, ctx, proposal), fields(chain_id = %proposal.chain_id, proposal_id = %proposal.id))]
    pub async fn deposit_proposal(
        &self,
        ctx: &OrchestrationContext,
        proposal: &mut Proposal,
    ) -> HarnessResult<()> {
        proposal.require(ProposalState::Submitted, "deposit")?;
        let container = ctx.validator_container(&proposal.chain_id, 0)?;

        self.steps
            .run_checked(
                "deposit_proposal",
                container,
                self.deposit_argv(&proposal.chain_id, proposal.id),
                &self.tx_marker(),
            )
            .await?;

        proposal.state = ProposalState::Deposited;
        info!("deposited to proposal");
        Ok(())
    }

    /// Vote yes from every validator, in validator order, stopping at the
    /// first failure.
    #[instrument(skip(self, ctx, proposal), fields(chain_id = %proposal.chain_id, proposal_id = %proposal.id))]
    pub async fn vote_proposal(
        &self,
        ctx: &OrchestrationContext,
        proposal: &mut Proposal,
    ) -> HarnessResult<()> {
        proposal.require(ProposalState::Deposited, "vote")?;
        let containers = ctx.validator_containers(&proposal.chain_id)?.to_vec();
        let argv = self.vote_argv(&proposal.chain_id, proposal.id);
        let marker = self.tx_marker();
        let voters = Mutex::new(Vec::new());

        let result = self
            .runner
            .run_ordered(containers, |index, container| {
                let argv = argv.clone();
                let marker = &marker;
                let voters = &voters;
                async move {
                    self.steps
                        .run_checked("vote_proposal", &container, argv, marker)
                        .await?;
                    if let Ok(mut voters) = voters.lock() {
                        voters.push(index);
                    }
                    info!(validator = index, container = %container, "voted for proposal");
                    Ok::<_, HarnessError>(())
                }
            })
            .await;

        let mut voters = voters.into_inner().unwrap_or_default();
        voters.sort_unstable();
        proposal.voters = voters;
        result?;

        proposal.state = ProposalState::Voted {
            count: proposal.voters.len(),
        };
        Ok(())
    }

    /// Query the proposal's status from validator 0.
    pub async fn proposal_status(
        &self,
        ctx: &OrchestrationContext,
        proposal: &Proposal,
    ) -> HarnessResult<Resolution> {
        let container = ctx.validator_container(&proposal.chain_id, 0)?;
        let argv = vec![
            self.binaries.node.clone(),
            "query".to_string(),
            "gov".to_string(),
            "proposal".to_string(),
            proposal.id.to_string(),
        ];
        let output = self
            .steps
            .run_probe("proposal_status", container, argv)
            .await?;
        Ok(parse_resolution(&output.stdout_lossy()))
    }
}

/// Extract the `proposal_id` event attribute from tx output (YAML or JSON).
pub fn parse_proposal_id(output: &str) -> Option<ProposalId> {
    let re = Regex::new(r#"proposal_id["\s,:]*(?:value["\s]*:[\s"]*)?(\d+)"#).ok()?;
    let caps = re.captures(output)?;
    caps.get(1)?.as_str().parse().ok().map(ProposalId)
}

pub fn parse_resolution(output: &str) -> Resolution {
    if output.contains("PROPOSAL_STATUS_PASSED") {
        Resolution::Passed
    } else if output.contains("PROPOSAL_STATUS_REJECTED")
        || output.contains("PROPOSAL_STATUS_FAILED")
    {
        Resolution::Failed
    } else {
        Resolution::Unknown
    }
}
