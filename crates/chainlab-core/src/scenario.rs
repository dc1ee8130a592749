//! Software-upgrade scenario: submit, deposit, vote, then wait for the
//! upgrade height.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::context::OrchestrationContext;
use crate::error::{HarnessError, HarnessResult};
use crate::exec::ContainerId;
use crate::governance::{GovernanceWorkflow, Resolution};
use crate::runner::TaskRunner;
use crate::status::{parse_latest_height, StatusPoller};
use crate::step::{StepRecord, StepRunner, StepStatus};

/// Summary of one scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub chain_id: String,
    pub proposal_id: u64,
    /// Checked commands that passed.
    pub succeeded: usize,
    /// Checked commands that failed.
    pub failed: usize,
    /// Read-only queries that completed.
    pub probes: usize,
    /// Read-only queries that could not run; these never fail the scenario.
    pub probe_failures: usize,
    pub final_height: u64,
    /// Proposal status reported once the upgrade height was reached.
    pub resolution: Resolution,
    pub records: Vec<StepRecord>,
}

impl ScenarioReport {
    fn from_records(
        chain_id: &str,
        proposal_id: u64,
        final_height: u64,
        resolution: Resolution,
        records: Vec<StepRecord>,
    ) -> Self {
        let count = |status| records.iter().filter(|r| r.status == status).count();
        Self {
            chain_id: chain_id.to_string(),
            proposal_id,
            succeeded: count(StepStatus::Passed),
            failed: count(StepStatus::AssertionFailed) + count(StepStatus::InfraFailed),
            probes: count(StepStatus::Probed),
            probe_failures: count(StepStatus::ProbeFailed),
            final_height,
            resolution,
            records,
        }
    }
}

pub struct UpgradeScenario<'a> {
    steps: &'a StepRunner,
    config: &'a HarnessConfig,
}

impl<'a> UpgradeScenario<'a> {
    pub fn new(steps: &'a StepRunner, config: &'a HarnessConfig) -> Self {
        Self { steps, config }
    }

    /// Drive `chain_id` through a full upgrade governance cycle, then read
    /// back the proposal status.
    ///
    /// Stops at the first failure; the journal keeps everything issued up to
    /// that point. A failed status read leaves the resolution `Unknown`.
    pub async fn run(
        &self,
        ctx: &mut OrchestrationContext,
        chain_id: &str,
    ) -> HarnessResult<ScenarioReport> {
        let journal_start = self.steps.journal().records().len();
        let governance =
            GovernanceWorkflow::new(self.steps, &self.config.binaries, &self.config.governance)
                .with_runner(TaskRunner::from_config(&self.config.runner));

        let mut proposal = governance.submit_proposal(ctx, chain_id).await?;
        governance.deposit_proposal(ctx, &mut proposal).await?;
        governance.vote_proposal(ctx, &mut proposal).await?;

        let container = ctx.validator_container(chain_id, 0)?.clone();
        let height = self
            .wait_for_height(&container, proposal.upgrade_height)
            .await?;

        let resolution = match governance.proposal_status(ctx, &proposal).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(chain_id = %chain_id, error = %e, "proposal status query failed");
                Resolution::Unknown
            }
        };

        let records = self.steps.journal().records().split_off(journal_start);
        let report =
            ScenarioReport::from_records(chain_id, proposal.id.0, height, resolution, records);
        info!(
            chain_id = %chain_id,
            succeeded = report.succeeded,
            failed = report.failed,
            height,
            resolution = ?report.resolution,
            "upgrade scenario finished"
        );
        Ok(report)
    }

    /// Poll `container` until its latest height reaches `target`.
    ///
    /// Unreachable or unparsable status counts as an attempt; nodes are
    /// expected to stall briefly around the upgrade height.
    pub async fn wait_for_height(&self, container: &ContainerId, target: u64) -> HarnessResult<u64> {
        let poller = StatusPoller::new(self.steps, &self.config.binaries);
        let interval = Duration::from_millis(self.config.poll.interval_ms);
        let mut last_seen = None;

        for attempt in 1..=self.config.poll.max_attempts {
            match poller.chain_status(container).await {
                Ok(status) => {
                    if let Some(height) = parse_latest_height(&status) {
                        last_seen = Some(height);
                        if height >= target {
                            info!(container = %container, height, target, "reached target height");
                            return Ok(height);
                        }
                    }
                }
                Err(e) => {
                    warn!(container = %container, attempt, error = %e, "status query failed");
                }
            }
            if attempt < self.config.poll.max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(HarnessError::HeightNotReached {
            container: container.clone(),
            target,
            attempts: self.config.poll.max_attempts,
            last_seen,
        })
    }
}
