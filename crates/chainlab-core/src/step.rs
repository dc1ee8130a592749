//! Checked workflow steps and the journal they write to.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::exec::{CommandExecutor, ContainerId, ExecOutput};
use crate::outcome::{CommandOutcome, OutcomeJudge, ReasonCode, SubstringJudge, SuccessMarker};

/// How a journaled step ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Completed and the success marker was present.
    Passed,
    /// Completed but the success marker was missing.
    AssertionFailed,
    /// Could not be created, started or finished in time.
    InfraFailed,
    /// Unchecked read-only query that completed.
    Probed,
    /// Unchecked read-only query that hit an infrastructure failure.
    ProbeFailed,
}

/// One exec as seen by the journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub step: String,
    pub container: ContainerId,
    pub argv: Vec<String>,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

/// Append-only log of every exec issued through a [`StepRunner`].
#[derive(Debug, Clone, Default)]
pub struct ExecJournal {
    records: Arc<Mutex<Vec<StepRecord>>>,
}

impl ExecJournal {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, record: StepRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }

    pub fn records(&self) -> Vec<StepRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.records().iter().filter(|r| r.status == status).count()
    }

    pub fn passed_count(&self) -> usize {
        self.count(StepStatus::Passed)
    }

    /// Failed checked steps; failed read-only queries are not included.
    pub fn failed_count(&self) -> usize {
        self.count(StepStatus::AssertionFailed) + self.count(StepStatus::InfraFailed)
    }
}

/// Runs commands through a [`CommandExecutor`], judges them, and journals the
/// result.
#[derive(Clone)]
pub struct StepRunner {
    executor: CommandExecutor,
    judge: Arc<dyn OutcomeJudge>,
    journal: ExecJournal,
}

impl StepRunner {
    pub fn new(executor: CommandExecutor) -> Self {
        Self {
            executor,
            judge: Arc::new(SubstringJudge),
            journal: ExecJournal::new(),
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn OutcomeJudge>) -> Self {
        self.judge = judge;
        self
    }

    pub fn journal(&self) -> &ExecJournal {
        &self.journal
    }

    /// Run a command that must print `marker` to count as a success.
    pub async fn run_checked(
        &self,
        step: &str,
        container: &ContainerId,
        argv: Vec<String>,
        marker: &SuccessMarker,
    ) -> HarnessResult<ExecOutput> {
        info!(step = %step, container = %container, "running step");
        let started_at = Utc::now();
        let start = Instant::now();

        let result = self.executor.exec_step(step, container, &argv).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let mut record = StepRecord {
            step: step.to_string(),
            container: container.clone(),
            argv,
            status: StepStatus::Passed,
            duration_ms,
            started_at,
        };

        let output = match result {
            Ok(output) => output,
            Err(source) => {
                error!(step = %step, container = %container, error = %source, "step infrastructure failure");
                record.status = StepStatus::InfraFailed;
                self.journal.push(record);
                return Err(HarnessError::Infra {
                    step: step.to_string(),
                    container: container.clone(),
                    source,
                });
            }
        };

        match self.judge.judge(&output, marker) {
            CommandOutcome::Success => {
                info!(step = %step, container = %container, duration_ms, "step passed");
                self.journal.push(record);
                Ok(output)
            }
            CommandOutcome::Failure {
                reason: ReasonCode::MarkerMissing { stream, marker },
            } => {
                warn!(
                    step = %step,
                    container = %container,
                    stream = %stream,
                    marker = %marker,
                    "step output lacks success marker"
                );
                record.status = StepStatus::AssertionFailed;
                self.journal.push(record);
                Err(HarnessError::Assertion {
                    step: step.to_string(),
                    container: container.clone(),
                    marker,
                    stream,
                    stdout: output.stdout_lossy(),
                    stderr: output.stderr_lossy(),
                })
            }
        }
    }

    /// Run a read-only query; only infrastructure failures are errors.
    pub async fn run_probe(
        &self,
        step: &str,
        container: &ContainerId,
        argv: Vec<String>,
    ) -> HarnessResult<ExecOutput> {
        let started_at = Utc::now();
        let start = Instant::now();
        let result = self.executor.exec_step(step, container, &argv).await;

        let status = if result.is_ok() {
            StepStatus::Probed
        } else {
            StepStatus::ProbeFailed
        };
        self.journal.push(StepRecord {
            step: step.to_string(),
            container: container.clone(),
            argv,
            status,
            duration_ms: start.elapsed().as_millis() as u64,
            started_at,
        });

        result.map_err(|source| HarnessError::Infra {
            step: step.to_string(),
            container: container.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Reply, ScriptedRuntime};

    fn runner(runtime: Arc<ScriptedRuntime>) -> StepRunner {
        StepRunner::new(CommandExecutor::new(runtime))
    }

    fn argv() -> Vec<String> {
        vec!["ledgerd".to_string(), "tx".to_string()]
    }

    #[tokio::test]
    async fn test_checked_step_passes_on_marker() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.push(Reply::stdout("height: 3\ncode: 0\n"));
        let steps = runner(runtime);

        steps
            .run_checked("submit", &ContainerId::new("v0"), argv(), &SuccessMarker::stdout("code: 0"))
            .await
            .unwrap();

        assert_eq!(steps.journal().passed_count(), 1);
        assert_eq!(steps.journal().failed_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_marker_is_assertion_failure() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.push(Reply::output("code: 4", "unauthorized"));
        let steps = runner(runtime);

        let err = steps
            .run_checked("deposit", &ContainerId::new("v0"), argv(), &SuccessMarker::stdout("code: 0"))
            .await
            .unwrap_err();

        assert!(err.is_assertion());
        assert_eq!(steps.journal().count(StepStatus::AssertionFailed), 1);
    }

    #[tokio::test]
    async fn test_infra_failure_is_journaled() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.push(Reply::CreateFails("daemon down".into()));
        let steps = runner(runtime);

        let err = steps
            .run_checked("vote", &ContainerId::new("v1"), argv(), &SuccessMarker::stdout("code: 0"))
            .await
            .unwrap_err();

        assert!(err.is_infra());
        let records = steps.journal().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, StepStatus::InfraFailed);
        assert_eq!(records[0].container, ContainerId::new("v1"));
    }

    #[tokio::test]
    async fn test_probe_does_not_judge_output() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.push(Reply::stderr("{}"));
        let steps = runner(runtime);

        let output = steps
            .run_probe("status", &ContainerId::new("v0"), argv())
            .await
            .unwrap();
        assert_eq!(output.stderr, b"{}");
        assert_eq!(steps.journal().count(StepStatus::Probed), 1);
        assert_eq!(steps.journal().passed_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_query_is_not_a_failed_step() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.push(Reply::CreateFails("daemon down".into()));
        let steps = runner(runtime);

        let err = steps
            .run_probe("status", &ContainerId::new("v0"), argv())
            .await
            .unwrap_err();

        assert!(err.is_infra());
        assert_eq!(steps.journal().count(StepStatus::ProbeFailed), 1);
        assert_eq!(steps.journal().failed_count(), 0);
    }
}
