//! Governance upgrade workflow tests against a scripted container runtime.

use std::sync::Arc;

use chainlab_chain::ValidatorConfig;
use chainlab_core::fakes::{Reply, ScriptedRuntime};
use chainlab_core::{
    CommandExecutor, ContainerId, FailureKind, GovernanceWorkflow, HarnessConfig, HarnessError,
    OrchestrationContext, Proposal, ProposalId, ProposalState, Resolution, RunnerMode,
    StepRunner, UpgradeScenario,
};
use tempfile::TempDir;

const CHAIN: &str = "chain-a";

fn context(dir: &TempDir, validators: usize) -> OrchestrationContext {
    let descriptor = chainlab_chain::init(
        CHAIN,
        dir.path(),
        &vec![ValidatorConfig::default(); validators],
    )
    .expect("chain init failed");
    let containers = (0..validators)
        .map(|i| ContainerId::new(format!("{CHAIN}-val-{i}")))
        .collect();

    let mut ctx = OrchestrationContext::new();
    ctx.add_chain(descriptor, containers).unwrap();
    ctx
}

fn config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.poll.interval_ms = 10;
    config.poll.max_attempts = 5;
    config
}

fn status(height: u64) -> Reply {
    Reply::stderr(format!(
        r#"{{"NodeInfo":{{}},"SyncInfo":{{"latest_block_height":"{height}","catching_up":false}}}}"#
    ))
}

fn proposal_passed() -> Reply {
    Reply::stdout("proposal_id: \"1\"\nstatus: PROPOSAL_STATUS_PASSED\n")
}

fn tx_ok() -> Reply {
    Reply::stdout("height: \"12\"\ntxhash: ABCD\ncode: 0\n")
}

fn steps(runtime: &Arc<ScriptedRuntime>) -> StepRunner {
    StepRunner::new(CommandExecutor::new(runtime.clone()))
}

/// Test: all-success scenario issues 1 submit + 1 deposit + n votes
#[tokio::test(start_paused = true)]
async fn test_full_scenario_all_success() {
    let dir = tempfile::tempdir().unwrap();
    let n = 3;
    let mut ctx = context(&dir, n);
    let config = config();

    let runtime = Arc::new(ScriptedRuntime::new());
    runtime.push(Reply::stdout(
        "code: 0\nlogs:\n- events:\n  - attributes:\n    - key: proposal_id\n      value: \"1\"\n",
    ));
    runtime.push(tx_ok());
    for _ in 0..n {
        runtime.push(tx_ok());
    }
    runtime.push(status(60));
    runtime.push(status(75));
    runtime.push(proposal_passed());

    let steps = steps(&runtime);
    let report = UpgradeScenario::new(&steps, &config)
        .run(&mut ctx, CHAIN)
        .await
        .expect("scenario failed");

    assert_eq!(report.failed, 0);
    assert_eq!(report.succeeded, 1 + 1 + n);
    assert_eq!(report.probes, 3);
    assert_eq!(report.probe_failures, 0);
    assert_eq!(report.final_height, 75);
    assert_eq!(report.resolution, Resolution::Passed);
    assert_eq!(report.proposal_id, 1);
    assert_eq!(ctx.topology.proposal(CHAIN), Some(ProposalId(1)));

    // submit and deposit go to validator 0, votes go to each validator in order
    let requests = runtime.requests();
    assert_eq!(requests[0].container.as_str(), "chain-a-val-0");
    assert_eq!(requests[1].container.as_str(), "chain-a-val-0");
    let voters: Vec<_> = runtime
        .requests_with("vote")
        .into_iter()
        .map(|r| r.container.to_string())
        .collect();
    assert_eq!(voters, vec!["chain-a-val-0", "chain-a-val-1", "chain-a-val-2"]);
}

/// Test: a status query that cannot run is retried and not reported as a failed step
#[tokio::test(start_paused = true)]
async fn test_transient_status_failure_is_not_a_failed_step() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(&dir, 1);
    let config = config();

    let runtime = Arc::new(ScriptedRuntime::new());
    runtime.push(tx_ok());
    runtime.push(tx_ok());
    runtime.push(tx_ok());
    runtime.push(Reply::CreateFails("container restarting".into()));
    runtime.push(status(75));
    runtime.push(proposal_passed());

    let steps = steps(&runtime);
    let report = UpgradeScenario::new(&steps, &config)
        .run(&mut ctx, CHAIN)
        .await
        .expect("scenario failed");

    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.probes, 2);
    assert_eq!(report.probe_failures, 1);
    assert_eq!(report.final_height, 75);
}

/// Test: the proposal status is read from validator 0 after the upgrade height
#[tokio::test(start_paused = true)]
async fn test_resolution_unknown_when_status_query_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(&dir, 2);
    let config = config();

    let runtime = Arc::new(ScriptedRuntime::new());
    for _ in 0..4 {
        runtime.push(tx_ok());
    }
    runtime.push(status(80));
    runtime.push(Reply::StartFails("connection reset".into()));

    let steps = steps(&runtime);
    let report = UpgradeScenario::new(&steps, &config)
        .run(&mut ctx, CHAIN)
        .await
        .expect("scenario failed");

    assert_eq!(report.resolution, Resolution::Unknown);
    assert_eq!(report.failed, 0);
    assert_eq!(report.probe_failures, 1);

    let query = &runtime.requests_with("query")[0];
    assert_eq!(query.container.as_str(), "chain-a-val-0");
    assert_eq!(query.argv, vec!["ledgerd", "query", "gov", "proposal", "1"]);
}

/// Test: a failing vote stops the remaining validators from voting
#[tokio::test]
async fn test_vote_fail_fast_on_second_validator() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(&dir, 3);
    let config = config();

    let runtime = Arc::new(ScriptedRuntime::new());
    runtime.push(tx_ok());
    runtime.push(tx_ok());
    runtime.push(tx_ok());
    runtime.push(Reply::output("code: 5\nraw_log: insufficient funds", ""));
    runtime.push(tx_ok());

    let steps = steps(&runtime);
    let err = UpgradeScenario::new(&steps, &config)
        .run(&mut ctx, CHAIN)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::Assertion);
    match &err {
        HarnessError::Assertion {
            step, container, ..
        } => {
            assert_eq!(step, "vote_proposal");
            assert_eq!(container.as_str(), "chain-a-val-1");
        }
        other => panic!("expected Assertion, got {:?}", other),
    }
    assert_eq!(runtime.requests_with("vote").len(), 2);
    assert_eq!(steps.journal().passed_count(), 3);
    assert_eq!(steps.journal().failed_count(), 1);
}

/// Test: an infrastructure failure mid-vote is reported as infrastructure
#[tokio::test]
async fn test_vote_infra_failure_stops_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir, 3);
    let config = config();

    let runtime = Arc::new(ScriptedRuntime::new());
    runtime.push(tx_ok());
    runtime.push(Reply::CreateFails("container not running".into()));

    let steps = steps(&runtime);
    let gov = GovernanceWorkflow::new(&steps, &config.binaries, &config.governance);
    let mut proposal = Proposal {
        id: ProposalId(1),
        chain_id: CHAIN.to_string(),
        upgrade_name: "v2".to_string(),
        upgrade_height: 75,
        state: ProposalState::Deposited,
        voters: vec![],
    };

    let err = gov.vote_proposal(&ctx, &mut proposal).await.unwrap_err();
    assert!(err.is_infra());
    assert_eq!(runtime.requests_with("vote").len(), 2);
    assert_eq!(proposal.voters, vec![0]);
    assert_eq!(proposal.state, ProposalState::Deposited);
}

/// Test: deposit before submit is rejected without issuing a command
#[tokio::test]
async fn test_deposit_requires_submitted_proposal() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir, 1);
    let config = config();
    let runtime = Arc::new(ScriptedRuntime::new());
    let steps = steps(&runtime);
    let gov = GovernanceWorkflow::new(&steps, &config.binaries, &config.governance);

    let mut proposal = Proposal {
        id: ProposalId(1),
        chain_id: CHAIN.to_string(),
        upgrade_name: "v2".to_string(),
        upgrade_height: 75,
        state: ProposalState::Created,
        voters: vec![],
    };
    let err = gov.deposit_proposal(&ctx, &mut proposal).await.unwrap_err();

    assert!(matches!(err, HarnessError::ProposalOrder { .. }));
    assert_eq!(err.kind(), FailureKind::Setup);
    assert!(runtime.requests().is_empty());
}

/// Test: the proposal id parsed from submit output is used for deposit and vote
#[tokio::test]
async fn test_parsed_proposal_id_threads_through() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(&dir, 1);
    let config = config();

    let runtime = Arc::new(ScriptedRuntime::with_fallback(tx_ok()));
    runtime.push(Reply::stdout(
        r#"{"code":0,"logs":[{"events":[{"attributes":[{"key":"proposal_id","value":"4"}]}]}]} code: 0"#,
    ));

    let steps = steps(&runtime);
    let gov = GovernanceWorkflow::new(&steps, &config.binaries, &config.governance);
    let mut proposal = gov.submit_proposal(&mut ctx, CHAIN).await.unwrap();
    gov.deposit_proposal(&ctx, &mut proposal).await.unwrap();
    gov.vote_proposal(&ctx, &mut proposal).await.unwrap();

    assert_eq!(proposal.id, ProposalId(4));
    assert_eq!(proposal.state, ProposalState::Voted { count: 1 });
    let deposit = &runtime.requests_with("deposit")[0];
    assert_eq!(deposit.argv[4], "4");
    let vote = &runtime.requests_with("vote")[0];
    assert_eq!(vote.argv[4], "4");
}

/// Test: submit falls back to the configured proposal id
#[tokio::test]
async fn test_submit_falls_back_to_default_proposal_id() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(&dir, 1);
    let mut config = config();
    config.governance.default_proposal_id = 9;

    let runtime = Arc::new(ScriptedRuntime::new());
    runtime.push(tx_ok());
    let steps = steps(&runtime);
    let gov = GovernanceWorkflow::new(&steps, &config.binaries, &config.governance);

    let proposal = gov.submit_proposal(&mut ctx, CHAIN).await.unwrap();
    assert_eq!(proposal.id, ProposalId(9));
    assert_eq!(proposal.state, ProposalState::Submitted);
}

/// Test: fan-out voting still votes once per validator
#[tokio::test]
async fn test_fan_out_voting() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(&dir, 4);
    let mut config = config();
    config.runner.mode = RunnerMode::FanOut;
    config.runner.max_concurrent = 2;

    let runtime = Arc::new(ScriptedRuntime::with_fallback(tx_ok()));
    let steps = steps(&runtime);
    let gov = GovernanceWorkflow::new(&steps, &config.binaries, &config.governance)
        .with_runner(chainlab_core::TaskRunner::from_config(&config.runner));

    let mut proposal = gov.submit_proposal(&mut ctx, CHAIN).await.unwrap();
    gov.deposit_proposal(&ctx, &mut proposal).await.unwrap();
    gov.vote_proposal(&ctx, &mut proposal).await.unwrap();

    assert_eq!(runtime.requests_with("vote").len(), 4);
    assert_eq!(proposal.voters, vec![0, 1, 2, 3]);
}

/// Test: height never reached is reported with the last observed height
#[tokio::test(start_paused = true)]
async fn test_height_not_reached() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(&dir, 1);
    let mut config = config();
    config.poll.max_attempts = 3;

    let runtime = Arc::new(ScriptedRuntime::with_fallback(status(10)));
    runtime.push(tx_ok());
    runtime.push(tx_ok());
    runtime.push(tx_ok());

    let steps = steps(&runtime);
    let err = UpgradeScenario::new(&steps, &config)
        .run(&mut ctx, CHAIN)
        .await
        .unwrap_err();

    match err {
        HarnessError::HeightNotReached {
            target,
            attempts,
            last_seen,
            ..
        } => {
            assert_eq!(target, 75);
            assert_eq!(attempts, 3);
            assert_eq!(last_seen, Some(10));
        }
        other => panic!("expected HeightNotReached, got {:?}", other),
    }
    assert_eq!(runtime.requests_with("status").len(), 3);
}

/// Test: unknown chain is a setup failure and issues nothing
#[tokio::test]
async fn test_unknown_chain() {
    let mut ctx = OrchestrationContext::new();
    let config = config();
    let runtime = Arc::new(ScriptedRuntime::new());
    let steps = steps(&runtime);

    let err = UpgradeScenario::new(&steps, &config)
        .run(&mut ctx, "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::UnknownChain(_)));
    assert!(runtime.requests().is_empty());
}
