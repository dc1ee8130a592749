//! In-memory fakes for the container runtime (testing only)
//!
//! [`ScriptedRuntime`] replays queued [`Reply`] values in order and records
//! every exec request it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::exec::{ContainerRuntime, ExecId, ExecOutput, ExecRequest, RuntimeError};

/// Scripted behaviour for one exec.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Exec completes with these streams.
    Output { stdout: Vec<u8>, stderr: Vec<u8> },
    /// `create_exec` fails.
    CreateFails(String),
    /// `start_exec` fails.
    StartFails(String),
    /// `start_exec` never completes.
    Hang,
}

impl Reply {
    pub fn output(stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        Reply::Output {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn stdout(stdout: impl Into<Vec<u8>>) -> Self {
        Reply::output(stdout, Vec::new())
    }

    pub fn stderr(stderr: impl Into<Vec<u8>>) -> Self {
        Reply::output(Vec::new(), stderr)
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    queue: VecDeque<Reply>,
    fallback: Option<Reply>,
    requests: Vec<ExecRequest>,
    pending: HashMap<String, Reply>,
    next_id: u64,
}

/// Container runtime that replays scripted replies.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    state: Mutex<ScriptState>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used once the queue is exhausted.
    pub fn with_fallback(reply: Reply) -> Self {
        let runtime = Self::default();
        runtime.state.lock().unwrap().fallback = Some(reply);
        runtime
    }

    /// Queue the reply for the next exec.
    pub fn push(&self, reply: Reply) {
        self.state.lock().unwrap().queue.push_back(reply);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ExecRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests whose argv contains `word`.
    pub fn requests_with(&self, word: &str) -> Vec<ExecRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.argv.iter().any(|a| a == word))
            .collect()
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn create_exec(&self, request: ExecRequest) -> Result<ExecId, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request);

        let reply = state
            .queue
            .pop_front()
            .or_else(|| state.fallback.clone())
            .ok_or_else(|| RuntimeError("no scripted reply".to_string()))?;

        if let Reply::CreateFails(reason) = reply {
            return Err(RuntimeError(reason));
        }

        state.next_id += 1;
        let id = format!("exec-{}", state.next_id);
        state.pending.insert(id.clone(), reply);
        Ok(ExecId(id))
    }

    async fn start_exec(&self, exec: &ExecId, output: &mut ExecOutput) -> Result<(), RuntimeError> {
        let reply = self
            .state
            .lock()
            .unwrap()
            .pending
            .remove(&exec.0)
            .ok_or_else(|| RuntimeError(format!("unknown exec {}", exec.0)))?;

        match reply {
            Reply::Output { stdout, stderr } => {
                output.stdout.extend_from_slice(&stdout);
                output.stderr.extend_from_slice(&stderr);
                Ok(())
            }
            Reply::StartFails(reason) => Err(RuntimeError(reason)),
            Reply::Hang => std::future::pending().await,
            Reply::CreateFails(reason) => Err(RuntimeError(reason)),
        }
    }
}
