//! Container runtime backed by the `docker` CLI.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use crate::exec::{ContainerRuntime, ExecId, ExecOutput, ExecRequest, RuntimeError};

const DAEMON_ERROR_PREFIX: &str = "Error response from daemon";

/// Runs execs through `docker exec`.
///
/// `create_exec` only registers the request; the process is spawned by
/// `start_exec`. The child is killed if the start future is dropped, so an
/// exec deadline also reaps the process.
#[derive(Debug)]
pub struct DockerCliRuntime {
    docker: String,
    pending: Mutex<HashMap<String, ExecRequest>>,
}

impl Default for DockerCliRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCliRuntime {
    pub fn new(docker: impl Into<String>) -> Self {
        Self {
            docker: docker.into(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn command_args(request: &ExecRequest) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if !request.user.is_empty() {
            args.push("--user".to_string());
            args.push(request.user.clone());
        }
        args.push(request.container.to_string());
        args.extend(request.argv.iter().cloned());
        args
    }
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    async fn create_exec(&self, request: ExecRequest) -> Result<ExecId, RuntimeError> {
        if request.container.as_str().is_empty() {
            return Err(RuntimeError("container id must not be empty".to_string()));
        }
        let id = Uuid::new_v4().to_string();
        self.pending
            .lock()
            .map_err(|_| RuntimeError("exec registry poisoned".to_string()))?
            .insert(id.clone(), request);
        Ok(ExecId(id))
    }

    async fn start_exec(&self, exec: &ExecId, output: &mut ExecOutput) -> Result<(), RuntimeError> {
        let request = self
            .pending
            .lock()
            .map_err(|_| RuntimeError("exec registry poisoned".to_string()))?
            .remove(&exec.0)
            .ok_or_else(|| RuntimeError(format!("unknown exec {}", exec.0)))?;

        let args = Self::command_args(&request);
        debug!(exec_id = %exec.0, container = %request.container, "spawning docker exec");

        let child = Command::new(&self.docker)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(if request.attach_stdout { Stdio::piped() } else { Stdio::null() })
            .stderr(if request.attach_stderr { Stdio::piped() } else { Stdio::null() })
            .kill_on_drop(true)
            .spawn()?;

        let result = child.wait_with_output().await?;
        output.stdout.extend_from_slice(&result.stdout);
        output.stderr.extend_from_slice(&result.stderr);

        // The remote exit code is not part of the contract, but daemon-side
        // failures must not look like command output.
        if !result.status.success()
            && String::from_utf8_lossy(&result.stderr).starts_with(DAEMON_ERROR_PREFIX)
        {
            return Err(RuntimeError(
                String::from_utf8_lossy(&result.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}
