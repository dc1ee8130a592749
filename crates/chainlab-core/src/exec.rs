//! Remote command execution inside running containers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, Instrument};

use crate::config::ExecConfig;
use crate::error::InfraError;
use crate::outcome::Stream;

/// Deadline applied to every exec unless configured otherwise.
pub const DEFAULT_EXEC_DEADLINE: Duration = Duration::from_secs(60);

/// Identity of a running container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle returned by the runtime for a created exec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecId(pub String);

/// Parameters for creating an exec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub container: ContainerId,
    pub user: String,
    pub argv: Vec<String>,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
}

/// Bytes captured from both output streams of one exec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecOutput {
    pub fn stream(&self, stream: Stream) -> &[u8] {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Failure reported by a [`ContainerRuntime`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct RuntimeError(pub String);

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError(err.to_string())
    }
}

/// Exec surface of the container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Register an exec bound to `request.container`.
    async fn create_exec(&self, request: ExecRequest) -> Result<ExecId, RuntimeError>;

    /// Run a created exec to completion, appending its streams to `output`.
    async fn start_exec(&self, exec: &ExecId, output: &mut ExecOutput) -> Result<(), RuntimeError>;
}

/// Runs one command in one container under a bounded deadline.
///
/// Each call is a single create + start; nothing is retried. When the
/// deadline fires, whatever was captured so far is dropped.
#[derive(Clone)]
pub struct CommandExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    deadline: Duration,
    user: String,
}

impl CommandExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            deadline: DEFAULT_EXEC_DEADLINE,
            user: "root".to_string(),
        }
    }

    pub fn from_config(runtime: Arc<dyn ContainerRuntime>, config: &ExecConfig) -> Self {
        Self {
            runtime,
            deadline: Duration::from_secs(config.deadline_secs),
            user: config.user.clone(),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Execute `argv` in `container` and capture both streams.
    pub async fn exec(
        &self,
        container: &ContainerId,
        argv: &[String],
    ) -> Result<ExecOutput, InfraError> {
        self.exec_step("exec", container, argv).await
    }

    /// Like [`exec`](Self::exec), with `step` recorded on the `chainlab.exec` span.
    pub async fn exec_step(
        &self,
        step: &str,
        container: &ContainerId,
        argv: &[String],
    ) -> Result<ExecOutput, InfraError> {
        if argv.is_empty() {
            return Err(InfraError::EmptyCommand {
                container: container.clone(),
            });
        }

        let request = ExecRequest {
            container: container.clone(),
            user: self.user.clone(),
            argv: argv.to_vec(),
            attach_stdout: true,
            attach_stderr: true,
        };

        let work = async {
            let exec_id = self
                .runtime
                .create_exec(request)
                .await
                .map_err(|e| InfraError::CreateFailed {
                    container: container.clone(),
                    reason: e.to_string(),
                })?;

            let mut output = ExecOutput::default();
            let started = self.runtime.start_exec(&exec_id, &mut output).await;
            started.map_err(|e| InfraError::StartFailed {
                container: container.clone(),
                reason: format!(
                    "{e}; stdout: {}, stderr: {}",
                    output.stdout_lossy(),
                    output.stderr_lossy()
                ),
            })?;
            Ok::<_, InfraError>(output)
        };

        let span = tracing::info_span!("chainlab.exec", container = %container, step = %step);
        match tokio::time::timeout(self.deadline, work.instrument(span)).await {
            Ok(result) => {
                if let Ok(output) = &result {
                    debug!(
                        container = %container,
                        stdout_bytes = output.stdout.len(),
                        stderr_bytes = output.stderr.len(),
                        "exec completed"
                    );
                }
                result
            }
            Err(_elapsed) => Err(InfraError::Timeout {
                container: container.clone(),
                limit_ms: self.deadline.as_millis() as u64,
            }),
        }
    }
}
