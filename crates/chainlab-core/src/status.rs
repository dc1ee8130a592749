//! Node status probe.

use serde_json::Value;

use crate::config::BinaryConfig;
use crate::error::HarnessResult;
use crate::exec::ContainerId;
use crate::step::StepRunner;

/// Runs `<node> status` and hands back the raw stderr.
///
/// The node binary prints its status JSON on stderr. No retry or waiting
/// happens here; callers that need a height poll this themselves.
pub struct StatusPoller<'a> {
    steps: &'a StepRunner,
    binaries: &'a BinaryConfig,
}

impl<'a> StatusPoller<'a> {
    pub fn new(steps: &'a StepRunner, binaries: &'a BinaryConfig) -> Self {
        Self { steps, binaries }
    }

    pub async fn chain_status(&self, container: &ContainerId) -> HarnessResult<Vec<u8>> {
        let argv = vec![self.binaries.node.clone(), "status".to_string()];
        let output = self.steps.run_probe("chain_status", container, argv).await?;
        Ok(output.stderr)
    }
}

/// Latest block height from status JSON.
///
/// Accepts both `SyncInfo` and `sync_info` spellings, with the height as a
/// string or a number.
pub fn parse_latest_height(status: &[u8]) -> Option<u64> {
    let value: Value = serde_json::from_slice(status).ok()?;
    let sync_info = value.get("SyncInfo").or_else(|| value.get("sync_info"))?;
    match sync_info.get("latest_block_height")? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
