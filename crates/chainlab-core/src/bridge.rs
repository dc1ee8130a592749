//! Relayer workflow: open a channel between two chains and transfer tokens.

use chainlab_chain::Coin;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::config::{BinaryConfig, BridgeConfig};
use crate::context::{ChannelId, OrchestrationContext};
use crate::error::HarnessResult;
use crate::outcome::SuccessMarker;
use crate::step::StepRunner;

pub struct BridgeWorkflow<'a> {
    steps: &'a StepRunner,
    binaries: &'a BinaryConfig,
    config: &'a BridgeConfig,
}

impl<'a> BridgeWorkflow<'a> {
    pub fn new(steps: &'a StepRunner, binaries: &'a BinaryConfig, config: &'a BridgeConfig) -> Self {
        Self {
            steps,
            binaries,
            config,
        }
    }

    pub fn connect_argv(&self, chain_a: &str, chain_b: &str) -> Vec<String> {
        vec![
            self.binaries.relayer.clone(),
            "create".to_string(),
            "channel".to_string(),
            chain_a.to_string(),
            chain_b.to_string(),
            format!("--port-a={}", self.config.port_a),
            format!("--port-b={}", self.config.port_b),
        ]
    }

    pub fn transfer_argv(
        &self,
        src: &str,
        dst: &str,
        port: &str,
        channel: &ChannelId,
        recipient: &str,
        coin: &Coin,
    ) -> Vec<String> {
        vec![
            self.binaries.relayer.clone(),
            "tx".to_string(),
            "raw".to_string(),
            "ft-transfer".to_string(),
            dst.to_string(),
            src.to_string(),
            port.to_string(),
            channel.to_string(),
            coin.amount.to_string(),
            format!("--denom={}", coin.denom),
            format!("--receiver={recipient}"),
            format!("--timeout-height-offset={}", self.config.timeout_height_offset),
        ]
    }

    /// Open a channel between `chain_a` and `chain_b`.
    ///
    /// The relayer reports success on stderr. Not idempotent: calling it
    /// twice for the same pair opens a second channel.
    #[instrument(skip(self, ctx))]
    pub async fn connect_ibc_chains(
        &self,
        ctx: &mut OrchestrationContext,
        chain_a: &str,
        chain_b: &str,
    ) -> HarnessResult<ChannelId> {
        ctx.chain(chain_a)?;
        ctx.chain(chain_b)?;
        let relayer = ctx.relayer()?.clone();
        info!("connecting chains via relayer");

        let output = self
            .steps
            .run_checked(
                "connect_ibc_chains",
                &relayer,
                self.connect_argv(chain_a, chain_b),
                &SuccessMarker::stderr(&self.config.channel_open_marker),
            )
            .await?;

        let stderr = output.stderr_lossy();
        let mut channels = parse_channel_ids(&stderr).into_iter();
        let a_side = match channels.next() {
            Some(channel) => channel,
            None => {
                warn!(
                    fallback = %self.config.default_channel,
                    "channel id not found in relayer output"
                );
                ChannelId::new(&self.config.default_channel)
            }
        };
        let b_side = channels.next().unwrap_or_else(|| a_side.clone());

        ctx.topology.set_channel(chain_a, chain_b, a_side.clone());
        ctx.topology.set_channel(chain_b, chain_a, b_side);
        ctx.topology.set_port(chain_a, chain_b, &self.config.port_a);
        ctx.topology.set_port(chain_b, chain_a, &self.config.port_b);
        info!(channel = %a_side, "connected chains");
        Ok(a_side)
    }

    /// Transfer `coin` from `src` to `recipient` on `dst`.
    ///
    /// Channel and source port come from the topology recorded by
    /// [`connect_ibc_chains`](Self::connect_ibc_chains); unknown pairs use the
    /// default channel on `port_a`.
    #[instrument(skip(self, ctx, coin), fields(coin = %coin))]
    pub async fn send_ibc(
        &self,
        ctx: &OrchestrationContext,
        src: &str,
        dst: &str,
        recipient: &str,
        coin: &Coin,
    ) -> HarnessResult<()> {
        ctx.chain(src)?;
        ctx.chain(dst)?;
        let relayer = ctx.relayer()?;
        let channel = ctx
            .topology
            .channel(src, dst)
            .cloned()
            .unwrap_or_else(|| ChannelId::new(&self.config.default_channel));
        let port = ctx
            .topology
            .port(src, dst)
            .unwrap_or(self.config.port_a.as_str())
            .to_string();

        self.steps
            .run_checked(
                "send_ibc",
                relayer,
                self.transfer_argv(src, dst, &port, &channel, recipient, coin),
                &SuccessMarker::stdout(&self.config.tx_success_marker),
            )
            .await?;

        info!(channel = %channel, "sent tokens across chains");
        Ok(())
    }
}

/// Channel ids in order of appearance, without repeats.
pub fn parse_channel_ids(output: &str) -> Vec<ChannelId> {
    let Ok(re) = Regex::new(r"channel-\d+") else {
        return Vec::new();
    };
    let mut ids: Vec<ChannelId> = Vec::new();
    for m in re.find_iter(output) {
        let id = ChannelId::new(m.as_str());
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_ids_in_order() {
        let out = r#"a_side: channel_id: Some(ChannelId("channel-2")), b_side: channel_id: Some(ChannelId("channel-5")) channel-2"#;
        assert_eq!(
            parse_channel_ids(out),
            vec![ChannelId::new("channel-2"), ChannelId::new("channel-5")]
        );
    }

    #[test]
    fn test_parse_channel_ids_none() {
        assert!(parse_channel_ids("successfully opened init channel").is_empty());
    }
}
