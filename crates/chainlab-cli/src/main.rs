//! Chainlab CLI - drive local test chains from the shell
//!
//! ## Commands
//!
//! - `init-chain`: build validator homes and genesis from a setup file
//! - `set-relayer`: register the relayer container in a context file
//! - `status`: print a node's raw status
//! - `upgrade`: run the governance upgrade scenario
//! - `bridge`: open relayer channels and send tokens across chains

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use chainlab_chain::{ChainDescriptor, ChainSetup, Coin};
use chainlab_core::{
    BridgeWorkflow, CommandExecutor, ContainerId, ContainerRuntime, DockerCliRuntime,
    HarnessConfig, OrchestrationContext, StatusPoller, StepRunner, UpgradeScenario,
};

#[derive(Parser)]
#[command(name = "chainlab")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Orchestrate local blockchain test clusters", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Harness configuration file (TOML)
    #[arg(short, long, global = true, env = "CHAINLAB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a chain on disk from a setup file
    InitChain {
        /// Chain setup file (TOML)
        #[arg(short, long)]
        setup: PathBuf,

        /// Write the chain descriptor here (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Register the chain in this context file, creating it if needed
        #[arg(long)]
        context: Option<PathBuf>,

        /// Validator container names are `<prefix>-<index>` (default: `<chain-id>-val`)
        #[arg(long)]
        container_prefix: Option<String>,
    },

    /// Register the relayer container in a context file
    SetRelayer {
        #[arg(long)]
        context: PathBuf,

        #[arg(long)]
        container: String,
    },

    /// Print the raw status output of a node
    Status {
        /// Container running the node
        #[arg(long)]
        container: String,
    },

    /// Run submit, deposit, vote and wait for the upgrade height
    Upgrade {
        #[arg(long)]
        context: PathBuf,

        #[arg(long)]
        chain_id: String,
    },

    /// Relayer operations
    Bridge {
        #[command(subcommand)]
        action: BridgeAction,
    },
}

#[derive(Subcommand)]
enum BridgeAction {
    /// Open a channel between two chains
    Connect {
        #[arg(long)]
        context: PathBuf,

        #[arg(long)]
        chain_a: String,

        #[arg(long)]
        chain_b: String,
    },

    /// Transfer tokens from one chain to an address on another
    Send {
        #[arg(long)]
        context: PathBuf,

        #[arg(long)]
        src: String,

        #[arg(long)]
        dst: String,

        #[arg(long)]
        recipient: String,

        /// Amount with denom, e.g. `1000utoken`
        #[arg(long)]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    chainlab_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerCliRuntime::default());

    match cli.command {
        Commands::InitChain {
            setup,
            out,
            context,
            container_prefix,
        } => cmd_init_chain(
            &setup,
            out.as_deref(),
            context.as_deref(),
            container_prefix.as_deref(),
        ),
        Commands::SetRelayer { context, container } => cmd_set_relayer(&context, &container),
        Commands::Status { container } => cmd_status(runtime, &config, &container).await,
        Commands::Upgrade { context, chain_id } => {
            cmd_upgrade(runtime, &config, &context, &chain_id).await
        }
        Commands::Bridge { action } => match action {
            BridgeAction::Connect {
                context,
                chain_a,
                chain_b,
            } => cmd_bridge_connect(runtime, &config, &context, &chain_a, &chain_b).await,
            BridgeAction::Send {
                context,
                src,
                dst,
                recipient,
                amount,
            } => cmd_bridge_send(runtime, &config, &context, &src, &dst, &recipient, &amount).await,
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("Failed to load config: {:?}", path)),
        None => Ok(HarnessConfig::default()),
    }
}

fn load_context(path: &Path) -> Result<OrchestrationContext> {
    OrchestrationContext::load(path).with_context(|| format!("Failed to read context: {:?}", path))
}

fn step_runner(runtime: Arc<dyn ContainerRuntime>, config: &HarnessConfig) -> StepRunner {
    StepRunner::new(CommandExecutor::from_config(runtime, &config.exec))
}

fn cmd_init_chain(
    setup_path: &Path,
    out: Option<&Path>,
    context: Option<&Path>,
    container_prefix: Option<&str>,
) -> Result<()> {
    let raw = std::fs::read_to_string(setup_path)
        .with_context(|| format!("Failed to read setup file: {:?}", setup_path))?;
    let setup: ChainSetup = toml::from_str(&raw).context("Invalid chain setup")?;

    let descriptor = chainlab_chain::init_from_setup(&setup)
        .with_context(|| format!("Failed to build chain {}", setup.chain_id))?;
    info!(chain_id = %descriptor.id(), validators = descriptor.len(), "chain built");

    let rendered = serde_json::to_string_pretty(&descriptor)?;
    match out {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write descriptor: {:?}", path))?;
            println!("Wrote descriptor for {} to {:?}", descriptor.id(), path);
        }
        None => println!("{}", rendered),
    }

    if let Some(context) = context {
        register_chain(context, descriptor, container_prefix)?;
    }
    Ok(())
}

/// Add `descriptor` to the context file with one container per validator.
fn register_chain(
    context_path: &Path,
    descriptor: ChainDescriptor,
    container_prefix: Option<&str>,
) -> Result<()> {
    let mut ctx = if context_path.exists() {
        load_context(context_path)?
    } else {
        OrchestrationContext::new()
    };

    let prefix = container_prefix
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-val", descriptor.id()));
    let containers = (0..descriptor.len())
        .map(|i| ContainerId::new(format!("{prefix}-{i}")))
        .collect();
    let chain_id = descriptor.id().to_string();

    ctx.add_chain(descriptor, containers)?;
    ctx.save(context_path)?;
    println!("Registered {} in {:?}", chain_id, context_path);
    Ok(())
}

fn cmd_set_relayer(context_path: &Path, container: &str) -> Result<()> {
    let mut ctx = load_context(context_path)?;
    ctx.set_relayer(ContainerId::new(container));
    ctx.save(context_path)?;
    println!("Relayer set to {}", container);
    Ok(())
}

async fn cmd_status(
    runtime: Arc<dyn ContainerRuntime>,
    config: &HarnessConfig,
    container: &str,
) -> Result<()> {
    let steps = step_runner(runtime, config);
    let status = StatusPoller::new(&steps, &config.binaries)
        .chain_status(&ContainerId::new(container))
        .await?;
    println!("{}", String::from_utf8_lossy(&status));
    Ok(())
}

async fn cmd_upgrade(
    runtime: Arc<dyn ContainerRuntime>,
    config: &HarnessConfig,
    context_path: &Path,
    chain_id: &str,
) -> Result<()> {
    let mut ctx = load_context(context_path)?;
    let steps = step_runner(runtime, config);

    let result = UpgradeScenario::new(&steps, config)
        .run(&mut ctx, chain_id)
        .await;
    // The proposal id is recorded even when a later step fails.
    ctx.save(context_path)?;

    let report = result.with_context(|| format!("Upgrade of {} failed", chain_id))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_bridge_connect(
    runtime: Arc<dyn ContainerRuntime>,
    config: &HarnessConfig,
    context_path: &Path,
    chain_a: &str,
    chain_b: &str,
) -> Result<()> {
    let mut ctx = load_context(context_path)?;
    let steps = step_runner(runtime, config);

    let channel = BridgeWorkflow::new(&steps, &config.binaries, &config.bridge)
        .connect_ibc_chains(&mut ctx, chain_a, chain_b)
        .await
        .with_context(|| format!("Failed to connect {} and {}", chain_a, chain_b))?;
    ctx.save(context_path)?;

    println!("Connected {} <-> {} on {}", chain_a, chain_b, channel);
    Ok(())
}

async fn cmd_bridge_send(
    runtime: Arc<dyn ContainerRuntime>,
    config: &HarnessConfig,
    context_path: &Path,
    src: &str,
    dst: &str,
    recipient: &str,
    amount: &str,
) -> Result<()> {
    let ctx = load_context(context_path)?;
    let coin: Coin = amount
        .parse()
        .with_context(|| format!("Invalid amount: {}", amount))?;
    let steps = step_runner(runtime, config);

    BridgeWorkflow::new(&steps, &config.binaries, &config.bridge)
        .send_ibc(&ctx, src, dst, recipient, &coin)
        .await
        .with_context(|| format!("Transfer {} -> {} failed", src, dst))?;

    println!("Sent {} from {} to {} on {}", coin, src, recipient, dst);
    Ok(())
}
