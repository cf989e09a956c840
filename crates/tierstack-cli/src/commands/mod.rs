//! CLI command definitions and dispatch.

pub mod config;
pub mod outputs;
pub mod plan;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tierstack_common::config::StackConfig;
use tierstack_common::constants;
use tierstack_compose::StackOutputs;
use tierstack_provider::MemoryProvider;

/// tierstack: two-tier stacks on load-balanced containers.
#[derive(Parser, Debug)]
#[command(name = constants::BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Stack configuration file. Falls back to `tierstack.yaml` when present,
    /// then to the built-in stack.
    #[arg(long, short, global = true, env = "TIERSTACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Declare the stack and print the resources in creation order.
    Plan(plan::PlanArgs),
    /// Declare the stack and print its exported values.
    Outputs(outputs::OutputsArgs),
    /// Print the effective configuration.
    Config,
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let stack = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Plan(args) => block_on(plan::execute(&stack, &args)),
        Command::Outputs(args) => block_on(outputs::execute(&stack, &args)),
        Command::Config => config::execute(&stack),
    }
}

/// Loads the explicit file, else `tierstack.yaml` if it exists, else the
/// built-in configuration.
fn load_config(path: Option<&Path>) -> anyhow::Result<StackConfig> {
    let default_file = Path::new(constants::DEFAULT_CONFIG_FILE);
    let path = match path {
        Some(path) => Some(path),
        None if default_file.exists() => Some(default_file),
        None => None,
    };
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            Ok(StackConfig::load(path)?)
        }
        None => {
            tracing::warn!(
                "no {} found, using the built-in stack with unrestricted external ingress",
                constants::DEFAULT_CONFIG_FILE
            );
            Ok(StackConfig::default())
        }
    }
}

/// Runs an async command on a runtime that outlives every deferred value
/// the command creates.
fn block_on<F>(command: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::runtime::Runtime::new()?.block_on(command)
}

/// Declares the stack against a fresh in-memory provider and settles every
/// deferred value.
async fn declare(config: &StackConfig) -> anyhow::Result<(Arc<MemoryProvider>, StackOutputs)> {
    let provider = Arc::new(MemoryProvider::new(config.region.as_str()));
    let outputs = tierstack_compose::declare_stack(Arc::clone(&provider), config).await?;
    let settled = provider.settle().await;
    tracing::debug!(settled, "deferred values settled");
    Ok((provider, outputs))
}
