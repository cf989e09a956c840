//! `tstk outputs`: print the values a stack exports.

use clap::Args;
use tierstack_common::config::StackConfig;

use crate::output;

/// Arguments for the `outputs` command.
#[derive(Args, Debug)]
pub struct OutputsArgs {
    /// Print the outputs as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `outputs` command.
///
/// Declares the stack, settles it, and waits for every exported value.
///
/// # Errors
///
/// Returns an error if declaration fails or an exported value fails to
/// resolve (for example a malformed registry credential).
pub async fn execute(config: &StackConfig, args: &OutputsArgs) -> anyhow::Result<()> {
    let (_provider, outputs) = super::declare(config).await?;
    let resolved = outputs.resolve().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        print!("{}", output::format_outputs(&resolved));
    }
    Ok(())
}
