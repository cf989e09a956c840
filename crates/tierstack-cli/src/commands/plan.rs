//! `tstk plan`: display the resources a stack declares, in creation order.

use std::path::PathBuf;

use clap::Args;
use tierstack_common::config::StackConfig;
use tierstack_common::constants;
use tierstack_compose::graph::creation_order;

use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Also write the declared resources to this file as JSON.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

/// Executes the `plan` command.
///
/// Declares the stack against the in-memory provider, settles deferred
/// values, orders the resources by dependency, and displays the plan.
///
/// # Errors
///
/// Returns an error if declaration fails, the resources form a cycle, or
/// the plan file cannot be written.
pub async fn execute(config: &StackConfig, args: &PlanArgs) -> anyhow::Result<()> {
    let (provider, _outputs) = super::declare(config).await?;
    let plan = creation_order(provider.records().await)?;

    println!(
        "{} plan for: {} ({})",
        constants::APP_NAME,
        config.project,
        config.region
    );
    println!("{}", output::rule(40));
    println!();
    for record in &plan {
        print!("{}", output::format_record(record));
    }
    println!();
    println!("  {} resource(s) will be created.", plan.len());

    if let Some(path) = &args.out {
        tokio::fs::write(path, serde_json::to_string_pretty(&plan)?).await?;
        tracing::info!(path = %path.display(), resources = plan.len(), "plan written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plan_file_lists_every_resource() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let args = PlanArgs {
            out: Some(path.clone()),
        };

        execute(&StackConfig::default(), &args).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let resources = written.as_array().unwrap();
        assert!(resources.iter().any(|r| r["kind"] == "service"));
        assert!(resources.iter().any(|r| r["kind"] == "nat_gateway"));
    }
}
