//! `tstk config`: print the effective configuration.

use tierstack_common::config::StackConfig;

/// Executes the `config` command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn execute(config: &StackConfig) -> anyhow::Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
