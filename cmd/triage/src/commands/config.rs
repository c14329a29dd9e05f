//! Configuration management commands.

use clap::{Args, Subcommand};

use super::{get_config, output_result, print_success};
use crate::Cli;

/// Manage console configuration.
///
/// Configuration is stored in ~/.facetriage/triage/config.yaml and is
/// created with defaults on first use.
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// View the current configuration
    View,
    /// Print the config file path
    Path,
    /// Set a value by dotted key, e.g. `matcher.threshold 0.5`
    Set {
        /// Key such as debounce.cooldown_ms
        key: String,
        /// New value
        value: String,
    },
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::View => {
                let cfg = get_config(cli)?;
                output_result(cli, &cfg)
            }

            ConfigSubcommand::Path => {
                let cfg = get_config(cli)?;
                println!("{}", cfg.path().display());
                Ok(())
            }

            ConfigSubcommand::Set { key, value } => {
                let mut cfg = get_config(cli)?;
                cfg.set(key, value)?;
                cfg.save()?;
                print_success(&format!("Set {} = {}", key, value));
                Ok(())
            }
        }
    }
}
