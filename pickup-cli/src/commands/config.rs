//! `pickup config`: bootstrap and print the YAML configuration.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use pickup_core::config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default config file unless one exists.
    Init {
        /// Overwrite an existing config with the defaults.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as JSON.
    Show,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let path = config::config_path_at(&home);

    match command {
        ConfigCommand::Init { force } => {
            let (_, written) = config::init_at(&home, force)
                .with_context(|| format!("failed to initialize {}", path.display()))?;
            if written {
                println!("{} {}", "wrote".green().bold(), path.display());
                println!("Set SHOPIFY_ACCESS_TOKEN and BLING_CLIENT_ID/BLING_CLIENT_SECRET before starting the daemon.");
            } else {
                println!(
                    "{} already exists; pass --force to reset it",
                    path.display()
                );
            }
        }
        ConfigCommand::Show => {
            let config = config::load_at(&home).context("failed to load configuration")?;
            println!("# {}", path.display().to_string().dimmed());
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("failed to render config JSON")?
            );
        }
    }

    Ok(())
}
