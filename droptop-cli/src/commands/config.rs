//! Configuration inspection

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use droptop_server::GatewayConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets masked
    Show {
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

pub fn run_config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommand::Show { json } => {
            let config = GatewayConfig::load(config_path)
                .context("Failed to load configuration")?
                .redacted();
            let rendered = if json {
                serde_json::to_string_pretty(&config)?
            } else {
                toml::to_string_pretty(&config).context("Failed to render configuration")?
            };
            println!("{rendered}");
        }
    }
    Ok(())
}
