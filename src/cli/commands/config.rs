use crate::cli::Output;
use crate::config::ParfoldConfig;
use anyhow::{Result, bail};
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display current merged configuration
    Show {
        /// Output format: toml, json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
    /// Validate configuration
    Validate,
}

/// `config` is already loaded, merged with CLI overrides and validated
pub async fn execute(args: ConfigArgs, config: &ParfoldConfig, output: &Output) -> Result<()> {
    match args.command {
        ConfigCommand::Show { format } => {
            let rendered = match format.to_lowercase().as_str() {
                "toml" => toml::to_string_pretty(config)?,
                "json" => serde_json::to_string_pretty(config)?,
                _ => bail!("Unsupported format: {format}. Use toml or json"),
            };
            output.result(rendered.trim_end());
        }
        ConfigCommand::Validate => {
            output.success("Configuration is valid");
            output.key_value(
                "workers:",
                &config.parallel.resolved_workers().to_string(),
                true,
            );
        }
    }
    Ok(())
}
