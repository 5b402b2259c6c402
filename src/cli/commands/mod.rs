use crate::cli::Output;
use crate::config::ParfoldConfig;
use crate::logging::{self, LogTarget};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod lines;
pub mod stats;
pub mod version;

#[derive(Parser)]
#[command(
    name = "parfold",
    version = env!("CARGO_PKG_VERSION"),
    about = "Bounded-parallelism map-reduce over files",
    long_about = "parfold spreads per-file work over a fixed pool of worker threads, \
                  shows live progress and folds the results in input order."
)]
pub struct Cli {
    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Number of worker threads (overrides parallel.workers)
    #[arg(short = 'j', long, global = true)]
    pub workers: Option<usize>,

    /// Hide the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count lines of files in parallel
    Lines(lines::LinesArgs),
    /// Bootstrap mean and percentiles of a one-number-per-line file
    Stats(stats::StatsArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Show version information
    Version(version::VersionArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = ParfoldConfig::load_with_custom_config(self.config.as_deref())?;
        if let Some(workers) = self.workers {
            config.parallel.workers = workers;
        }
        if self.no_progress || self.quiet {
            config.parallel.progress = false;
        }
        config.validate()?;

        setup_logging(&config, self.verbose, self.quiet)?;
        let output = Output::new(self.verbose > 0, self.quiet);

        match self.command {
            Some(Commands::Lines(args)) => {
                lines::execute(args, &config, &output, interrupt_token()).await
            }
            Some(Commands::Stats(args)) => stats::execute(args, &output).await,
            Some(Commands::Config(args)) => config::execute(args, &config, &output).await,
            Some(Commands::Version(args)) => version::execute(args, &output).await,
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(config: &ParfoldConfig, verbose: u8, quiet: bool) -> Result<()> {
    let target = match &config.logging.file {
        Some(path) => LogTarget::File(path.clone()),
        None => LogTarget::Console,
    };
    logging::init(&config.logging.level, &target, verbose, quiet)
        .context("Failed to set up logging")
}

/// Token cancelled by the first Ctrl-C
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling remaining tasks");
            trigger.cancel();
        }
    });
    token
}
