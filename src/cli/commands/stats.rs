use crate::cli::Output;
use crate::io;
use crate::stats::bootstrap;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct StatsArgs {
    /// File with one number per line; blank lines are skipped
    pub file: PathBuf,

    /// Number of bootstrap resamples
    #[arg(long, default_value_t = 100)]
    pub samples: usize,

    /// Width of the tails left out of the interval, in percent
    #[arg(long, default_value_t = 10.0)]
    pub percent: f64,

    /// Seed for resampling
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub async fn execute(args: StatsArgs, output: &Output) -> Result<()> {
    let mut values = Vec::new();
    for (index, line) in io::read_lines(&args.file, output)?.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: f64 = line
            .trim()
            .parse()
            .with_context(|| format!("Line {} is not a number: {line:?}", index + 1))?;
        values.push(value);
    }

    let result = bootstrap(&values, args.samples, args.percent, args.seed)
        .with_context(|| format!("Cannot bootstrap {}", args.file.display()))?;

    if output.is_quiet() {
        output.result(&format!("{} {} {}", result.mean, result.low, result.high));
        return Ok(());
    }

    output.header(&format!("Bootstrap of {} values", values.len()));
    output.key_value("mean:", &format!("{:.6}", result.mean), true);
    output.key_value(
        &format!("p{}:", args.percent / 2.0),
        &format!("{:.6}", result.low),
        false,
    );
    output.key_value(
        &format!("p{}:", 100.0 - args.percent / 2.0),
        &format!("{:.6}", result.high),
        false,
    );
    Ok(())
}
