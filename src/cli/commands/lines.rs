use crate::cli::Output;
use crate::config::ParfoldConfig;
use crate::error::MapReduceError;
use crate::io;
use crate::parallel::{BarProgress, MapReduce, ProgressSink, fold_ordered};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct LinesArgs {
    /// Files to count
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Print the count of every file, not only the total
    #[arg(long)]
    pub per_file: bool,
}

pub async fn execute(
    args: LinesArgs,
    config: &ParfoldConfig,
    output: &Output,
    cancel: CancellationToken,
) -> Result<()> {
    let executor = MapReduce::from_settings(&config.parallel).cancel_on(cancel);
    output.verbose(&format!(
        "Counting lines of {} files with {} workers",
        args.files.len(),
        executor.workers()
    ));

    let files = args.files;
    let show_progress = config.parallel.progress;
    let counts = tokio::task::spawn_blocking(move || {
        if show_progress {
            count_lines(&executor.progress(BarProgress::new("Counting lines")), files)
        } else {
            count_lines(&executor, files)
        }
    })
    .await
    .context("Line counting task panicked")?;

    let counts = match counts {
        Ok(counts) => counts,
        Err(err @ MapReduceError::Cancelled { .. }) => {
            output.warning("Interrupted before all files were counted");
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    if args.per_file {
        for (path, count) in &counts {
            output.count_row(*count, &path.display().to_string());
        }
    }
    let total = fold_ordered(counts, 0usize, |(_, count), acc| acc + count);
    output.count_row(total, "total");
    Ok(())
}

fn count_lines<P: ProgressSink>(
    executor: &MapReduce<P>,
    files: Vec<PathBuf>,
) -> Result<Vec<(PathBuf, usize)>, MapReduceError> {
    executor.map(files, |path: PathBuf, _| {
        let count = io::count_lines(&path)?;
        Ok((path, count))
    })
}
