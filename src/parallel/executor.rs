use crate::config::ParallelSettings;
use crate::error::Result;
use crate::parallel::core::{ExecutionContext, ExecutionStrategy};
use crate::parallel::input::{TaskOptions, normalize};
use crate::parallel::progress::{NoProgress, ProgressSink};
use crate::parallel::reduce::fold_ordered;
use crate::utils::Stopwatch;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bounded-parallelism map-reduce executor
///
/// ```rust
/// use parfold::parallel::MapReduce;
///
/// let squares = MapReduce::new(4).map(vec![1, 2, 3], |x: i32, _| Ok(x * x))?;
/// assert_eq!(squares, vec![1, 4, 9]);
///
/// let total = MapReduce::new(4).map_reduce(vec![1, 2, 3, 4], |x: i32, _| Ok(x), 0, |x, acc| acc + x)?;
/// assert_eq!(total, 10);
/// # Ok::<(), parfold::MapReduceError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MapReduce<P = NoProgress> {
    workers: usize,
    progress: P,
    ctx: ExecutionContext,
}

impl MapReduce<NoProgress> {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            progress: NoProgress,
            ctx: ExecutionContext::default(),
        }
    }

    /// Executor configured from the `[parallel]` settings section
    pub fn from_settings(settings: &ParallelSettings) -> Self {
        Self {
            workers: settings.resolved_workers(),
            progress: NoProgress,
            ctx: ExecutionContext {
                grace_period: Duration::from_millis(settings.grace_period_ms),
                poll_interval: Duration::from_millis(settings.poll_interval_ms),
                buffer_multiplier: settings.channel_buffer_multiplier,
                ..ExecutionContext::default()
            },
        }
    }
}

impl<P: ProgressSink> MapReduce<P> {
    /// Swap the progress sink; pass [`NoProgress`] to build no listener at all
    pub fn progress<Q: ProgressSink>(self, progress: Q) -> MapReduce<Q> {
        MapReduce {
            workers: self.workers,
            progress,
            ctx: self.ctx,
        }
    }

    pub fn options(mut self, options: TaskOptions) -> Self {
        self.ctx.options = Arc::new(options);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.ctx.cancel = Some(token);
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.ctx.grace_period = grace_period;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.ctx.poll_interval = poll_interval;
        self
    }

    /// Stack size for worker threads, for transforms that recurse deeply
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.ctx.stack_size = Some(bytes);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `transform` to every input, returning outputs in input order
    pub fn map<I, A, R, F>(&self, inputs: I, transform: F) -> Result<Vec<R>>
    where
        I: IntoIterator<Item = A>,
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(A, &TaskOptions) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let strategy = ExecutionStrategy::for_workers(self.workers)?;
        let tasks = normalize(inputs)?;
        let total = tasks.len();

        let mut stopwatch = Stopwatch::start();
        debug!(total, workers = strategy.workers(), "map started");

        let outputs = strategy.execute(tasks, transform, &self.progress, &self.ctx)?;

        debug!(
            total,
            elapsed_ms = stopwatch.elapsed_ms(),
            "map finished"
        );
        Ok(outputs)
    }

    /// Map, then fold outputs left to right: `acc = fold(output, acc)`
    pub fn map_reduce<I, A, R, F, Acc, G>(
        &self,
        inputs: I,
        transform: F,
        init: Acc,
        fold: G,
    ) -> Result<Acc>
    where
        I: IntoIterator<Item = A>,
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(A, &TaskOptions) -> anyhow::Result<R> + Send + Sync + 'static,
        G: FnMut(R, Acc) -> Acc,
    {
        let outputs = self.map(inputs, transform)?;
        Ok(fold_ordered(outputs, init, fold))
    }
}

/// Convenience function: map without progress or options
pub fn map<I, A, R, F>(inputs: I, workers: usize, transform: F) -> Result<Vec<R>>
where
    I: IntoIterator<Item = A>,
    A: Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> anyhow::Result<R> + Send + Sync + 'static,
{
    MapReduce::new(workers).map(inputs, move |args, _: &TaskOptions| transform(args))
}

/// Convenience function: map then fold, without progress or options
pub fn map_reduce<I, A, R, F, Acc, G>(
    inputs: I,
    workers: usize,
    transform: F,
    init: Acc,
    fold: G,
) -> Result<Acc>
where
    I: IntoIterator<Item = A>,
    A: Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> anyhow::Result<R> + Send + Sync + 'static,
    G: FnMut(R, Acc) -> Acc,
{
    MapReduce::new(workers).map_reduce(
        inputs,
        move |args, _: &TaskOptions| transform(args),
        init,
        fold,
    )
}
