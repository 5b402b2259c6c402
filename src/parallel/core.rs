use crate::error::{MapReduceError, Result};
use crate::parallel::input::{Task, TaskOptions};
use crate::parallel::progress::{GuardedHandle, ProgressEmitter, ProgressListener, ProgressSink};
use anyhow::anyhow;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of one task as reported by a worker
type TaskOutcome<R> = (usize, anyhow::Result<R>);

/// Run-wide settings shared by both execution backends
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Options forwarded to every transform invocation
    pub options: Arc<TaskOptions>,
    /// External cancellation; checked before each task is dispatched
    pub cancel: Option<CancellationToken>,
    /// How long to wait for in-flight tasks after a failure or cancellation
    pub grace_period: Duration,
    /// How often the collector re-checks cancellation while idle
    pub poll_interval: Duration,
    /// Queue capacity per worker
    pub buffer_multiplier: usize,
    /// Worker thread stack size; `None` keeps the platform default
    pub stack_size: Option<usize>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            options: Arc::new(TaskOptions::default()),
            cancel: None,
            grace_period: Duration::from_secs(2),
            poll_interval: Duration::from_millis(50),
            buffer_multiplier: 2,
            stack_size: None,
        }
    }
}

impl ExecutionContext {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Apply the transform to one task, turning panics into task failures
fn run_task<A, R, F>(transform: &F, task: Task<A>, options: &TaskOptions) -> TaskOutcome<R>
where
    F: Fn(A, &TaskOptions) -> anyhow::Result<R>,
{
    let Task { position, args } = task;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| transform(args, options)))
        .unwrap_or_else(|payload| Err(anyhow!("transform panicked: {}", panic_message(&*payload))));
    (position, outcome)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Write-once output slots indexed by input position
struct OutputSlots<R> {
    slots: Vec<Option<R>>,
    filled: usize,
}

impl<R> OutputSlots<R> {
    fn new(total: usize) -> Self {
        Self {
            slots: (0..total).map(|_| None).collect(),
            filled: 0,
        }
    }

    fn store(&mut self, position: usize, output: R) -> Result<()> {
        match self.slots.get_mut(position) {
            Some(slot @ None) => {
                *slot = Some(output);
                self.filled += 1;
                Ok(())
            }
            _ => Err(MapReduceError::DuplicateOutput { position }),
        }
    }

    fn is_full(&self) -> bool {
        self.filled == self.slots.len()
    }

    fn into_outputs(self) -> Result<Vec<R>> {
        let missing = self.slots.len() - self.filled;
        self.slots
            .into_iter()
            .collect::<Option<Vec<R>>>()
            .ok_or(MapReduceError::Incomplete { missing })
    }
}

/// Sequential execution: no pool, no channel, strictly in input order
pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn execute<A, R, F, P>(
        tasks: Vec<Task<A>>,
        transform: F,
        progress: &P,
        ctx: &ExecutionContext,
    ) -> Result<Vec<R>>
    where
        F: Fn(A, &TaskOptions) -> anyhow::Result<R>,
        P: ProgressSink,
    {
        let total = tasks.len();
        let mut handle = P::ENABLED.then(|| GuardedHandle::start(progress, total));
        let mut outputs = Vec::with_capacity(total);
        let mut failure = None;

        for task in tasks {
            if ctx.is_cancelled() {
                failure = Some(MapReduceError::Cancelled {
                    completed: outputs.len(),
                    total,
                });
                break;
            }

            match run_task(&transform, task, &ctx.options) {
                (_, Ok(output)) => {
                    outputs.push(output);
                    if let Some(handle) = handle.as_mut() {
                        handle.advance();
                    }
                }
                (position, Err(source)) => {
                    failure = Some(MapReduceError::task(position, source));
                    break;
                }
            }
        }

        if let Some(mut handle) = handle {
            handle.finish();
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(outputs),
        }
    }
}

/// Context for worker threads to avoid too many function parameters
struct WorkerContext<A, R, F> {
    work_rx: Receiver<Task<A>>,
    result_tx: Sender<TaskOutcome<R>>,
    transform: Arc<F>,
    options: Arc<TaskOptions>,
    abort: CancellationToken,
    progress: Option<ProgressEmitter>,
}

impl<A, R, F> WorkerContext<A, R, F>
where
    F: Fn(A, &TaskOptions) -> anyhow::Result<R>,
{
    fn run(self) {
        while let Ok(task) = self.work_rx.recv() {
            if self.abort.is_cancelled() {
                break;
            }

            let (position, outcome) = run_task(self.transform.as_ref(), task, &self.options);

            // Signal before handing over the result, so every signal for a
            // collected output is queued ahead of the sentinel
            if outcome.is_ok()
                && let Some(progress) = &self.progress
            {
                progress.completed();
            }

            if self.result_tx.send((position, outcome)).is_err() {
                break; // Collector gone
            }
        }
    }
}

/// Fixed pool of OS threads pulling tasks from a shared bounded queue
pub struct ParallelExecutor {
    max_workers: usize,
}

impl ParallelExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Execute tasks in parallel using a producer-consumer pattern
    pub fn execute<A, R, F, P>(
        &self,
        tasks: Vec<Task<A>>,
        transform: F,
        progress: &P,
        ctx: &ExecutionContext,
    ) -> Result<Vec<R>>
    where
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(A, &TaskOptions) -> anyhow::Result<R> + Send + Sync + 'static,
        P: ProgressSink,
    {
        let total = tasks.len();
        let actual_workers = self.max_workers.min(total.max(1));
        let buffer_size = actual_workers * ctx.buffer_multiplier.max(1);

        // Listener starts before any worker so no signal is missed
        let handle = P::ENABLED
            .then(|| GuardedHandle::start(progress, total))
            .filter(GuardedHandle::is_active);
        let listener = match handle {
            Some(handle) => Some(ProgressListener::spawn(handle, total)?),
            None => None,
        };

        let abort = ctx
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_else(CancellationToken::new);

        let (work_tx, work_rx) = bounded::<Task<A>>(buffer_size);
        let (result_tx, result_rx) = bounded::<TaskOutcome<R>>(buffer_size * 2);
        let transform = Arc::new(transform);

        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(actual_workers);
        for worker_id in 0..actual_workers {
            let worker = WorkerContext {
                work_rx: work_rx.clone(),
                result_tx: result_tx.clone(),
                transform: transform.clone(),
                options: ctx.options.clone(),
                abort: abort.clone(),
                progress: listener.as_ref().and_then(ProgressListener::emitter),
            };

            let mut builder = thread::Builder::new().name(format!("parfold-worker-{worker_id}"));
            if let Some(stack_size) = ctx.stack_size {
                builder = builder.stack_size(stack_size);
            }
            let spawned = builder.spawn(move || worker.run());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    abort.cancel();
                    return Err(MapReduceError::Spawn(err));
                }
            }
        }

        // Producer thread: dispatch work until done or aborted
        let producer_abort = abort.clone();
        let producer = thread::Builder::new()
            .name("parfold-producer".to_string())
            .spawn(move || {
                for task in tasks {
                    if producer_abort.is_cancelled() || work_tx.send(task).is_err() {
                        break;
                    }
                }
            });
        let producer = match producer {
            Ok(handle) => handle,
            Err(err) => {
                abort.cancel();
                return Err(MapReduceError::Spawn(err));
            }
        };

        // Workers own the remaining ends; disconnection now means they exited
        drop(work_rx);
        drop(result_tx);

        let mut slots = OutputSlots::new(total);
        let failure = collect_outputs(&result_rx, &mut slots, &abort, ctx.poll_interval);

        let outcome = if failure.is_none() && slots.is_full() {
            let _ = producer.join();
            join_workers(workers);
            slots.into_outputs()
        } else {
            let cancelled = failure.is_none() && abort.is_cancelled();
            abort.cancel();
            let drained = drain_in_flight(&result_rx, &mut slots, ctx.grace_period);
            let completed = slots.filled;
            drop(result_rx);

            // Every worker dropped its sender once the result channel disconnects
            let running = match drained {
                Drained::Disconnected => 0,
                Drained::TimedOut => workers.iter().filter(|w| !w.is_finished()).count(),
            };
            if running > 0 {
                warn!(running, "detaching workers still busy after the grace period");
            } else {
                join_workers(workers);
            }

            Err(match failure {
                Some(err) if running > 0 => MapReduceError::PoolTeardown {
                    running,
                    source: Box::new(err),
                },
                Some(err) => err,
                None if cancelled => MapReduceError::Cancelled { completed, total },
                None => MapReduceError::Incomplete {
                    missing: total - completed,
                },
            })
        };

        // Drain-then-sentinel-then-join, on every path
        if let Some(listener) = listener
            && let Some(observed) = listener.shutdown()
        {
            debug!(observed, total, "progress listener stopped");
        }

        outcome
    }
}

/// Fill slots until every output arrived, a task failed, or the run was aborted
fn collect_outputs<R>(
    result_rx: &Receiver<TaskOutcome<R>>,
    slots: &mut OutputSlots<R>,
    abort: &CancellationToken,
    poll_interval: Duration,
) -> Option<MapReduceError> {
    while !slots.is_full() {
        match result_rx.recv_timeout(poll_interval) {
            Ok((position, Ok(output))) => {
                if let Err(err) = slots.store(position, output) {
                    return Some(err);
                }
            }
            Ok((position, Err(source))) => return Some(MapReduceError::task(position, source)),
            Err(RecvTimeoutError::Timeout) => {
                if abort.is_cancelled() {
                    return None;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
    None
}

/// How draining in-flight results ended
enum Drained {
    /// All workers exited
    Disconnected,
    /// Grace period elapsed with workers possibly still running
    TimedOut,
}

/// Wait up to `grace_period` for in-flight tasks, recording their outputs
fn drain_in_flight<R>(
    result_rx: &Receiver<TaskOutcome<R>>,
    slots: &mut OutputSlots<R>,
    grace_period: Duration,
) -> Drained {
    let deadline = Instant::now() + grace_period;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match result_rx.recv_timeout(remaining) {
            Ok((position, Ok(output))) => {
                // Slots are discarded on this path; a duplicate only matters for the count
                let _ = slots.store(position, output);
            }
            Ok((_, Err(_))) => {} // First failure wins
            Err(RecvTimeoutError::Disconnected) => return Drained::Disconnected,
            Err(RecvTimeoutError::Timeout) => return Drained::TimedOut,
        }
    }
}

fn join_workers(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        if worker.join().is_err() {
            warn!("worker thread panicked outside a task");
        }
    }
}

/// Execution strategy: one interface, two backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    /// Strategy for an explicit worker count; `1` means sequential
    pub fn for_workers(workers: usize) -> Result<Self> {
        match workers {
            0 => Err(MapReduceError::Configuration(
                "worker count must be at least 1".to_string(),
            )),
            1 => Ok(ExecutionStrategy::Sequential),
            workers => Ok(ExecutionStrategy::Parallel { workers }),
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Parallel { workers } => *workers,
        }
    }

    pub fn execute<A, R, F, P>(
        &self,
        tasks: Vec<Task<A>>,
        transform: F,
        progress: &P,
        ctx: &ExecutionContext,
    ) -> Result<Vec<R>>
    where
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(A, &TaskOptions) -> anyhow::Result<R> + Send + Sync + 'static,
        P: ProgressSink,
    {
        match self {
            ExecutionStrategy::Sequential => {
                SequentialExecutor::execute(tasks, transform, progress, ctx)
            }
            ExecutionStrategy::Parallel { workers } => {
                ParallelExecutor::new(*workers).execute(tasks, transform, progress, ctx)
            }
        }
    }

    /// Calculate optimal workers based on available system resources and configuration limits
    ///
    /// # Algorithm
    /// ```text
    /// 1. Detect available CPU cores: num_cpus::get()
    /// 2. Apply percentage: cores * thread_percentage / 100
    /// 3. Apply config limit: min(max_threads_config, percentage_result) if max_threads_config > 0
    /// 4. Ensure minimum: max(1, final_result)
    /// ```
    ///
    /// # Examples
    /// ```rust
    /// use parfold::parallel::ExecutionStrategy;
    ///
    /// let workers = ExecutionStrategy::calculate_optimal_workers(0, 75);
    /// assert!(workers >= 1);
    ///
    /// let workers = ExecutionStrategy::calculate_optimal_workers(8, 75);
    /// assert!(workers <= 8);
    /// ```
    pub fn calculate_optimal_workers(max_threads_config: usize, thread_percentage: u8) -> usize {
        let available_cores = num_cpus::get();

        let workers_by_percentage =
            std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

        // 0 means use percentage calculation only
        if max_threads_config > 0 {
            std::cmp::min(max_threads_config, workers_by_percentage)
        } else {
            workers_by_percentage
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::input::normalize;
    use crate::parallel::progress::{CountingProgress, NoProgress, ProgressHandle};

    fn double(x: i32, _: &TaskOptions) -> anyhow::Result<i32> {
        Ok(x * 2)
    }

    #[test]
    fn test_sequential_executor() {
        let tasks = normalize(vec![1, 2, 3, 4, 5]).unwrap();
        let results =
            SequentialExecutor::execute(tasks, double, &NoProgress, &ExecutionContext::default())
                .unwrap();
        assert_eq!(results, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_parallel_executor_preserves_order() {
        let tasks = normalize(1..=50).unwrap();
        let results = ParallelExecutor::new(4)
            .execute(
                tasks,
                |x: i32, _: &TaskOptions| {
                    // Later items finish first
                    std::thread::sleep(Duration::from_millis((50 - x as u64) / 10));
                    Ok(x * 2)
                },
                &NoProgress,
                &ExecutionContext::default(),
            )
            .unwrap();
        assert_eq!(results, (1..=50).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_parallel_progress_counts_successes() {
        let sink = CountingProgress::new();
        let counts = sink.counts();
        let tasks = normalize(0..20).unwrap();
        ParallelExecutor::new(3)
            .execute(tasks, double, &sink, &ExecutionContext::default())
            .unwrap();
        assert_eq!(counts.total(), 20);
        assert_eq!(counts.advanced(), 20);
        assert_eq!(counts.finished(), 1);
        assert_eq!(counts.late(), 0);
    }

    #[test]
    fn test_sequential_progress_counts_successes() {
        let sink = CountingProgress::new();
        let counts = sink.counts();
        let tasks = normalize(vec![1, 2, 3]).unwrap();
        SequentialExecutor::execute(tasks, double, &sink, &ExecutionContext::default()).unwrap();
        assert_eq!(counts.advanced(), 3);
        assert_eq!(counts.finished(), 1);
    }

    #[test]
    fn test_panicking_transform_is_a_task_error() {
        let tasks = normalize(vec![1, 2, 3]).unwrap();
        let err = ParallelExecutor::new(2)
            .execute(
                tasks,
                |x: i32, _: &TaskOptions| -> anyhow::Result<i32> {
                    if x == 2 {
                        panic!("bad item");
                    }
                    Ok(x)
                },
                &NoProgress,
                &ExecutionContext::default(),
            )
            .unwrap_err();
        assert_eq!(err.task_position(), Some(1));
        assert!(err.to_string().contains("bad item"));
    }

    #[test]
    fn test_stuck_worker_is_detached_after_grace_period() {
        let ctx = ExecutionContext {
            grace_period: Duration::from_millis(50),
            ..ExecutionContext::default()
        };
        let tasks = normalize(vec![0, 1]).unwrap();
        let started = Instant::now();
        let err = ParallelExecutor::new(2)
            .execute(
                tasks,
                |x: u64, _: &TaskOptions| -> anyhow::Result<u64> {
                    if x == 0 {
                        std::thread::sleep(Duration::from_millis(200));
                        return Err(anyhow!("slow failure"));
                    }
                    Err(anyhow!("fast failure"))
                },
                &NoProgress,
                &ctx,
            )
            .unwrap_err();

        assert!(matches!(err, MapReduceError::PoolTeardown { running: 1, .. }));
        assert_eq!(err.task_position(), Some(1));
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_panicking_sink_never_aborts_the_run() {
        struct ExplodingSink;
        struct ExplodingHandle;

        impl ProgressHandle for ExplodingHandle {
            fn advance(&mut self) {
                panic!("progress display crashed");
            }
        }

        impl ProgressSink for ExplodingSink {
            type Handle = ExplodingHandle;

            fn start(&self, _total: usize) -> Self::Handle {
                ExplodingHandle
            }
        }

        for workers in [1, 3] {
            let results = ExecutionStrategy::for_workers(workers)
                .unwrap()
                .execute(
                    normalize(vec![1, 2, 3]).unwrap(),
                    double,
                    &ExplodingSink,
                    &ExecutionContext::default(),
                )
                .unwrap();
            assert_eq!(results, vec![2, 4, 6], "workers = {workers}");
        }
    }

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn test_spawn_failure_still_stops_listener() {
        // No address space can back a 1 EiB stack, so the first worker fails to spawn
        let ctx = ExecutionContext {
            stack_size: Some(1 << 60),
            ..ExecutionContext::default()
        };
        let sink = CountingProgress::new();
        let counts = sink.counts();

        let err = ParallelExecutor::new(2)
            .execute(normalize(vec![1, 2, 3]).unwrap(), double, &sink, &ctx)
            .unwrap_err();

        assert!(matches!(err, MapReduceError::Spawn(_)));
        assert_eq!(counts.started(), 1);
        assert_eq!(counts.finished(), 1);
        assert_eq!(counts.advanced(), 0);
    }

    #[test]
    fn test_strategy_for_workers() {
        assert_eq!(
            ExecutionStrategy::for_workers(1).unwrap(),
            ExecutionStrategy::Sequential
        );
        assert_eq!(
            ExecutionStrategy::for_workers(4).unwrap(),
            ExecutionStrategy::Parallel { workers: 4 }
        );
        assert!(matches!(
            ExecutionStrategy::for_workers(0),
            Err(MapReduceError::Configuration(_))
        ));
        assert_eq!(ExecutionStrategy::Parallel { workers: 3 }.workers(), 3);
    }

    #[test]
    fn test_execution_strategy() {
        let work_items = vec![1, 2, 3];

        let sequential = ExecutionStrategy::Sequential
            .execute(
                normalize(work_items.clone()).unwrap(),
                |x: i32, _: &TaskOptions| Ok(x * 3),
                &NoProgress,
                &ExecutionContext::default(),
            )
            .unwrap();
        assert_eq!(sequential, vec![3, 6, 9]);

        let parallel = ExecutionStrategy::Parallel { workers: 2 }
            .execute(
                normalize(work_items).unwrap(),
                |x: i32, _: &TaskOptions| Ok(x * 3),
                &NoProgress,
                &ExecutionContext::default(),
            )
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_optimal_workers_calculation() {
        assert!(ExecutionStrategy::calculate_optimal_workers(0, 75) >= 1);
        assert!(ExecutionStrategy::calculate_optimal_workers(2, 100) <= 2);
    }
}
