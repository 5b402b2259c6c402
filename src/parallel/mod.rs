//! Bounded-parallelism map-reduce
//!
//! # Architecture Responsibilities
//!
//! ```text
//! inputs ──▶ normalize ──▶ ExecutionStrategy ──▶ ordered outputs ──▶ fold (optional)
//!                            │ Sequential: in-order loop, no threads
//!                            │ Parallel:   producer ─▶ work queue ─▶ N workers ─▶ collector
//!                            │                                    └─▶ progress channel ─▶ listener
//! ```
//!
//! - **Input normalization**: positions are assigned up front; an empty
//!   collection is rejected before any thread is spawned.
//! - **Worker pool**: at most `workers` OS threads; output slot *i* always
//!   holds the result for input *i*, whatever the completion order.
//! - **Progress**: one signal per successful task on a channel that can hold
//!   every signal, drained by one listener thread. The terminal sentinel is
//!   sent after the pool stops and the listener is joined before returning.
//!   [`NoProgress`] builds neither.
//! - **Reduction**: a strict left fold in the calling thread, after all
//!   outputs are in.
//! - **Failure**: the first failing task cancels dispatch; in-flight tasks get
//!   a bounded grace period, after which stragglers are detached.
//!
//! # Example Usage
//!
//! ```rust
//! use parfold::parallel::{CountingProgress, MapReduce, TaskOptions};
//!
//! let progress = CountingProgress::new();
//! let counts = progress.counts();
//!
//! let lengths = MapReduce::new(4)
//!     .progress(progress)
//!     .options(TaskOptions::new().with("suffix", "!"))
//!     .map(vec!["a", "bb", "ccc"], |word, opts| {
//!         let suffix: String = opts.get_or("suffix", String::new());
//!         Ok(format!("{word}{suffix}").len())
//!     })?;
//!
//! assert_eq!(lengths, vec![2, 3, 4]);
//! assert_eq!(counts.advanced(), 3);
//! # Ok::<(), parfold::MapReduceError>(())
//! ```

pub mod core;
pub mod executor;
pub mod input;
pub mod progress;
pub mod reduce;

pub use self::core::{ExecutionContext, ExecutionStrategy, ParallelExecutor, SequentialExecutor};
pub use executor::{MapReduce, map, map_reduce};
pub use input::{Task, TaskOptions, normalize};
pub use progress::{
    BarProgress, CountingProgress, NoProgress, ProgressCounts, ProgressHandle, ProgressSignal,
    ProgressSink,
};
pub use reduce::fold_ordered;
