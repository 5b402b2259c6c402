//! Small helpers shared by the executor and the CLI

use crate::error::{MapReduceError, Result};
use std::time::{Duration, Instant};

/// How [`split_list`] partitions its input
///
/// Criteria are tried in field order: explicit `splits` first, then
/// `n_splits`, then `split_size`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOptions {
    /// Cut positions; `[0, 2, 4]` on five items gives `[], [1, 2], [3, 4], [5]`
    pub splits: Option<Vec<usize>>,
    /// Upper bound on the chunk count; chunks hold `ceil(n / n_splits)` items
    /// and the last may be shorter. Fewer chunks come back when the items run
    /// out first: 2 items into 5 splits give 2 chunks, 9 into 6 give 5.
    pub n_splits: Option<usize>,
    /// Fixed chunk length
    pub split_size: Option<usize>,
}

impl SplitOptions {
    pub fn at(splits: Vec<usize>) -> Self {
        Self {
            splits: Some(splits),
            ..Self::default()
        }
    }

    pub fn into_n(n_splits: usize) -> Self {
        Self {
            n_splits: Some(n_splits),
            ..Self::default()
        }
    }

    pub fn of_size(split_size: usize) -> Self {
        Self {
            split_size: Some(split_size),
            ..Self::default()
        }
    }
}

/// Split items into ordered sub-lists
///
/// Concatenating the result always gives back the input. Empty input yields a
/// single empty split.
pub fn split_list<T>(items: Vec<T>, options: &SplitOptions) -> Result<Vec<Vec<T>>> {
    let total = items.len();

    let bounds = if let Some(splits) = &options.splits {
        let mut bounds = Vec::with_capacity(splits.len() + 2);
        bounds.push(0);
        bounds.extend(splits.iter().copied());
        bounds.push(total);
        if bounds.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(MapReduceError::Configuration(format!(
                "split positions {splits:?} must be ascending and within 0..={total}"
            )));
        }
        bounds
    } else {
        let size = match (options.n_splits, options.split_size) {
            (Some(0), _) => {
                return Err(MapReduceError::Configuration(
                    "n_splits must be positive".to_string(),
                ));
            }
            (Some(n_splits), _) => total.div_ceil(n_splits).max(1),
            (None, Some(0)) => {
                return Err(MapReduceError::Configuration(
                    "split_size must be positive".to_string(),
                ));
            }
            (None, Some(split_size)) => split_size,
            (None, None) => {
                return Err(MapReduceError::Configuration(
                    "no split criterion: pass splits, n_splits or split_size".to_string(),
                ));
            }
        };
        if total == 0 {
            return Ok(vec![Vec::new()]);
        }
        let mut bounds: Vec<usize> = (0..total).step_by(size).collect();
        bounds.push(total);
        bounds
    };

    let mut remaining = items.into_iter();
    Ok(bounds
        .windows(2)
        .map(|pair| remaining.by_ref().take(pair[1] - pair[0]).collect())
        .collect())
}

/// Trim and collapse every whitespace run into a single space
pub fn flatten_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wall-clock timer; the first `elapsed` read stops it
#[derive(Debug, Clone)]
pub struct Stopwatch {
    started_at: Instant,
    stopped: Option<Duration>,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            stopped: None,
        }
    }

    /// Elapsed time, frozen at the first call
    pub fn elapsed(&mut self) -> Duration {
        *self.stopped.get_or_insert_with(|| self.started_at.elapsed())
    }

    pub fn elapsed_ms(&mut self) -> u128 {
        self.elapsed().as_millis()
    }

    pub fn restart(&mut self) {
        self.started_at = Instant::now();
        self.stopped = None;
    }
}
