//! Error taxonomy for the map-reduce core
//!
//! Utility modules (io, config, cli) report through `anyhow`; the executor
//! returns [`MapReduceError`] so callers can match on the failing position.

use thiserror::Error;

/// Errors produced by [`crate::parallel::MapReduce`] and its helpers
#[derive(Debug, Error)]
pub enum MapReduceError {
    /// The input collection had no items
    #[error("input collection is empty")]
    EmptyInput,

    /// Invalid executor or helper configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A transform invocation failed for one task
    #[error("task {position} failed: {source:#}")]
    Task {
        position: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Workers were still busy when the grace period after a failure ran out
    #[error("worker pool not stopped cleanly ({running} workers still running): {source}")]
    PoolTeardown {
        running: usize,
        #[source]
        source: Box<MapReduceError>,
    },

    /// The cancellation token fired before every task completed
    #[error("cancelled after {completed}/{total} tasks")]
    Cancelled { completed: usize, total: usize },

    /// Workers exited without reporting every output
    #[error("{missing} outputs were never reported")]
    Incomplete { missing: usize },

    /// An output slot was written twice
    #[error("output slot {position} written twice")]
    DuplicateOutput { position: usize },

    /// A worker or listener thread could not be spawned
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl MapReduceError {
    /// Position of the failing task, looking through teardown wrappers
    pub fn task_position(&self) -> Option<usize> {
        match self {
            MapReduceError::Task { position, .. } => Some(*position),
            MapReduceError::PoolTeardown { source, .. } => source.task_position(),
            _ => None,
        }
    }

    pub(crate) fn task(position: usize, source: anyhow::Error) -> Self {
        MapReduceError::Task { position, source }
    }
}

pub type Result<T, E = MapReduceError> = std::result::Result<T, E>;
