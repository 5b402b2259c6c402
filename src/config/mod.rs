//! Configuration management for parfold
//!
//! Settings are layered with figment: embedded defaults, then user and
//! project files, then `PARFOLD_*` environment variables.

use crate::parallel::ExecutionStrategy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod core;

/// Main configuration structure for parfold
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ParfoldConfig {
    /// Executor settings
    pub parallel: ParallelSettings,

    /// Logging settings
    pub logging: LoggingSettings,
}

/// Executor settings (`[parallel]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParallelSettings {
    /// Worker threads (0 = derive from CPU cores)
    pub workers: usize,

    /// Maximum number of derived worker threads (0 = no limit)
    pub max_threads: usize,

    /// Percentage of CPU cores to use (1-100)
    pub thread_percentage: u8,

    /// Task queue capacity per worker
    pub channel_buffer_multiplier: usize,

    /// Show a progress bar
    pub progress: bool,

    /// Grace period for in-flight tasks after a failure or cancellation
    pub grace_period_ms: u64,

    /// Collector poll interval
    pub poll_interval_ms: u64,
}

impl Default for ParallelSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            max_threads: 0,
            thread_percentage: 75,
            channel_buffer_multiplier: 2,
            progress: true,
            grace_period_ms: 2000,
            poll_interval_ms: 50,
        }
    }
}

impl ParallelSettings {
    /// Explicit worker count, or one derived from CPU cores
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            ExecutionStrategy::calculate_optimal_workers(self.max_threads, self.thread_percentage)
        }
    }
}

/// Logging settings (`[logging]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,

    /// Log to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl ParfoldConfig {
    /// Load configuration from the standard locations
    pub fn load() -> Result<Self> {
        self::core::load(None)
    }

    /// Load defaults, then only the given file, then environment variables
    pub fn load_with_custom_config(custom_config: Option<&str>) -> Result<Self> {
        self::core::load(custom_config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let parallel = &self.parallel;

        if !(1..=100).contains(&parallel.thread_percentage) {
            anyhow::bail!(
                "parallel.thread_percentage must be between 1 and 100, got {}",
                parallel.thread_percentage
            );
        }
        if parallel.channel_buffer_multiplier == 0 {
            anyhow::bail!("parallel.channel_buffer_multiplier cannot be 0");
        }
        if parallel.poll_interval_ms == 0 {
            anyhow::bail!("parallel.poll_interval_ms cannot be 0");
        }
        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level cannot be empty");
        }

        Ok(())
    }
}
