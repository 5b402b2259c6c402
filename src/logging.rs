//! Logging setup and the report sink used by utility functions

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogTarget {
    #[default]
    Console,
    /// Append to this file, creating parent directories
    File(PathBuf),
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `level`; `verbose` and `quiet` override `level`.
/// Installing twice is not an error, the first subscriber stays active.
pub fn init(level: &str, target: &LogTarget, verbose: u8, quiet: bool) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => level,
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = match target {
        LogTarget::Console => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
        LogTarget::File(path) => {
            let path = crate::io::ensure_filedir(path)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };

    if let Err(err) = installed {
        tracing::debug!("logger already installed: {err}");
    }
    Ok(())
}

/// Free-form status line sink
///
/// Implementations must never fail or panic; reporting is best effort.
pub trait Report: Send + Sync {
    fn report(&self, message: &str);
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReport;

impl Report for SilentReport {
    fn report(&self, _message: &str) {}
}

/// Forwards messages to `tracing::info!`, with an optional `[a][b]` prefix
#[derive(Debug, Clone, Default)]
pub struct TracingReport {
    prefix: Option<String>,
}

impl TracingReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(parts: &[&str]) -> Self {
        if parts.is_empty() {
            return Self::default();
        }
        let prefix = parts.iter().map(|part| format!("[{part}]")).collect();
        Self {
            prefix: Some(prefix),
        }
    }

    pub fn format(&self, message: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix} {message}"),
            None => message.to_string(),
        }
    }
}

impl Report for TracingReport {
    fn report(&self, message: &str) {
        tracing::info!("{}", self.format(message));
    }
}

/// Collects messages in memory
#[derive(Debug, Default)]
pub struct MemoryReport {
    messages: Mutex<Vec<String>>,
}

impl MemoryReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl Report for MemoryReport {
    fn report(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

/// Log an error together with its full cause chain
pub fn report_error(message: &str, err: &anyhow::Error) {
    tracing::error!("{message}: {err:#}");
}
