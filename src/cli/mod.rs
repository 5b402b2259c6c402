//! Command-line interface for parfold

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;
