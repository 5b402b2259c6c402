//! # parfold - bounded-parallelism map-reduce
//!
//! Distribute a transform over a fixed pool of worker threads, stream live
//! progress through a single listener, and fold the outputs in input order.
//!
//! ```rust
//! use parfold::MapReduce;
//!
//! let total = MapReduce::new(4).map_reduce(
//!     vec![(1, 2), (3, 4)],
//!     |(a, b): (i32, i32), _| Ok(a * b),
//!     0,
//!     |product, acc| acc + product,
//! )?;
//! assert_eq!(total, 14);
//! # Ok::<(), parfold::MapReduceError>(())
//! ```
//!
//! Around the executor the crate carries the pieces a batch job needs:
//! layered configuration ([`config`]), logging setup ([`logging`]), path and
//! storage helpers ([`io`]), list splitting ([`utils`]) and bootstrap
//! statistics ([`stats`]).

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod parallel;
pub mod stats;
pub mod utils;

pub use config::ParfoldConfig;
pub use error::MapReduceError;
pub use parallel::{MapReduce, TaskOptions};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
