//! Change detection primitives for pollwatch
//!
//! This crate provides:
//! - Per-file state records (existence, size, modification time, activity)
//! - Change classification from stat deltas
//! - Adaptive polling interval control
//! - Watcher configuration (TOML, validated bounds)
//!
//! Nothing in here performs I/O apart from loading a config file; the async
//! engine lives in the `pollwatch` crate.

pub mod classify;
pub mod config;
pub mod interval;
pub mod state;

// Re-exports
pub use classify::{classify, Change, FileStat};
pub use config::{ConfigError, WatchConfig};
pub use interval::IntervalController;
pub use state::{Transition, WatchedFile};
