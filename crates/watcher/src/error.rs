//! Watcher error type

use pollwatch_core::ConfigError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the watcher, either synchronously (construction,
/// start) or as payloads on a path's `error` channel.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid watcher configuration")]
    Config(#[from] ConfigError),

    #[error("failed to stat {}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read new content from {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to register native notifications for {}", path.display())]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("no Tokio runtime available to drive the watcher")]
    NoRuntime,
}

impl WatchError {
    /// Underlying I/O error for stat and read failures
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            WatchError::Stat { source, .. } | WatchError::Read { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this is the "file not found" class
    pub fn is_not_found(&self) -> bool {
        self.io_error()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
