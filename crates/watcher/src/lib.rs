//! Adaptive polling file watcher
//!
//! This crate watches an explicit list of files and reports, per path:
//! - create / delete (including rename away and back)
//! - write (growth), append (same-length rewrite), truncate
//! - errors other than "not found"
//!
//! Each path is polled by its own task whose interval halves under heavy
//! activity and doubles when quiet, within configured bounds. Native
//! rename/unlink notifications are used as an advisory early signal.
//!
//! ```no_run
//! # async fn demo() -> pollwatch::Result<()> {
//! use pollwatch::{EventKind, FileEvent, WatchConfig, Watcher};
//!
//! let watcher = Watcher::new(["/var/log/app.log"], WatchConfig::default())?;
//! let mut writes = watcher.subscribe("/var/log/app.log", EventKind::Write);
//! watcher.start()?;
//!
//! while let Some(event) = writes.recv().await {
//!     if let FileEvent::Write(stream) = event.event {
//!         print!("{}", stream.read_to_string().await?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
mod hook;
mod poll;
pub mod reader;
pub mod sink;

pub use error::{Result, WatchError};
pub use pollwatch_core::{ConfigError, IntervalController, WatchConfig};
pub use reader::{ContentStream, StreamStatus};
pub use sink::{EventKey, EventSink, Subscription};

use crate::hook::NativeHook;
use crate::poll::PollLoop;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Kind of event reported for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// File appeared (or was renamed back)
    Create,
    /// File disappeared (or was renamed away)
    Delete,
    /// File grew
    Write,
    /// File modified at the same length
    Append,
    /// File shrank
    Truncate,
    /// Stat or read failure other than "not found"
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Create,
        EventKind::Delete,
        EventKind::Write,
        EventKind::Append,
        EventKind::Truncate,
        EventKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Delete => "delete",
            EventKind::Write => "write",
            EventKind::Append => "append",
            EventKind::Truncate => "truncate",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a truncate event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncateInfo {
    /// Length after truncation
    pub size: u64,
    /// Modification time after truncation
    pub modified: SystemTime,
}

/// Event payload
#[derive(Debug)]
pub enum FileEvent {
    Create,
    Delete,
    /// New bytes past the previous length
    Write(ContentStream),
    /// Same-length rewrite; the stream covers an empty range
    Append(ContentStream),
    Truncate(TruncateInfo),
    Error(Arc<WatchError>),
}

impl FileEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            FileEvent::Create => EventKind::Create,
            FileEvent::Delete => EventKind::Delete,
            FileEvent::Write(_) => EventKind::Write,
            FileEvent::Append(_) => EventKind::Append,
            FileEvent::Truncate(_) => EventKind::Truncate,
            FileEvent::Error(_) => EventKind::Error,
        }
    }

    /// Content stream of a write or append
    pub fn into_content(self) -> Option<ContentStream> {
        match self {
            FileEvent::Write(stream) | FileEvent::Append(stream) => Some(stream),
            _ => None,
        }
    }
}

/// An event delivered to a subscriber
#[derive(Debug)]
pub struct WatchEvent {
    /// Path that changed
    pub path: PathBuf,
    pub event: FileEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

/// Running state of one path
struct PathEntry {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    hook: Option<NativeHook>,
    interval: watch::Receiver<Duration>,
}

struct Inner {
    lifecycle: Lifecycle,
    paths: Vec<PathBuf>,
    entries: HashMap<PathBuf, PathEntry>,
}

/// Adaptive polling watcher over a fixed list of files
pub struct Watcher {
    config: WatchConfig,
    controller: IntervalController,
    sink: Arc<EventSink>,
    cancel: CancellationToken,
    inner: Mutex<Inner>,
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Watcher")
            .field("config", &self.config)
            .field("lifecycle", &inner.lifecycle)
            .field("paths", &inner.paths)
            .finish()
    }
}

impl Watcher {
    /// Create a watcher for `paths`; nothing runs until [`Watcher::start`].
    ///
    /// Duplicate paths are watched once. Fails if the config bounds are
    /// invalid.
    pub fn new<I, P>(paths: I, config: WatchConfig) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        config.validate()?;

        let mut unique = Vec::new();
        for path in paths {
            let path = path.into();
            if !unique.contains(&path) {
                unique.push(path);
            }
        }

        Ok(Self {
            controller: IntervalController::from_config(&config),
            config,
            sink: Arc::new(EventSink::new()),
            cancel: CancellationToken::new(),
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::Idle,
                paths: unique,
                entries: HashMap::new(),
            }),
        })
    }

    /// Start polling (and native hooks) for every path.
    ///
    /// Calling it again while running, or after [`Watcher::stop`], does
    /// nothing. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
        let mut inner = self.inner.lock();

        match inner.lifecycle {
            Lifecycle::Running => {
                warn!("watcher already started");
                return Ok(());
            }
            Lifecycle::Stopped => {
                warn!("watcher was stopped; start ignored");
                return Ok(());
            }
            Lifecycle::Idle => {}
        }

        let paths = inner.paths.clone();
        for path in paths {
            let entry = self.spawn_path(&handle, &path);
            inner.entries.insert(path, entry);
        }
        inner.lifecycle = Lifecycle::Running;

        info!(files = inner.entries.len(), "watcher started");
        Ok(())
    }

    fn spawn_path(&self, handle: &Handle, path: &Path) -> PathEntry {
        let cancel = self.cancel.child_token();
        let (hint_tx, hint_rx) = mpsc::channel(1);
        let (interval_tx, interval_rx) = watch::channel(self.config.initial_interval());

        let hook = if self.config.notify {
            match hook::register(path, hint_tx) {
                Ok(hook) => Some(hook),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "native notifications unavailable, polling only");
                    None
                }
            }
        } else {
            None
        };

        let poll = PollLoop::new(
            path.to_path_buf(),
            self.config.initial_interval(),
            self.controller,
            Arc::clone(&self.sink),
            cancel.clone(),
            hint_rx,
            interval_tx,
        );

        PathEntry {
            cancel,
            task: handle.spawn(poll.run()),
            hook,
            interval: interval_rx,
        }
    }

    /// Stop every poll loop and native hook and detach all subscribers.
    ///
    /// No event is delivered after this returns. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.lifecycle == Lifecycle::Stopped {
            return;
        }
        inner.lifecycle = Lifecycle::Stopped;

        // Closing the sink first waits out any emission in progress
        self.sink.close();
        self.cancel.cancel();

        let stopped = inner.entries.len();
        for (_, entry) in inner.entries.drain() {
            entry.shutdown();
        }

        info!(files = stopped, "watcher stopped");
    }

    /// Stop watching one path and drop its subscribers.
    ///
    /// Returns `false` if the path was not being watched.
    pub fn unwatch(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut inner = self.inner.lock();

        let Some(pos) = inner.paths.iter().position(|p| p == path) else {
            return false;
        };
        inner.paths.remove(pos);

        if let Some(entry) = inner.entries.remove(path) {
            entry.shutdown();
        }
        self.sink.remove_path(path);

        debug!(path = %path.display(), "path unwatched");
        true
    }

    /// Subscribe to one event kind on a path
    pub fn subscribe(&self, path: impl AsRef<Path>, kind: EventKind) -> Subscription {
        self.sink.subscribe(path.as_ref(), [kind])
    }

    /// Subscribe to several kinds on a path through one receiver, keeping
    /// their relative order
    pub fn subscribe_kinds(
        &self,
        path: impl AsRef<Path>,
        kinds: impl IntoIterator<Item = EventKind>,
    ) -> Subscription {
        self.sink.subscribe(path.as_ref(), kinds)
    }

    /// Current polling interval of a running path
    pub fn poll_interval(&self, path: impl AsRef<Path>) -> Option<Duration> {
        let inner = self.inner.lock();
        inner
            .entries
            .get(path.as_ref())
            .map(|entry| *entry.interval.borrow())
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().lifecycle == Lifecycle::Running
    }

    /// Paths currently configured
    pub fn paths(&self) -> Vec<PathBuf> {
        self.inner.lock().paths.clone()
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }
}

impl PathEntry {
    fn shutdown(self) {
        self.cancel.cancel();
        self.task.abort();
        drop(self.hook);
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}
