//! Per-path poll loop
//!
//! Each watched path gets one task that owns its [`WatchedFile`]. A cycle
//! stats the file, turns the result into at most one event, lets the
//! interval controller adjust the cadence, then sleeps. Native hints that
//! arrive while sleeping trigger an existence re-check without moving the
//! next deadline.

use crate::sink::{Emission, EventSink};
use crate::{TruncateInfo, WatchError};
use pollwatch_core::{Change, FileStat, IntervalController, Transition, WatchedFile};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// The poll loop for one path
pub(crate) struct PollLoop {
    file: WatchedFile,
    controller: IntervalController,
    sink: Arc<EventSink>,
    cancel: CancellationToken,
    hints: mpsc::Receiver<()>,
    interval_tx: watch::Sender<Duration>,
}

impl PollLoop {
    pub(crate) fn new(
        path: PathBuf,
        initial_interval: Duration,
        controller: IntervalController,
        sink: Arc<EventSink>,
        cancel: CancellationToken,
        hints: mpsc::Receiver<()>,
        interval_tx: watch::Sender<Duration>,
    ) -> Self {
        Self {
            file: WatchedFile::new(path, initial_interval),
            controller,
            sink,
            cancel,
            hints,
            interval_tx,
        }
    }

    /// Run until cancelled
    pub(crate) async fn run(mut self) {
        debug!(
            path = %self.file.path().display(),
            interval_ms = self.file.poll_interval().as_millis() as u64,
            "starting poll loop"
        );

        loop {
            let stat = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                stat = stat_file(self.file.path()) => stat,
            };

            self.poll_cycle(stat);

            let deadline = Instant::now() + self.file.poll_interval();
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return,
                    _ = sleep_until(deadline) => break,
                    Some(()) = self.hints.recv() => {
                        if !self.recheck_existence().await {
                            return;
                        }
                    }
                }
            }
        }

        debug!(path = %self.file.path().display(), "poll loop stopped");
    }

    /// Apply one stat result and adjust the interval.
    ///
    /// A failure other than not-found skips the cycle entirely: no state
    /// changes and the interval stays where it was.
    fn poll_cycle(&mut self, stat: io::Result<FileStat>) {
        let transition = match stat {
            Ok(stat) => self.file.observe_present(stat),
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.file.observe_missing(),
            Err(source) => {
                self.report_error(source);
                return;
            }
        };

        if let Some(transition) = transition {
            self.emit_transition(transition);
        }

        let previous = self.file.poll_interval();
        if let Some(next) = self.file.finish_cycle(&self.controller) {
            if next < previous {
                debug!(
                    path = %self.file.path().display(),
                    interval_ms = next.as_millis() as u64,
                    "high activity, polling faster"
                );
            } else {
                debug!(
                    path = %self.file.path().display(),
                    interval_ms = next.as_millis() as u64,
                    "low activity, polling slower"
                );
            }
            self.interval_tx.send_replace(next);
        }
    }

    /// Out-of-band existence check after a native hint.
    ///
    /// Only create/delete transitions come out of this; modifications wait
    /// for the regular cycle. Returns `false` if cancelled meanwhile.
    async fn recheck_existence(&mut self) -> bool {
        let stat = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            stat = stat_file(self.file.path()) => stat,
        };

        trace!(path = %self.file.path().display(), "existence re-check");

        let transition = match stat {
            Ok(stat) => self.file.observe_exists(stat),
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.file.observe_missing(),
            // The next regular cycle reports it
            Err(_) => None,
        };

        if let Some(transition) = transition {
            self.emit_transition(transition);
        }
        true
    }

    fn emit_transition(&self, transition: Transition) {
        let path = self.file.path();

        let emission = match transition {
            Transition::Created => {
                info!(path = %path.display(), size = self.file.last_size(), "file created or renamed back");
                Emission::Create
            }
            Transition::Deleted => {
                info!(path = %path.display(), "file deleted or renamed away");
                Emission::Delete
            }
            Transition::Changed(Change::Write { range }) => {
                debug!(path = %path.display(), size = range.end, "file written");
                Emission::Write(range)
            }
            Transition::Changed(Change::Append { range }) => {
                debug!(path = %path.display(), size = range.end, "file rewritten in place");
                Emission::Append(range)
            }
            Transition::Changed(Change::Truncate { size, modified }) => {
                debug!(path = %path.display(), size, "file truncated");
                Emission::Truncate(TruncateInfo { size, modified })
            }
        };

        self.emit(emission);
    }

    fn report_error(&self, source: io::Error) {
        warn!(path = %self.file.path().display(), error = %source, "stat failed");
        let err = WatchError::Stat {
            path: self.file.path().to_path_buf(),
            source,
        };
        self.emit(Emission::Error(Arc::new(err)));
    }

    fn emit(&self, emission: Emission) {
        // A stat that finished after stop/unwatch is dropped
        if self.cancel.is_cancelled() {
            return;
        }
        self.sink.emit(self.file.path(), emission);
    }
}

async fn stat_file(path: &Path) -> io::Result<FileStat> {
    let metadata = tokio::fs::metadata(path).await?;
    Ok(FileStat::new(metadata.len(), metadata.modified()?))
}
