//! Per-path watch state
//!
//! A [`WatchedFile`] is owned by exactly one poll loop. It turns raw
//! observations (stat succeeded / file missing) into transitions and keeps
//! the counters the interval controller needs.

use crate::classify::{classify, Change, FileStat};
use crate::interval::IntervalController;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// A state change worth reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Went from missing to present
    Created,
    /// Went from present to missing
    Deleted,
    /// Present file whose modification time moved
    Changed(Change),
}

/// Mutable record for one watched path
#[derive(Debug, Clone)]
pub struct WatchedFile {
    path: PathBuf,
    exists: bool,
    last_size: u64,
    last_modified: Option<SystemTime>,
    activity_count: u32,
    poll_interval: Duration,
    cycles_since_adjust: u32,
}

impl WatchedFile {
    /// Fresh record: not existing, zero counters
    pub fn new(path: impl Into<PathBuf>, initial_interval: Duration) -> Self {
        Self {
            path: path.into(),
            exists: false,
            last_size: 0,
            last_modified: None,
            activity_count: 0,
            poll_interval: initial_interval,
            cycles_since_adjust: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn last_size(&self) -> u64 {
        self.last_size
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn activity_count(&self) -> u32 {
        self.activity_count
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The file could not be found
    pub fn observe_missing(&mut self) -> Option<Transition> {
        if !self.exists {
            return None;
        }

        self.exists = false;
        Some(Transition::Deleted)
    }

    /// The file exists; only reports the missing -> present edge.
    ///
    /// Size and modification time are taken from `stat` on that edge so the
    /// next classification starts from what was seen at creation.
    pub fn observe_exists(&mut self, stat: FileStat) -> Option<Transition> {
        if self.exists {
            return None;
        }

        self.exists = true;
        self.last_size = stat.size;
        self.last_modified = Some(stat.modified);
        Some(Transition::Created)
    }

    /// Full poll-cycle observation of a present file.
    ///
    /// At most one transition comes out of a cycle: a create consumes the
    /// stat as its baseline, so no modification is seen alongside it.
    pub fn observe_present(&mut self, stat: FileStat) -> Option<Transition> {
        if let Some(created) = self.observe_exists(stat) {
            return Some(created);
        }

        let previous = FileStat::new(self.last_size, self.last_modified?);
        let change = classify(previous, stat)?;

        self.activity_count = self.activity_count.saturating_add(1);
        self.last_size = stat.size;
        self.last_modified = Some(stat.modified);
        Some(Transition::Changed(change))
    }

    /// Close out a poll cycle.
    ///
    /// Once the controller's window has elapsed the interval is recomputed
    /// and the activity count reset. Returns the new interval when it moved.
    pub fn finish_cycle(&mut self, controller: &IntervalController) -> Option<Duration> {
        self.cycles_since_adjust += 1;
        if self.cycles_since_adjust < controller.window() {
            return None;
        }

        let previous = self.poll_interval;
        self.poll_interval = controller.next_interval(previous, self.activity_count);
        self.activity_count = 0;
        self.cycles_since_adjust = 0;

        (self.poll_interval != previous).then_some(self.poll_interval)
    }
}
