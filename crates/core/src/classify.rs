//! Classify a modification from two stat snapshots
//!
//! Size delta is the only signal available without reading the file, so it
//! decides between growth, shrink, and same-length rewrite.

use std::cmp::Ordering;
use std::ops::Range;
use std::time::SystemTime;

/// The subset of file metadata the watcher tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Length in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileStat {
    pub fn new(size: u64, modified: SystemTime) -> Self {
        Self { size, modified }
    }
}

/// A classified modification of an existing file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The file grew; `range` covers the bytes past the previous length
    Write { range: Range<u64> },
    /// Modified at the same length; `range` is empty
    Append { range: Range<u64> },
    /// The file shrank. No content is read
    Truncate { size: u64, modified: SystemTime },
}

impl Change {
    /// Byte range to read for this change, if any
    pub fn read_range(&self) -> Option<Range<u64>> {
        match self {
            Change::Write { range } | Change::Append { range } => Some(range.clone()),
            Change::Truncate { .. } => None,
        }
    }
}

/// Classify the move from `previous` to `current`.
///
/// Returns `None` when the modification time did not change.
pub fn classify(previous: FileStat, current: FileStat) -> Option<Change> {
    if current.modified == previous.modified {
        return None;
    }

    let change = match current.size.cmp(&previous.size) {
        Ordering::Greater => Change::Write {
            range: previous.size..current.size,
        },
        Ordering::Less => Change::Truncate {
            size: current.size,
            modified: current.modified,
        },
        Ordering::Equal => Change::Append {
            range: previous.size..current.size,
        },
    };

    Some(change)
}
