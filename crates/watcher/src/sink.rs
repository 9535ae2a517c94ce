//! Subscriber registry keyed by `(path, kind)`
//!
//! Poll loops hand the sink an [`Emission`]; the sink builds one
//! [`FileEvent`] per matching subscriber. Content payloads get their own
//! [`ContentStream`] each, since a stream can only be consumed once.

use crate::reader::ContentStream;
use crate::{EventKind, FileEvent, TruncateInfo, WatchError, WatchEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifies one event channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub path: PathBuf,
    pub kind: EventKind,
}

impl EventKey {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Event as produced by a poll loop, before fan-out
#[derive(Debug, Clone)]
pub(crate) enum Emission {
    Create,
    Delete,
    Write(Range<u64>),
    Append(Range<u64>),
    Truncate(TruncateInfo),
    Error(Arc<WatchError>),
}

impl Emission {
    fn kind(&self) -> EventKind {
        match self {
            Emission::Create => EventKind::Create,
            Emission::Delete => EventKind::Delete,
            Emission::Write(_) => EventKind::Write,
            Emission::Append(_) => EventKind::Append,
            Emission::Truncate(_) => EventKind::Truncate,
            Emission::Error(_) => EventKind::Error,
        }
    }
}

#[derive(Default)]
struct Registry {
    closed: bool,
    subscribers: HashMap<EventKey, Vec<mpsc::UnboundedSender<WatchEvent>>>,
}

/// Per-path, per-kind event channels
#[derive(Default)]
pub struct EventSink {
    registry: RwLock<Registry>,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("EventSink")
            .field("closed", &registry.closed)
            .field("keys", &registry.subscribers.len())
            .finish()
    }
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one or more kinds on a path through a single receiver.
    ///
    /// A closed sink hands back a subscription that yields nothing.
    pub fn subscribe(
        &self,
        path: &Path,
        kinds: impl IntoIterator<Item = EventKind>,
    ) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.registry.write();

        if !registry.closed {
            for kind in kinds {
                registry
                    .subscribers
                    .entry(EventKey::new(path, kind))
                    .or_default()
                    .push(tx.clone());
            }
        }

        Subscription { rx }
    }

    /// Live subscribers on a channel
    pub fn subscriber_count(&self, key: &EventKey) -> usize {
        self.registry
            .read()
            .subscribers
            .get(key)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.registry.read().closed
    }

    /// Drop every subscriber of `path`
    pub fn remove_path(&self, path: &Path) {
        self.registry
            .write()
            .subscribers
            .retain(|key, _| key.path != path);
    }

    /// Detach all subscribers and refuse further emissions
    pub fn close(&self) {
        let mut registry = self.registry.write();
        registry.closed = true;
        registry.subscribers.clear();
    }

    /// Deliver an emission to every subscriber of `(path, kind)`.
    ///
    /// Returns the number of subscribers reached. Nothing is delivered once
    /// the sink is closed.
    pub(crate) fn emit(self: &Arc<Self>, path: &Path, emission: Emission) -> usize {
        let key = EventKey::new(path, emission.kind());
        let mut delivered = 0;
        let mut saw_closed = false;

        {
            let registry = self.registry.read();
            if registry.closed {
                return 0;
            }

            let Some(senders) = registry.subscribers.get(&key) else {
                return 0;
            };

            for tx in senders {
                let event = WatchEvent {
                    path: path.to_path_buf(),
                    event: self.materialize(path, &emission),
                };
                if tx.send(event).is_ok() {
                    delivered += 1;
                } else {
                    saw_closed = true;
                }
            }
        }

        if saw_closed {
            self.prune(&key);
        }

        delivered
    }

    fn materialize(self: &Arc<Self>, path: &Path, emission: &Emission) -> FileEvent {
        match emission {
            Emission::Create => FileEvent::Create,
            Emission::Delete => FileEvent::Delete,
            Emission::Write(range) => FileEvent::Write(self.content(path, range)),
            Emission::Append(range) => FileEvent::Append(self.content(path, range)),
            Emission::Truncate(info) => FileEvent::Truncate(*info),
            Emission::Error(err) => FileEvent::Error(Arc::clone(err)),
        }
    }

    fn content(self: &Arc<Self>, path: &Path, range: &Range<u64>) -> ContentStream {
        ContentStream::new(path, range.clone()).with_error_sink(Arc::downgrade(self))
    }

    fn prune(&self, key: &EventKey) {
        let mut registry = self.registry.write();
        if let Some(senders) = registry.subscribers.get_mut(key) {
            senders.retain(|tx| !tx.is_closed());
            if senders.is_empty() {
                registry.subscribers.remove(key);
            }
        }
    }
}

/// Receiving end of one or more event channels
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl Subscription {
    /// Wait for the next event; `None` once the watcher has detached it
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<WatchEvent> {
        self.rx.try_recv().ok()
    }
}
