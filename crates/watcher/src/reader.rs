//! Incremental content reader
//!
//! A [`ContentStream`] covers the half-open byte range `[start, end)` of a
//! file and yields it as UTF-8 text chunks. Nothing is opened until the
//! first pull. The stream is finite and single-use: it ends either
//! completed or errored, and a fresh stream is needed for the next change.

use crate::sink::{Emission, EventSink};
use crate::WatchError;
use futures::Stream;
use std::fmt;
use std::io::{self, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tracing::{debug, warn};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Where a stream is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Not pulled yet; the file is not open
    Pending,
    Reading,
    Completed,
    Errored,
}

enum Inner {
    Pending,
    Reading(Take<File>),
    Done(StreamStatus),
}

/// Lazy, single-use text stream over a byte range of a file
pub struct ContentStream {
    path: PathBuf,
    range: Range<u64>,
    inner: Inner,
    /// Bytes of a multi-byte character split across reads
    carry: Vec<u8>,
    chunk_size: usize,
    error_sink: Option<Weak<EventSink>>,
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("path", &self.path)
            .field("range", &self.range)
            .field("status", &self.status())
            .finish()
    }
}

impl ContentStream {
    pub fn new(path: impl Into<PathBuf>, range: Range<u64>) -> Self {
        Self {
            path: path.into(),
            range,
            inner: Inner::Pending,
            carry: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            error_sink: None,
        }
    }

    /// Mirror read failures onto the path's `error` channel
    pub(crate) fn with_error_sink(mut self, sink: Weak<EventSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Upper bound on bytes pulled per read
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn range(&self) -> Range<u64> {
        self.range.clone()
    }

    /// Number of bytes the range covers
    pub fn len(&self) -> u64 {
        self.range.end.saturating_sub(self.range.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> StreamStatus {
        match &self.inner {
            Inner::Pending => StreamStatus::Pending,
            Inner::Reading(_) => StreamStatus::Reading,
            Inner::Done(status) => *status,
        }
    }

    /// Pull the next chunk of text.
    ///
    /// Returns `None` once the range is exhausted or after an error has been
    /// returned. A file that ends before the range does completes early.
    pub async fn next_chunk(&mut self) -> Option<Result<String, WatchError>> {
        if matches!(self.inner, Inner::Pending) {
            if self.is_empty() {
                self.inner = Inner::Done(StreamStatus::Completed);
                return None;
            }

            let opened = open_at(&self.path, self.range.start).await;
            match opened {
                Ok(file) => self.inner = Inner::Reading(file.take(self.len())),
                Err(e) => return Some(Err(self.fail(e))),
            }
        }

        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let Inner::Reading(reader) = &mut self.inner else {
                return None;
            };

            let read = reader.read(&mut buf).await;
            match read {
                Ok(0) => {
                    self.inner = Inner::Done(StreamStatus::Completed);
                    debug!(path = %self.path.display(), "content stream ended");

                    if self.carry.is_empty() {
                        return None;
                    }
                    let tail = String::from_utf8_lossy(&self.carry).into_owned();
                    self.carry.clear();
                    return Some(Ok(tail));
                }
                Ok(n) => {
                    self.carry.extend_from_slice(&buf[..n]);
                    let text = decode_utf8(&mut self.carry);
                    // A lone partial character; keep reading
                    if !text.is_empty() {
                        return Some(Ok(text));
                    }
                }
                Err(e) => return Some(Err(self.fail(e))),
            }
        }
    }

    /// Drain the remaining range into one string
    pub async fn read_to_string(mut self) -> Result<String, WatchError> {
        let mut out = String::new();
        while let Some(chunk) = self.next_chunk().await {
            out.push_str(&chunk?);
        }
        Ok(out)
    }

    /// Adapt into a `futures::Stream` of text chunks
    pub fn into_stream(self) -> impl Stream<Item = Result<String, WatchError>> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            let item = stream.next_chunk().await?;
            Some((item, stream))
        })
    }

    fn fail(&mut self, source: io::Error) -> WatchError {
        self.inner = Inner::Done(StreamStatus::Errored);
        self.carry.clear();
        warn!(path = %self.path.display(), error = %source, "error reading new content");

        if let Some(sink) = self.error_sink.as_ref().and_then(Weak::upgrade) {
            let mirrored = WatchError::Read {
                path: self.path.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            };
            sink.emit(&self.path, Emission::Error(Arc::new(mirrored)));
        }

        WatchError::Read {
            path: self.path.clone(),
            source,
        }
    }
}

async fn open_at(path: &Path, offset: u64) -> io::Result<File> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    Ok(file)
}

/// Decode as much of `buf` as possible, leaving an incomplete trailing
/// character in place. Invalid sequences become U+FFFD.
fn decode_utf8(buf: &mut Vec<u8>) -> String {
    let mut out = String::new();

    loop {
        match std::str::from_utf8(buf) {
            Ok(s) => {
                out.push_str(s);
                buf.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&buf[..valid]));

                match e.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        buf.drain(..valid + bad);
                    }
                    None => {
                        buf.drain(..valid);
                        return out;
                    }
                }
            }
        }
    }
}
