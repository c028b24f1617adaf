//! Consumer-facing audio stream handle

use crate::metrics::Counters;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use uuid::Uuid;

/// Identity of one exposed stream
///
/// Engine signals carry the id of the stream they refer to, so a late signal
/// from a stream that was already swapped out can be recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Boxed encoded-audio reader
pub type AudioReader = Box<dyn AsyncRead + Send + Unpin>;

/// Handle to a pipeline's encoded output
///
/// Cloning the handle is cheap and every clone refers to the same stream.
/// Exactly one consumer can take the reader.
#[derive(Clone)]
pub struct AudioStream {
    id: StreamId,
    reader: Arc<Mutex<Option<AudioReader>>>,
}

impl AudioStream {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            id: StreamId::new(),
            reader: Arc::new(Mutex::new(Some(Box::new(reader)))),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Take the reader; `None` if another consumer already has it
    pub fn take_reader(&self) -> Option<AudioReader> {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream").field("id", &self.id).finish()
    }
}

/// Which side of the pipeline a [`CountingReader`] measures
#[derive(Debug, Clone, Copy)]
pub(crate) enum Direction {
    Received,
    Sent,
}

/// Reader that adds every byte it yields to the pipeline counters
pub(crate) struct CountingReader<R> {
    inner: R,
    counters: Arc<Counters>,
    direction: Direction,
}

impl<R> CountingReader<R> {
    pub(crate) fn new(inner: R, counters: Arc<Counters>, direction: Direction) -> Self {
        Self {
            inner,
            counters,
            direction,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let n = (buf.filled().len() - before) as u64;
            let counter = match self.direction {
                Direction::Received => &self.counters.received,
                Direction::Sent => &self.counters.sent,
            };
            counter.fetch_add(n, Ordering::Relaxed);
        }
        poll
    }
}
