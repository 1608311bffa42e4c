//! Replay buffer: a rewindable view over a single-consumption body stream.
//!
//! # How replay works
//!
//! A request body arrives as a stream of frames that can be polled exactly
//! once. [`ReplayBuffer`] sits between that stream and its readers and keeps
//! every data byte it hands out:
//!
//! ```text
//!            position
//!               ↓
//! retained: [ a b c d e f ]  ← bytes already pulled from the stream
//! inner:                     [ g h i … ]  ← not polled yet
//! ```
//!
//! A read is served from `retained` while `position` is behind its end, and
//! from `inner` (appending to `retained`) once it catches up. [`rewind`]
//! moves `position` back to zero, so the next reader sees the whole body
//! again, same bytes, same length.
//!
//! Readers only ever borrow the buffer. Dropping a reader, or cancelling a
//! read future, never closes or moves the underlying stream.
//!
//! [`rewind`]: ReplayBuffer::rewind

use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;

use crate::body::decode::{Decoder, TextEncoding};
use crate::error::{BoxError, Error};

/// A body stream that remembers what it has read and can be rewound.
///
/// Rewinding is always legal on this type; a body that was never made
/// replayable is a plain [`Body`](crate::Body) and cannot be rewound.
pub struct ReplayBuffer {
    inner: UnsyncBoxBody<Bytes, BoxError>,
    retained: BytesMut,
    position: usize,
    eof: bool,
}

impl ReplayBuffer {
    pub(crate) fn new(inner: UnsyncBoxBody<Bytes, BoxError>) -> Self {
        Self { inner, retained: BytesMut::new(), position: 0, eof: false }
    }

    /// Current read position, in bytes from the start of the body.
    pub fn position(&self) -> usize { self.position }

    /// Number of body bytes pulled from the underlying stream so far.
    pub fn buffered(&self) -> usize { self.retained.len() }

    /// Moves the read position back to the start of the body.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Reads up to `max` bytes from the current position.
    ///
    /// Returns `None` at the end of the body. A `max` of zero is treated as one.
    pub async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>, Error> {
        let max = max.max(1);
        poll_fn(|cx| self.poll_chunk(cx, max)).await.transpose()
    }

    /// Reads from the current position to the end of the body.
    pub async fn read_to_end(&mut self) -> Result<Bytes, Error> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.read_chunk(usize::MAX).await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }

    /// Reads from the current position to the end of the body and decodes it
    /// as `encoding`, pulling at most `buffer_size` bytes per read.
    ///
    /// The position ends at the end of the body. The decoder state lives only
    /// for the duration of the call; the underlying stream stays open and
    /// owned by this buffer, ready for a [`rewind`](Self::rewind).
    ///
    /// # Errors
    ///
    /// [`Error::Decoding`] if the bytes are not valid `encoding`, with the
    /// offset counted from the start of the body, or
    /// [`Error::Body`] if the underlying stream fails.
    pub async fn read_all_text(
        &mut self,
        encoding: TextEncoding,
        buffer_size: usize,
    ) -> Result<String, Error> {
        let mut decoder = Decoder::starting_at(encoding, self.position);
        let mut text = String::new();
        while let Some(chunk) = self.read_chunk(buffer_size).await? {
            decoder.decode(&chunk, &mut text)?;
        }
        decoder.finish()?;
        Ok(text)
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>, max: usize) -> Poll<Option<Result<Bytes, Error>>> {
        if self.position < self.retained.len() {
            let end = self.retained.len().min(self.position.saturating_add(max));
            let chunk = Bytes::copy_from_slice(&self.retained[self.position..end]);
            self.position = end;
            return Poll::Ready(Some(Ok(chunk)));
        }

        while !self.eof {
            match ready!(Pin::new(&mut self.inner).poll_frame(cx)) {
                Some(Ok(frame)) => {
                    // Trailers carry no body bytes.
                    let Ok(data) = frame.into_data() else { continue };
                    if data.is_empty() {
                        continue;
                    }
                    self.retained.extend_from_slice(&data);
                    let take = data.len().min(max);
                    self.position += take;
                    return Poll::Ready(Some(Ok(data.slice(..take))));
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(Error::Body(e)))),
                None => self.eof = true,
            }
        }

        Poll::Ready(None)
    }
}

impl HttpBody for ReplayBuffer {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut()
            .poll_chunk(cx, usize::MAX)
            .map(|chunk| chunk.map(|res| res.map(Frame::data)))
    }

    fn is_end_stream(&self) -> bool {
        self.eof && self.position == self.retained.len()
    }

    fn size_hint(&self) -> SizeHint {
        let remaining = (self.retained.len() - self.position) as u64;
        if self.eof {
            return SizeHint::with_exact(remaining);
        }
        let inner = self.inner.size_hint();
        let mut hint = SizeHint::new();
        if let Some(upper) = inner.upper() {
            hint.set_upper(upper + remaining);
        }
        hint.set_lower(inner.lower() + remaining);
        hint
    }
}

impl std::fmt::Debug for ReplayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayBuffer")
            .field("position", &self.position)
            .field("buffered", &self.retained.len())
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}
