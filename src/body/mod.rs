//! Request body: single-consumption by default, replayable on request.
//!
//! A body starts out as a plain stream. Reading it consumes it: whoever reads
//! first gets the bytes, everyone after gets nothing. Middleware that needs to
//! look at the body *and* let the handler read it calls
//! [`Body::enable_replay`], which turns the body into a [`ReplayBuffer`] that
//! can be rewound to the start.
//!
//! ```text
//! Body::Once(stream) ──enable_replay()──▶ Body::Replay(ReplayBuffer)
//!        │                                      │
//!   read → consumed                       read → rewind → read again
//! ```

mod decode;
mod replay;

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};

use crate::error::{BoxError, Error};

pub use decode::TextEncoding;
pub(crate) use decode::Decoder;
pub use replay::ReplayBuffer;

/// The body of an incoming [`Request`](crate::Request).
pub struct Body {
    // Drained into `replay` once replay is enabled; empty from then on.
    stream: UnsyncBoxBody<Bytes, BoxError>,
    replay: Option<ReplayBuffer>,
}

impl Body {
    /// Wraps any `http_body::Body`, such as hyper's `Incoming`.
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self { stream: UnsyncBoxBody::new(body.map_err(Into::into)), replay: None }
    }

    pub fn empty() -> Self {
        Self::new(Empty::<Bytes>::new())
    }

    /// Makes the body rewindable. Idempotent: a body that is already
    /// replayable is returned as is, position untouched.
    pub fn enable_replay(&mut self) -> &mut ReplayBuffer {
        let stream = &mut self.stream;
        self.replay
            .get_or_insert_with(|| ReplayBuffer::new(std::mem::replace(stream, empty_stream())))
    }

    pub fn is_replayable(&self) -> bool {
        self.replay.is_some()
    }

    /// The replay position, or `None` if the body is not replayable.
    pub fn position(&self) -> Option<usize> {
        self.replay.as_ref().map(ReplayBuffer::position)
    }

    /// Moves the read position back to the start of the body.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if [`enable_replay`](Self::enable_replay) was
    /// never called on this body.
    pub fn rewind(&mut self) -> Result<(), Error> {
        let buf = self.replay.as_mut().ok_or(Error::InvalidState)?;
        buf.rewind();
        Ok(())
    }

    /// Reads the rest of the body.
    ///
    /// A plain body is consumed by this call; a second call returns empty
    /// bytes. A replayable body advances its position and can be rewound.
    pub async fn bytes(&mut self) -> Result<Bytes, Error> {
        match &mut self.replay {
            Some(buf) => buf.read_to_end().await,
            None => {
                let stream = std::mem::replace(&mut self.stream, empty_stream());
                let collected = stream.collect().await.map_err(Error::Body)?;
                Ok(collected.to_bytes())
            }
        }
    }

    /// Reads the rest of the body as strict UTF-8.
    pub async fn text(&mut self) -> Result<String, Error> {
        let start = self.position().unwrap_or(0);
        let bytes = self.bytes().await?;
        let mut decoder = Decoder::starting_at(TextEncoding::Utf8, start);
        let mut text = String::with_capacity(bytes.len());
        decoder.decode(&bytes, &mut text)?;
        decoder.finish()?;
        Ok(text)
    }
}

fn empty_stream() -> UnsyncBoxBody<Bytes, BoxError> {
    UnsyncBoxBody::new(Empty::<Bytes>::new().map_err(|never| match never {}))
}

impl Default for Body {
    fn default() -> Self { Self::empty() }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::new(Full::new(bytes))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match &mut this.replay {
            Some(buf) => Pin::new(buf).poll_frame(cx),
            None => Pin::new(&mut this.stream).poll_frame(cx).map_err(Error::Body),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.replay {
            Some(buf) => buf.is_end_stream(),
            None => self.stream.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.replay {
            Some(buf) => buf.size_hint(),
            None => self.stream.size_hint(),
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.replay {
            Some(buf) => f.debug_tuple("Body::Replay").field(buf).finish(),
            None => f.write_str("Body::Once(..)"),
        }
    }
}
