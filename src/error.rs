//! Unified error type.

use thiserror::Error;

use crate::body::TextEncoding;

/// A boxed, thread-safe error coming from an underlying body stream.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by bodytrace's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures and body-capture failures. The pipeline turns the
/// latter into a response, see [`IntoResponse`](crate::IntoResponse).
#[derive(Debug, Error)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying request stream failed while it was being read.
    #[error("request body could not be read: {0}")]
    Body(#[source] BoxError),

    /// The body bytes are not valid under the configured text encoding.
    ///
    /// `offset` is the index of the first offending byte in the body.
    #[error("request body is not valid {encoding} at byte {offset}")]
    Decoding { encoding: TextEncoding, offset: usize },

    /// A rewind was attempted on a body that was never made replayable.
    #[error("cannot rewind a request body that was never made replayable")]
    InvalidState,
}

/// Returned by a [`LogSink`](crate::middleware::LogSink) that could not
/// accept a trace line.
///
/// Never aborts a request: the capture middleware reports it with
/// `tracing::warn!` and carries on.
#[derive(Debug, Error)]
#[error("log sink unavailable: {0}")]
pub struct SinkError(String);

impl SinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
