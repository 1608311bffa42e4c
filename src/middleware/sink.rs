//! Destinations for trace lines.

use tracing::trace;

use crate::error::SinkError;
use crate::middleware::TraceLine;

/// Accepts one trace line per request.
///
/// Fire-and-forget from the middleware's point of view: an `Err` is reported
/// with `tracing::warn!` and the request carries on. Closures of the shape
/// `Fn(&TraceLine) -> Result<(), SinkError>` are sinks too.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, line: &TraceLine) -> Result<(), SinkError>;
}

impl<F> LogSink for F
where
    F: Fn(&TraceLine) -> Result<(), SinkError> + Send + Sync + 'static,
{
    fn emit(&self, line: &TraceLine) -> Result<(), SinkError> {
        (self)(line)
    }
}

/// Writes each line as a `tracing` event at TRACE level.
///
/// Enable it with `RUST_LOG=bodytrace=trace`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, line: &TraceLine) -> Result<(), SinkError> {
        trace!("{line}");
        Ok(())
    }
}
