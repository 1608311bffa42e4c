//! Request-body trace middleware.
//!
//! Logs one line per request, `<path>, <method>, <body text>`, and leaves the
//! body exactly as it found it for the stages that run afterwards.
//!
//! # Lifecycle of one invocation
//!
//! ```text
//! Idle ──enable_replay + rewind──▶ Capturing ──read_all_text + emit──▶ Logged
//!                                                                        │
//!      Done ◀──next.run(req)── Forwarding ◀──────────rewind──────────────┘
//! ```
//!
//! - The read suspends while the client is still sending; the line is
//!   emitted only once the whole body decoded.
//! - A read or decode failure ends the invocation with `Err`: nothing is
//!   logged and the next stage never runs.
//! - A sink failure is only warned about. The body is rewound and the request
//!   forwarded regardless.
//!
//! Register it before anything else that reads the body:
//!
//! ```rust,no_run
//! use bodytrace::{Method, Request, Response, Router, middleware};
//!
//! # async fn create_user(_: Request) -> Response { Response::text("") }
//! let app = Router::new()
//!     .layer(middleware::trace_body())
//!     .on(Method::POST, "/users", create_user);
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::body::TextEncoding;
use crate::error::Error;
use crate::middleware::{LogSink, Middleware, MiddlewareFuture, Next, TracingSink};
use crate::request::Request;

/// Read chunk size used when none is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// How the body is read for the trace line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaptureConfig {
    pub encoding: TextEncoding,
    /// Maximum bytes pulled from the body per read. Zero is treated as one.
    pub buffer_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { encoding: TextEncoding::Utf8, buffer_size: DEFAULT_BUFFER_SIZE }
    }
}

/// One formatted trace record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceLine {
    path: String,
    method: String,
    body: String,
}

impl TraceLine {
    pub fn new(path: impl Into<String>, method: impl Into<String>, body: impl Into<String>) -> Self {
        Self { path: path.into(), method: method.into(), body: body.into() }
    }

    pub fn path(&self) -> &str { &self.path }
    pub fn method(&self) -> &str { &self.method }
    pub fn body(&self) -> &str { &self.body }
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.path, self.method, self.body)
    }
}

/// Reads the whole body of `req` and builds its trace line.
///
/// Makes the body replayable, decodes it with `config`, and returns with the
/// body position back at zero. The request is only borrowed.
///
/// # Errors
///
/// [`Error::Decoding`] or [`Error::Body`] if the body cannot be read as text.
pub async fn capture(req: &mut Request, config: &CaptureConfig) -> Result<TraceLine, Error> {
    let line = read_line(req, config).await?;
    req.body.rewind()?;
    Ok(line)
}

// Reads from the start of the body, whatever an earlier layer already read,
// and leaves it replayable and positioned at its end.
async fn read_line(req: &mut Request, config: &CaptureConfig) -> Result<TraceLine, Error> {
    let buf = req.body.enable_replay();
    buf.rewind();
    let text = buf.read_all_text(config.encoding, config.buffer_size).await?;
    Ok(TraceLine::new(req.path.as_str(), req.method.as_str(), text))
}

/// Middleware that logs path, method and body of every request.
///
/// Build it with [`trace_body()`] for the default [`TracingSink`], or
/// [`TraceBody::with_sink`] to send lines elsewhere.
#[derive(Debug)]
pub struct TraceBody<S = TracingSink> {
    sink: Arc<S>,
    config: CaptureConfig,
}

/// Body tracing to the `tracing` TRACE level, UTF-8, 1 KiB reads.
pub fn trace_body() -> TraceBody {
    TraceBody::with_sink(TracingSink)
}

impl<S: LogSink> TraceBody<S> {
    pub fn with_sink(sink: S) -> Self {
        Self { sink: Arc::new(sink), config: CaptureConfig::default() }
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn config(&self) -> &CaptureConfig { &self.config }
}

impl<S: LogSink> Middleware for TraceBody<S> {
    fn handle(&self, mut req: Request, next: Next) -> MiddlewareFuture {
        let sink = Arc::clone(&self.sink);
        let config = self.config;

        Box::pin(async move {
            let line = read_line(&mut req, &config).await?;

            if let Err(e) = sink.emit(&line) {
                warn!(error = %e, path = line.path(), "trace line dropped");
            }
            req.body.rewind()?;

            next.run(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use futures::stream;
    use http::{Method, StatusCode};
    use http_body::Frame;
    use http_body_util::StreamBody;

    use super::*;
    use crate::body::Body;
    use crate::error::{BoxError, SinkError};
    use crate::handler::Handler;
    use crate::response::{IntoResponse, Response};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl LogSink for Recorder {
        fn emit(&self, line: &TraceLine) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(line.to_string());
            Ok(())
        }
    }

    /// Runs `req` through `layer` into a handler that reads the body again
    /// and echoes it, reporting the position it found the body at.
    async fn run(layer: &TraceBody<impl LogSink>, req: Request) -> Result<Response, Error> {
        async fn echo(mut req: Request) -> Result<Response, Error> {
            let position = req.body().position();
            let bytes = req.body_mut().bytes().await?;
            Ok(Response::builder()
                .header("x-position", &format!("{position:?}"))
                .json(bytes))
        }
        let chain: Arc<[crate::middleware::BoxedMiddleware]> = Arc::new([]);
        layer.handle(req, Next::new(chain, echo.into_boxed_handler())).await
    }

    fn chunked(chunks: &[&'static [u8]]) -> Body {
        let frames = chunks
            .iter()
            .map(|&c| Ok::<_, BoxError>(Frame::data(Bytes::from_static(c))))
            .collect::<Vec<_>>();
        Body::new(StreamBody::new(stream::iter(frames)))
    }

    #[tokio::test]
    async fn trace_line_has_path_method_and_body() {
        let sink = Recorder::default();
        let layer = TraceBody::with_sink(sink.clone());

        let res = run(&layer, Request::test(Method::POST, "/foo", r#"{"a":1}"#)).await.unwrap();

        assert_eq!(sink.lines(), vec![r#"/foo, POST, {"a":1}"#.to_owned()]);
        assert_eq!(res.body(), br#"{"a":1}"#);
        assert_eq!(res.header("x-position"), Some("Some(0)"));
    }

    #[tokio::test]
    async fn downstream_sees_the_original_body_across_small_reads() {
        let sink = Recorder::default();
        let layer = TraceBody::with_sink(sink.clone()).buffer_size(3);
        let body = chunked(&[b"caf\xC3", b"\xA9 ", b"au lait"]);

        let res = run(&layer, Request::test(Method::PUT, "/orders/7", body)).await.unwrap();

        assert_eq!(sink.lines(), vec!["/orders/7, PUT, café au lait".to_owned()]);
        assert_eq!(res.body(), "café au lait".as_bytes());
        assert_eq!(res.header("x-position"), Some("Some(0)"));
    }

    #[tokio::test]
    async fn empty_body_yields_empty_segment() {
        let sink = Recorder::default();
        let layer = TraceBody::with_sink(sink.clone());

        let res = run(&layer, Request::test(Method::GET, "/health", Body::empty())).await.unwrap();

        assert_eq!(sink.lines(), vec!["/health, GET, ".to_owned()]);
        assert!(res.body().is_empty());
        assert_eq!(res.header("x-position"), Some("Some(0)"));
    }

    #[tokio::test]
    async fn undecodable_body_stops_before_next_stage() {
        let sink = Recorder::default();
        let layer = TraceBody::with_sink(sink.clone());
        let reached = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&reached);
        let handler = move |_req: Request| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { StatusCode::OK }
        };
        let chain: Arc<[crate::middleware::BoxedMiddleware]> = Arc::new([]);
        let req = Request::test(Method::POST, "/foo", b"\xFF\xFE".to_vec());

        let err = layer
            .handle(req, Next::new(chain, handler.into_boxed_handler()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Decoding { encoding: TextEncoding::Utf8, offset: 0 }));
        assert!(sink.lines().is_empty());
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_stream_stops_before_next_stage() {
        let sink = Recorder::default();
        let layer = TraceBody::with_sink(sink.clone());
        let reached = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&reached);
        let handler = move |_req: Request| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { StatusCode::OK }
        };
        let frames: Vec<Result<Frame<Bytes>, BoxError>> = vec![
            Ok(Frame::data(Bytes::from_static(b"{\"half\":"))),
            Err("connection reset by peer".into()),
        ];
        let body = Body::new(StreamBody::new(stream::iter(frames)));
        let chain: Arc<[crate::middleware::BoxedMiddleware]> = Arc::new([]);
        let req = Request::test(Method::POST, "/upload", body);

        let err = layer
            .handle(req, Next::new(chain, handler.into_boxed_handler()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Body(_)));
        assert_eq!(err.into_response().status_code(), StatusCode::BAD_REQUEST);
        assert!(sink.lines().is_empty());
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn earlier_partial_read_does_not_truncate_the_line() {
        let sink = Recorder::default();
        let layer = TraceBody::with_sink(sink.clone());
        let mut req = Request::test(Method::POST, "/x", "hello world");
        req.body_mut().enable_replay().read_chunk(3).await.unwrap();

        let res = run(&layer, req).await.unwrap();

        assert_eq!(sink.lines(), vec!["/x, POST, hello world".to_owned()]);
        assert_eq!(res.body(), b"hello world");
    }

    #[tokio::test]
    async fn configured_encoding_is_used() {
        let sink = Recorder::default();
        let layer = TraceBody::with_sink(sink.clone()).encoding(TextEncoding::Latin1);

        run(&layer, Request::test(Method::POST, "/l1", b"na\xEFve".to_vec())).await.unwrap();
        assert_eq!(sink.lines(), vec!["/l1, POST, naïve".to_owned()]);

        let ascii = TraceBody::with_sink(Recorder::default()).encoding(TextEncoding::Ascii);
        let err = run(&ascii, Request::test(Method::POST, "/a", b"na\xEFve".to_vec())).await.unwrap_err();
        assert!(matches!(err, Error::Decoding { encoding: TextEncoding::Ascii, offset: 2 }));
    }

    #[tokio::test]
    async fn sink_failure_still_forwards_a_rewound_body() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let layer = TraceBody::with_sink(move |_line: &TraceLine| -> Result<(), SinkError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SinkError::new("collector offline"))
        });

        let res = run(&layer, Request::test(Method::POST, "/foo", "still here")).await.unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(res.body(), b"still here");
        assert_eq!(res.header("x-position"), Some("Some(0)"));
    }

    #[tokio::test]
    async fn sequential_requests_do_not_leak() {
        let sink = Recorder::default();
        let layer = TraceBody::with_sink(sink.clone());

        let first = run(&layer, Request::test(Method::POST, "/a", "first body")).await.unwrap();
        let second = run(&layer, Request::test(Method::POST, "/b", "2nd")).await.unwrap();

        assert_eq!(sink.lines(), vec!["/a, POST, first body".to_owned(), "/b, POST, 2nd".to_owned()]);
        assert_eq!(first.body(), b"first body");
        assert_eq!(second.body(), b"2nd");
    }

    #[tokio::test]
    async fn cancelled_read_emits_nothing() {
        let sink = Recorder::default();
        let layer = TraceBody::with_sink(sink.clone());
        let stalled = Body::new(StreamBody::new(stream::pending::<Result<Frame<Bytes>, BoxError>>()));

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            run(&layer, Request::test(Method::POST, "/slow", stalled)),
        )
        .await;

        assert!(outcome.is_err());
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn capture_borrows_and_rewinds() {
        let mut req = Request::test(Method::PATCH, "/items/1", "[1,2,3]");

        let line = capture(&mut req, &CaptureConfig::default()).await.unwrap();

        assert_eq!(line.to_string(), "/items/1, PATCH, [1,2,3]");
        assert_eq!(req.body().position(), Some(0));
        assert_eq!(req.body_mut().bytes().await.unwrap(), "[1,2,3]");
    }

    #[test]
    fn defaults_match_trace_body() {
        let layer = trace_body();
        assert_eq!(layer.config(), &CaptureConfig::default());
        assert_eq!(layer.config().buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(layer.config().encoding, TextEncoding::Utf8);
    }
}
