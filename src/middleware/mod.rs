//! Middleware layer.
//!
//! Middleware intercepts requests on their way to the handler and is the right
//! place for cross-cutting concerns. Layers run in the order they were added
//! with [`Router::layer`](crate::Router::layer); each receives the request and
//! a [`Next`] it calls exactly once to continue down the chain:
//!
//! ```text
//! dispatch ──▶ layer 0 ──▶ layer 1 ──▶ … ──▶ handler
//!          ◀── response ◀─────────────────────┘
//! ```
//!
//! A layer that fails returns `Err(Error)`; the pipeline turns it into a
//! response (see [`IntoResponse for Error`](crate::IntoResponse)) and the
//! handler never runs.
//!
//! Built-in middleware:
//! - [`trace_body`]: one TRACE line per request with path, method and body

mod sink;
mod trace_body;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;

pub use sink::{LogSink, TracingSink};
pub use trace_body::{CaptureConfig, DEFAULT_BUFFER_SIZE, TraceBody, TraceLine, capture, trace_body};

/// The future a [`Middleware`] returns.
pub type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, Error>> + Send + 'static>>;

/// A stage of the request pipeline.
///
/// Implemented automatically for closures and `async fn`s of the shape
/// `Fn(Request, Next) -> impl Future<Output = Result<Response, Error>>`.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> MiddlewareFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> MiddlewareFuture {
        Box::pin((self)(req, next))
    }
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The rest of the pipeline after the current middleware.
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    endpoint: BoxedHandler,
    index: usize,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { chain, endpoint, index: 0 }
    }

    /// Passes `req` to the next middleware, or to the handler at the end of
    /// the chain.
    pub fn run(self, req: Request) -> MiddlewareFuture {
        let Some(layer) = self.chain.get(self.index).map(Arc::clone) else {
            let fut = self.endpoint.call(req);
            return Box::pin(async move { Ok(fut.await) });
        };
        let next = Self { index: self.index + 1, ..self };
        layer.handle(req, next)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &(self.chain.len() - self.index))
            .finish_non_exhaustive()
    }
}
