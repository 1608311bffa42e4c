//! # bodytrace
//!
//! Request-body tracing for Rust services behind a reverse proxy.
//!
//! ## The problem
//!
//! A request body is a stream that can be read once. Middleware that reads
//! it to log it leaves nothing for the handler. bodytrace makes the body
//! replayable for the duration of one request: the trace middleware reads it
//! fully, writes `<path>, <method>, <body text>` at TRACE level, rewinds it,
//! and the handler reads the very same bytes from the start.
//!
//! ## The contract
//!
//! nginx handles TLS, rate limiting, slow clients, and body-size limits.
//! bodytrace does not. The body is buffered in memory in full, so keep
//! `client_max_body_size` at a value you are happy to hold per request.
//!
//! - Replayable bodies: [`Body::enable_replay`], [`ReplayBuffer::rewind`]
//! - Strict text decoding: UTF-8, ASCII or Latin-1, never lossy
//! - Middleware chain: [`Router::layer`], [`middleware::Next`]
//! - Radix-tree routing: O(path-length) lookup via [`matchit`]
//! - Graceful shutdown: SIGTERM / Ctrl-C, drains in-flight requests
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use bodytrace::{Error, Method, Request, Response, Router, Server, middleware};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .layer(middleware::trace_body())
//!         .on(Method::POST, "/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! // The body arrives unread, even though the trace layer already logged it.
//! async fn create_user(mut req: Request) -> Result<Response, Error> {
//!     let body = req.body_mut().bytes().await?;
//!     Ok(Response::json(body))
//! }
//! ```

mod body;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use body::{Body, ReplayBuffer, TextEncoding};
pub use error::{BoxError, Error, SinkError};
pub use handler::Handler;
pub use http::{Method, StatusCode};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
