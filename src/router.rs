//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware registered with
//! [`Router::layer`] wraps every request, matched or not.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler, not_found};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each call returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    chain: Arc<[BoxedMiddleware]>,
    fallback: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            chain: Arc::new([]),
            fallback: not_found.into_boxed_handler(),
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use bodytrace::{Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Appends a middleware. Layers run in the order they are added, before
    /// the handler.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        let layer: BoxedMiddleware = Arc::new(middleware);
        self.chain = self.chain.iter().cloned().chain(std::iter::once(layer)).collect();
        self
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// Runs a request through the middleware chain and the matched handler.
    ///
    /// A middleware failure becomes the response its [`Error`](crate::Error)
    /// maps to.
    pub(crate) async fn handle(&self, mut req: Request) -> Response {
        let endpoint = match self.lookup(&req.method, &req.path) {
            Some((handler, params)) => {
                req.params = params;
                handler
            }
            None => Arc::clone(&self.fallback),
        };

        Next::new(Arc::clone(&self.chain), endpoint)
            .run(req)
            .await
            .into_response()
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::error::{Error, SinkError};
    use crate::middleware::{TraceBody, TraceLine};

    async fn echo(mut req: Request) -> Result<Response, Error> {
        let text = req.body_mut().text().await?;
        Ok(Response::text(format!("{}:{text}", req.param("id").unwrap_or("-"))))
    }

    fn recording_app(lines: Arc<Mutex<Vec<String>>>) -> Router {
        let sink = move |line: &TraceLine| -> Result<(), SinkError> {
            lines.lock().unwrap().push(line.to_string());
            Ok(())
        };
        Router::new()
            .layer(TraceBody::with_sink(sink))
            .on(Method::POST, "/users/{id}", echo)
    }

    #[tokio::test]
    async fn traced_request_reaches_handler_with_full_body() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let app = recording_app(Arc::clone(&lines));

        let res = app.handle(Request::test(Method::POST, "/users/42", "hello")).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"42:hello");
        assert_eq!(*lines.lock().unwrap(), vec!["/users/42, POST, hello".to_owned()]);
    }

    #[tokio::test]
    async fn unmatched_requests_are_traced_then_404() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let app = recording_app(Arc::clone(&lines));

        let res = app.handle(Request::test(Method::GET, "/nowhere", "")).await;

        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(*lines.lock().unwrap(), vec!["/nowhere, GET, ".to_owned()]);
    }

    #[tokio::test]
    async fn undecodable_body_maps_to_bad_request() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let app = recording_app(Arc::clone(&lines));

        let res = app.handle(Request::test(Method::POST, "/users/1", b"\xC3\x28".to_vec())).await;

        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert!(lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn layers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (Arc::clone(&order), Arc::clone(&order));

        let app = Router::new()
            .layer(move |req: Request, next: Next| {
                first.lock().unwrap().push("first");
                next.run(req)
            })
            .layer(move |req: Request, next: Next| {
                second.lock().unwrap().push("second");
                next.run(req)
            })
            .on(Method::GET, "/", |_req: Request| async { "ok" });

        let res = app.handle(Request::test(Method::GET, "/", "")).await;

        assert_eq!(res.body(), b"ok");
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn rewind_without_replay_is_a_server_error() {
        let app = Router::new()
            .layer(|mut req: Request, next: Next| async move {
                req.body_mut().rewind()?;
                next.run(req).await
            })
            .on(Method::GET, "/", |_req: Request| async { "unreachable" });

        let res = app.handle(Request::test(Method::GET, "/", "")).await;

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
