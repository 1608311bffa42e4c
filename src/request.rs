//! Incoming HTTP request type.

use std::collections::HashMap;

use http::{HeaderMap, Method};

use crate::body::Body;

/// An incoming HTTP request, built from hyper's request parts.
///
/// The body is owned by the request and can be read through
/// [`body_mut`](Request::body_mut). Middleware that reads it must make it
/// replayable and rewind it before passing the request on.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Body,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        path: String,
        headers: HeaderMap,
        body: Body,
        params: HashMap<String, String>,
    ) -> Self {
        Self { method, path, headers, body, params }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Body { &self.body }
    pub fn body_mut(&mut self) -> &mut Body { &mut self.body }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[cfg(test)]
impl Request {
    /// A request with no headers or path parameters.
    pub(crate) fn test(method: Method, path: &str, body: impl Into<Body>) -> Self {
        Self::new(method, path.to_owned(), HeaderMap::new(), body.into(), HashMap::new())
    }
}
