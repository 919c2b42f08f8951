//! Incoming HTTP request type.

use std::net::SocketAddr;

use http::request::Parts;
use http::{HeaderMap, Method, Uri};

/// The head of an incoming request.
///
/// The body is not kept here: the dispatcher drains it (for non-GET
/// requests) and hands the decoded value to the handler as an argument.
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    pub(crate) fn new(parts: Parts, remote_addr: Option<SocketAddr>) -> Self {
        Self { parts, params: Vec::new(), remote_addr }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// The URL path, without the query string.
    pub fn path(&self) -> &str { self.parts.uri.path() }

    /// The raw query string, if the URL carried one.
    pub fn query(&self) -> Option<&str> { self.parts.uri.query() }

    /// Case-insensitive header lookup. Returns `None` for absent headers and
    /// for values that are not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a raw (still percent-encoded) path placeholder value.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
