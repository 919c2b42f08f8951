//! Outgoing HTTP response type.
//!
//! One [`Response`] travels through the whole pipeline of a request. Before
//! middleware, the handler and after middleware may all adjust its status
//! and headers; a middleware that halts the chain writes the final body
//! itself. Whatever the path, exactly one head + body pair leaves the server.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::Serialize;

use crate::error::Error;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content-type values kiwi writes itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Json,  // application/json
    Text,  // text/plain; charset=utf-8
}

impl ContentType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response. Starts as `200 OK` with no headers and no body.
///
/// ```rust
/// use kiwi::{ContentType, Response};
/// use http::StatusCode;
///
/// let mut res = Response::new();
/// res.send(StatusCode::CREATED, ContentType::Text, "created");
/// assert_eq!(res.status(), StatusCode::CREATED);
/// assert_eq!(res.body(), b"created");
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Bytes,
    pub(crate) headers: HeaderMap,
    pub(crate) status: StatusCode,
}

impl Response {
    pub fn new() -> Self {
        Self { body: Bytes::new(), headers: HeaderMap::new(), status: StatusCode::OK }
    }

    /// A response carrying a fixed plain-text body.
    pub fn text(status: StatusCode, body: &'static str) -> Self {
        let mut res = Self::new();
        res.send(status, ContentType::Text, body);
        res
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Sets (replaces) a header.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Writes status, content type and body in one go.
    pub fn send(&mut self, status: StatusCode, content_type: ContentType, body: impl Into<Bytes>) {
        self.status = status;
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
        self.body = body.into();
    }

    /// Serializes `value` as the JSON body. The status is left untouched.
    pub fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(value)?;
        let status = self.status;
        self.send(status, ContentType::Json, bytes);
        Ok(())
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_as_empty_ok() {
        let res = Response::new();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.body().is_empty());
        assert!(res.headers().is_empty());
    }

    #[test]
    fn send_json_keeps_status_and_sets_content_type() {
        let mut res = Response::new();
        res.set_status(StatusCode::ACCEPTED);
        res.send_json(&serde_json::json!({ "count": 3 })).unwrap();

        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert_eq!(res.body(), br#"{"count":3}"#);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn into_inner_carries_head_and_body() {
        let mut res = Response::text(StatusCode::NOT_FOUND, "missing");
        res.set_header(HeaderName::from_static("x-trace"), HeaderValue::from_static("1"));
        let inner = res.into_inner();
        assert_eq!(inner.status(), StatusCode::NOT_FOUND);
        assert_eq!(inner.headers()["x-trace"], "1");
        assert_eq!(inner.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    }
}
