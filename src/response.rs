//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! The body is serialized the moment the response is built; what the
//! gateway receives later is exactly [`Response::body`]. The content variant
//! picks the default content-type:
//!
//! | Content | Body | Default content-type |
//! |---|---|---|
//! | bytes | verbatim | `application/octet-stream` |
//! | JSON value | serialized | `application/json` |
//! | text | UTF-8 | `text/plain` |
//!
//! The default is applied only if the caller did not set a content-type.

use std::fmt;

use bytes::Bytes;
use serde_json::Value;

use crate::error::Error;
use crate::gateway::{Frame, FrameSink};
use crate::headers::Headers;

// ── Content ───────────────────────────────────────────────────────────────────

/// What a response is built from.
#[derive(Clone, Debug)]
pub enum Content {
    Bytes(Bytes),
    Json(Value),
    Text(String),
}

impl Content {
    /// Text content from anything printable.
    pub fn display(value: impl fmt::Display) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Bytes> for Content {
    fn from(b: Bytes) -> Self { Self::Bytes(b) }
}

impl From<Vec<u8>> for Content {
    fn from(b: Vec<u8>) -> Self { Self::Bytes(b.into()) }
}

impl From<&'static [u8]> for Content {
    fn from(b: &'static [u8]) -> Self { Self::Bytes(Bytes::from_static(b)) }
}

impl From<Value> for Content {
    fn from(v: Value) -> Self { Self::Json(v) }
}

impl From<String> for Content {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use serde_json::json;
/// use strata::Response;
///
/// Response::new(json!({"id": 1}));
/// Response::text("hello");
/// Response::builder()
///     .status(201)
///     .header("location", "/users/42")
///     .body(json!({"id": 42}));
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Bytes,
    json: Option<Value>,
}

impl Response {
    /// `200 OK` built from `content`.
    pub fn new(content: impl Into<Content>) -> Self {
        Self::builder().body(content)
    }

    /// `200 OK`, `application/json`.
    pub fn json(value: Value) -> Self {
        Self::new(value)
    }

    /// `200 OK`, `text/plain`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(Content::Text(body.into()))
    }

    /// `200 OK`, `application/octet-stream`.
    pub fn bytes(body: impl Into<Bytes>) -> Self {
        Self::new(Content::Bytes(body.into()))
    }

    /// Response with no body and the given status.
    pub fn empty(status: u16) -> Self {
        Self { status, headers: Headers::new(), body: Bytes::new(), json: None }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Headers::new(), status: 200 }
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn set_status(&mut self, status: u16) { self.status = status; }
    pub fn headers(&self) -> &Headers { &self.headers }
    pub fn headers_mut(&mut self) -> &mut Headers { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// The body as JSON.
    ///
    /// Responses built from a JSON value return it without parsing. Otherwise
    /// the content-type must be JSON and the body is parsed on every call.
    pub fn json_value(&self) -> Result<Value, Error> {
        if let Some(value) = &self.json {
            return Ok(value.clone());
        }
        let is_json = self.headers.get("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
        if !is_json {
            return Err(Error::msg("Response content type is not JSON"));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Emits the start frame (status + headers), then the body frame.
    pub async fn send<S: FrameSink + ?Sized>(&self, sink: &mut S) -> Result<(), Error> {
        let headers = self.headers.iter()
            .map(|(k, v)| (Bytes::copy_from_slice(k.as_bytes()), Bytes::copy_from_slice(v.as_bytes())))
            .collect();
        sink.send(Frame::Start { status: self.status, headers }).await?;
        sink.send(Frame::Body { bytes: self.body.clone() }).await
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200`. Terminated by
/// [`body`](ResponseBuilder::body), which serializes the content.
pub struct ResponseBuilder {
    headers: Headers,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers<K: AsRef<str>, V: Into<String>>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Terminate with `content`, filling in the default content-type if unset.
    pub fn body(self, content: impl Into<Content>) -> Response {
        let Self { mut headers, status } = self;
        let (body, json, default_type) = match content.into() {
            Content::Bytes(b) => (b, None, "application/octet-stream"),
            Content::Json(v) => {
                let body = Bytes::from(v.to_string());
                (body, Some(v), "application/json")
            }
            Content::Text(s) => (Bytes::from(s), None, "text/plain"),
        };
        if !headers.contains("content-type") {
            headers.insert("content-type", default_type);
        }
        Response { status, headers, body, json }
    }

    /// Terminate with no body and no content-type.
    pub fn no_body(self) -> Response {
        Response { status: self.status, headers: self.headers, body: Bytes::new(), json: None }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for Value {
    fn into_response(self) -> Response { Response::json(self) }
}

impl IntoResponse for Vec<u8> {
    fn into_response(self) -> Response { Response::bytes(self) }
}

impl IntoResponse for Bytes {
    fn into_response(self) -> Response { Response::bytes(self) }
}

/// `(201, json!({...}))` from a handler.
impl<T: IntoResponse> IntoResponse for (u16, T) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        response.status = self.0;
        response
    }
}
