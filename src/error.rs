//! Unified error types.
//!
//! Two layers:
//!
//! - [`HttpError`] is a *typed* application failure: it carries the status
//!   code and the detail string that end up in the `{"error": ...}` body.
//! - [`Error`] is what handlers and middleware return. It wraps an
//!   `HttpError`, any other failure (`Unhandled`), or a gateway / IO problem.
//!
//! Neither is turned into a response where it is raised. Errors travel up the
//! middleware chain untouched and are translated exactly once, in
//! [`App::dispatch`](crate::App::dispatch).

use std::fmt;

/// A failure that maps directly onto an HTTP status code.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{status} {detail}")]
pub struct HttpError {
    status: u16,
    detail: String,
}

impl HttpError {
    /// Builds an error with an explicit detail. An empty detail falls back to
    /// the default for `status`.
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let detail = if detail.is_empty() { default_detail(status).to_owned() } else { detail };
        Self { status, detail }
    }

    /// Builds an error whose detail comes from the default table.
    pub fn from_status(status: u16) -> Self {
        Self::new(status, default_detail(status))
    }

    /// `400 Bad Request`.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, detail)
    }

    /// `401 Unauthorized`.
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(401, detail)
    }

    /// `403 Forbidden`.
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(403, detail)
    }

    /// `404 Not Found`.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, detail)
    }

    /// `413 Payload Too Large`.
    pub fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::new(413, detail)
    }

    /// `429 Too Many Requests`.
    pub fn too_many_requests(detail: impl Into<String>) -> Self {
        Self::new(429, detail)
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn detail(&self) -> &str { &self.detail }
}

/// Default detail for a status code when none was supplied.
pub fn default_detail(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _   => "Unknown Error",
    }
}

/// The error type returned by handlers, middleware and the gateway plumbing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Typed failure, rendered with its own status code.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Anything else. Rendered as `500` with the message as `detail`.
    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),

    /// The external gateway misbehaved (closed sink, broken body stream).
    #[error("gateway: {0}")]
    Gateway(String),

    /// Infrastructure failure: binding a port, accepting a connection.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// An unhandled failure carrying `message`.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::Unhandled(anyhow::Error::msg(message))
    }

    /// The typed part of this error, if it has one.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }

    /// The message placed in the `detail` field of a 500 response.
    pub(crate) fn detail(&self) -> String {
        match self {
            Self::Http(e) => e.detail().to_owned(),
            Self::Unhandled(e) => e.to_string(),
            Self::Gateway(m) => m.clone(),
            Self::Io(e) => e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Unhandled(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_details_cover_the_common_codes() {
        assert_eq!(HttpError::from_status(400).detail(), "Bad Request");
        assert_eq!(HttpError::from_status(401).detail(), "Unauthorized");
        assert_eq!(HttpError::from_status(403).detail(), "Forbidden");
        assert_eq!(HttpError::from_status(404).detail(), "Not Found");
        assert_eq!(HttpError::from_status(500).detail(), "Internal Server Error");
        assert_eq!(HttpError::from_status(418).detail(), "Unknown Error");
        assert_eq!(HttpError::from_status(418).status(), 418);
    }

    #[test]
    fn empty_detail_falls_back_to_default() {
        assert_eq!(HttpError::new(404, "").detail(), "Not Found");
        assert_eq!(HttpError::new(400, "").detail(), "Bad Request");
        assert_eq!(HttpError::new(499, "").detail(), "Unknown Error");
        assert_eq!(HttpError::new(404, "gone").detail(), "gone");
    }

    #[test]
    fn shortcuts_set_status() {
        assert_eq!(HttpError::not_found("gone").status(), 404);
        assert_eq!(HttpError::bad_request("no").status(), 400);
        assert_eq!(HttpError::unauthorized("who").status(), 401);
        assert_eq!(HttpError::too_many_requests("slow").status(), 429);
    }

    #[test]
    fn error_detail_uses_inner_message() {
        let e = Error::msg("Test error");
        assert_eq!(e.detail(), "Test error");
        assert!(e.as_http().is_none());

        let e: Error = HttpError::not_found("missing").into();
        assert_eq!(e.as_http().map(HttpError::status), Some(404));
        assert_eq!(e.detail(), "missing");
    }
}
