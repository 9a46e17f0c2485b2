//! Common security response headers.

use super::{Middleware, Next};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::headers::Headers;
use crate::request::Request;
use crate::response::Response;

const DEFAULTS: [(&str, &str); 4] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "1; mode=block"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
];

/// Sets a fixed header set on every response, overwriting whatever the
/// handler chose.
#[derive(Clone, Debug)]
pub struct SecurityHeaders {
    headers: Headers,
}

impl SecurityHeaders {
    /// The default set merged with `overrides`; an override with a default's
    /// name replaces it.
    pub fn new<K: AsRef<str>, V: Into<String>>(overrides: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut headers: Headers = DEFAULTS.into_iter().collect();
        headers.extend(overrides);
        Self { headers }
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::new(std::iter::empty::<(&str, &str)>())
    }
}

impl Middleware for SecurityHeaders {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(self.apply(req, next))
    }
}

impl SecurityHeaders {
    async fn apply(&self, req: Request, next: Next) -> Result<Response, Error> {
        let mut res = next.run(req).await?;
        res.headers_mut().extend(self.headers.iter());
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{request, run};

    #[tokio::test]
    async fn applies_defaults_and_overrides() {
        let unit = SecurityHeaders::new([
            ("Custom-Security-Header", "custom-value"),
            ("x-frame-options", "SAMEORIGIN"),
        ]);
        let res = run(unit, request("GET", &[])).await.unwrap();
        let h = res.headers();

        assert_eq!(h.get("X-Content-Type-Options"), Some("nosniff"));
        assert_eq!(h.get("X-Frame-Options"), Some("SAMEORIGIN"));
        assert_eq!(h.get("X-XSS-Protection"), Some("1; mode=block"));
        assert_eq!(h.get("Referrer-Policy"), Some("strict-origin-when-cross-origin"));
        assert_eq!(h.get("Custom-Security-Header"), Some("custom-value"));
    }

    #[tokio::test]
    async fn overwrites_handler_values() {
        let unit = |req: Request, next: Next| async move {
            let mut res = next.run(req).await?;
            res.headers_mut().insert("X-Frame-Options", "ALLOW");
            Ok::<_, Error>(res)
        };
        let mut stack = crate::middleware::MiddlewareStack::new();
        stack.add(SecurityHeaders::default());
        stack.add(unit);
        let res = stack.process(request("GET", &[]), crate::middleware::test_support::endpoint()).await.unwrap();
        assert_eq!(res.headers().get("x-frame-options"), Some("DENY"));
    }
}
