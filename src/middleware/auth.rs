//! Predicate-gated access.

use std::future::Future;

use super::{Middleware, Next};
use crate::error::{Error, HttpError};
use crate::request::Request;

/// Builds a unit that fails with `401 Authentication required` unless
/// `check` resolves to `true`. The rest of the chain is skipped on failure.
///
/// `check` receives a clone of the request (clones share the body cache).
///
/// ```rust
/// use strata::{App, Request};
/// use strata::middleware::require_auth;
///
/// let app = App::new().add_middleware(require_auth(|req: Request| async move {
///     req.header("authorization").is_some_and(|v| v.starts_with("Bearer "))
/// }));
/// ```
pub fn require_auth<F, Fut>(check: F) -> impl Middleware
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    move |req: Request, next: Next| {
        let allowed = check(req.clone());
        async move {
            if !allowed.await {
                return Err(Error::from(HttpError::unauthorized("Authentication required")));
            }
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{request, run};

    fn bearer() -> impl Middleware {
        require_auth(|req: Request| async move { req.header("authorization").as_deref() == Some("Bearer ok") })
    }

    #[tokio::test]
    async fn rejects_when_check_fails() {
        let err = run(bearer(), request("GET", &[])).await.unwrap_err();
        let http = err.as_http().unwrap();
        assert_eq!(http.status(), 401);
        assert_eq!(http.detail(), "Authentication required");
    }

    #[tokio::test]
    async fn passes_when_check_succeeds() {
        let res = run(bearer(), request("GET", &[("authorization", "Bearer ok")])).await.unwrap();
        assert_eq!(res.status(), 200);
    }
}
