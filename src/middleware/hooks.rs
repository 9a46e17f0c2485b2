//! Before/after callbacks around the rest of the chain.

use std::future::Future;
use std::sync::Arc;

use super::{Middleware, Next};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

type BeforeHook = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;
type AfterHook = Arc<dyn Fn(Request, Response) -> BoxFuture<'static, Result<Response, Error>> + Send + Sync>;

/// Runs an optional `before` callback ahead of the chain and an optional
/// `after` callback on its response.
///
/// Either hook may fail, which aborts the exchange like any other unit
/// error. `after` sees a clone of the request as it entered this unit.
///
/// ```rust
/// use strata::middleware::Hooks;
/// use strata::{Error, Request, Response};
///
/// let hooks = Hooks::new()
///     .before(|req: Request| async move {
///         tracing::debug!(path = req.path(), "entering");
///         Ok(())
///     })
///     .after(|_req: Request, mut res: Response| async move {
///         res.headers_mut().insert("X-Hooked", "1");
///         Ok::<_, Error>(res)
///     });
/// ```
#[derive(Clone, Default)]
pub struct Hooks {
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.before = Some(Arc::new(move |req| Box::pin(hook(req))));
        self
    }

    pub fn after<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Error>> + Send + 'static,
    {
        self.after = Some(Arc::new(move |req, res| Box::pin(hook(req, res))));
        self
    }

    async fn wrap(&self, req: Request, next: Next) -> Result<Response, Error> {
        if let Some(before) = &self.before {
            before(req.clone()).await?;
        }
        let seen = self.after.as_ref().map(|_| req.clone());
        let res = next.run(req).await?;
        match (&self.after, seen) {
            (Some(after), Some(seen)) => after(seen, res).await,
            _ => Ok(res),
        }
    }
}

impl Middleware for Hooks {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(self.wrap(req, next))
    }
}
