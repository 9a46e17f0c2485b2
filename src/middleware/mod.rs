//! Middleware layer.
//!
//! Middleware wraps the matched handler in onion order. For units `[A, B]`
//! registered in that order:
//!
//! ```text
//! A pre → B pre → handler → B post → A post
//! ```
//!
//! A unit receives the request and a [`Next`]. Calling [`Next::run`] runs
//! the rest of the chain and yields its result; a unit may change the request
//! first, change the response afterwards, or never call `run` at all and
//! answer (or fail) on its own.
//!
//! Any `async` closure `|req: Request, next: Next| async move { ... }`
//! returning `Result<Response, Error>` is a unit. The built-in ones live in
//! the submodules.

use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

mod auth;
mod cors;
mod hooks;
mod logging;
mod rate_limit;
mod security;
mod timing;

pub use auth::require_auth;
pub use cors::{Cors, CorsConfig};
pub use hooks::Hooks;
pub use logging::Logging;
pub use rate_limit::{RateLimit, RateLimitConfig};
pub use security::SecurityHeaders;
pub use timing::Timing;

/// One wrapping unit of the chain.
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response, Error>>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin((self)(req, next))
    }
}

/// The rest of the chain, from one unit's point of view.
pub struct Next {
    units: Arc<Vec<Arc<dyn Middleware>>>,
    index: usize,
    endpoint: BoxedHandler,
}

impl Next {
    /// Runs the next unit, or the handler once every unit has been entered.
    pub async fn run(self, req: Request) -> Result<Response, Error> {
        let Self { units, index, endpoint } = self;
        let unit = units.get(index).cloned();
        match unit {
            Some(unit) => {
                let next = Self { units, index: index + 1, endpoint };
                unit.handle(req, next).await
            }
            None => endpoint.call(req).await,
        }
    }
}

/// Ordered list of units wrapped around a terminal handler.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    units: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `unit`; the last one added sits closest to the handler.
    pub fn add(&mut self, unit: impl Middleware) {
        self.push(Arc::new(unit));
    }

    pub(crate) fn push(&mut self, unit: Arc<dyn Middleware>) {
        Arc::make_mut(&mut self.units).push(unit);
    }

    pub fn len(&self) -> usize { self.units.len() }
    pub fn is_empty(&self) -> bool { self.units.is_empty() }

    /// Runs `req` through every unit and finally `endpoint`.
    pub async fn process(&self, req: Request, endpoint: BoxedHandler) -> Result<Response, Error> {
        if self.units.is_empty() {
            return endpoint.call(req).await;
        }
        Next { units: Arc::clone(&self.units), index: 0, endpoint }.run(req).await
    }
}
