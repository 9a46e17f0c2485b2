//! The application: a root router, the app-wide middleware chain, and the
//! single boundary where failures become responses.
//!
//! # Dispatch
//!
//! ```text
//! Scope ─▶ handle ─▶ (not HTTP? stop, send nothing)
//!                 ─▶ Request::bounded
//!                 ─▶ dispatch ─▶ Router::lookup ─▶ (none? 404)
//!                             ─▶ bind path params
//!                             ─▶ MiddlewareStack::process(handler)
//!                             ─▶ Err / panic ─▶ JSON error response
//!                 ─▶ Response::send ─▶ FrameSink
//! ```
//!
//! Nothing below `dispatch` renders an error. Typed [`HttpError`]s keep their
//! status; everything else, panics included, becomes a `500`.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::Method;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::config::AppConfig;
use crate::error::{Error, HttpError};
use crate::gateway::{ChunkSource, FrameSink, Scope, ScopeKind};
use crate::handler::Handler;
use crate::middleware::{Middleware, MiddlewareStack};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The entry point handed to a gateway.
///
/// Registration methods consume and return `self`; once built, an `App` is
/// shared (`Arc<App>`) across every concurrent exchange.
///
/// ```rust
/// use strata::{App, Error, Request, Response, Router};
/// use strata::middleware::Timing;
///
/// async fn hello(_: Request) -> Result<Response, Error> {
///     Ok(Response::text("hello"))
/// }
///
/// let app = App::new()
///     .get("/", hello)
///     .include_router(Router::new("/api").get("/hello", hello), "")
///     .add_middleware(Timing);
/// ```
pub struct App {
    root: Router,
    middleware: MiddlewareStack,
    config: AppConfig,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self { root: Router::default(), middleware: MiddlewareStack::new(), config }
    }

    pub fn config(&self) -> &AppConfig { &self.config }

    /// The root router, for introspection.
    pub fn router(&self) -> &Router { &self.root }

    /// Registers `handler` on the root router for every method in `methods`.
    pub fn route(
        mut self,
        pattern: &str,
        methods: impl IntoIterator<Item = Method>,
        handler: impl Handler,
    ) -> Self {
        self.root = self.root.route(pattern, methods, handler);
        self
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(pattern, [Method::GET], handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(pattern, [Method::POST], handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(pattern, [Method::PUT], handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(pattern, [Method::PATCH], handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(pattern, [Method::DELETE], handler)
    }

    /// Mounts `router` under `prefix`. Its middleware joins the app chain
    /// after the units already added.
    ///
    /// Included routes join the table in call order: routes registered on the
    /// app before this call are matched first, and routes registered after it
    /// are shadowed by any included route with the same path and method.
    pub fn include_router(mut self, router: Router, prefix: &str) -> Self {
        let mut root = self.root.include(router, prefix);
        for unit in root.take_middleware() {
            self.middleware.push(unit);
        }
        self.root = root;
        self
    }

    /// Appends `unit` to the app-wide chain.
    pub fn add_middleware(mut self, unit: impl Middleware) -> Self {
        self.middleware.add(unit);
        self
    }

    /// Serves one exchange: reads from `source`, writes two frames to `sink`.
    ///
    /// Non-HTTP scopes are ignored and produce no frames. The only errors
    /// returned are gateway failures while sending.
    pub async fn handle<S>(&self, scope: Scope, source: impl ChunkSource, sink: &mut S) -> Result<(), Error>
    where
        S: FrameSink + ?Sized,
    {
        if scope.kind != ScopeKind::Http {
            debug!(kind = ?scope.kind, "ignoring non-HTTP scope");
            return Ok(());
        }
        let req = Request::bounded(scope, source, self.config.max_body_bytes);
        self.dispatch(req).await.send(sink).await
    }

    /// Routes `req`, runs the chain, and renders any failure. Never fails.
    pub async fn dispatch(&self, req: Request) -> Response {
        let method = req.method().to_owned();
        let path = req.path().to_owned();

        match AssertUnwindSafe(self.run(req)).catch_unwind().await {
            Ok(Ok(res)) => res,
            Ok(Err(Error::Http(e))) => {
                warn!(%method, %path, status = e.status(), detail = e.detail(), "request failed");
                let mut res = Response::json(json!({ "error": e.detail() }));
                res.set_status(e.status());
                res
            }
            Ok(Err(e)) => {
                error!(%method, %path, error = %e, "unhandled error");
                internal_error(e.detail())
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(%method, %path, panic = %detail, "handler panicked");
                internal_error(detail)
            }
        }
    }

    async fn run(&self, mut req: Request) -> Result<Response, Error> {
        let Some((handler, params)) = self.root.lookup(req.method(), req.path()) else {
            debug!(method = req.method(), path = req.path(), "no route");
            let detail = format!("No route found for {} {}", req.method(), req.path());
            return Err(HttpError::not_found(detail).into());
        };
        debug!(method = req.method(), path = req.path(), ?params, "route matched");
        req.set_path_params(params);
        self.middleware.process(req, handler).await
    }
}

impl Default for App {
    fn default() -> Self { Self::new() }
}

fn internal_error(detail: String) -> Response {
    let mut res = Response::json(json!({ "error": "Internal Server Error", "detail": detail }));
    res.set_status(500);
    res
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}
