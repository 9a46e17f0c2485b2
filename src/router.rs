//! Ordered, first-match-wins request router.
//!
//! Routes are scanned in registration order. The first route whose pattern
//! matches the path *and* that has a handler for the method wins. A route
//! that matches the path but not the method does not stop the scan, so
//! `GET /users` and a later `POST /users` coexist.
//!
//! Prefixes are applied when a route is registered or included, never at
//! lookup time: every stored route carries its fully resolved path.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::pattern::Pattern;

/// One entry in the routing table.
struct Route {
    path: String,
    pattern: Pattern,
    methods: HashMap<Method, BoxedHandler>,
}

/// A set of routes under a common prefix.
///
/// Build it at startup; registrations consume and return `self` so they
/// chain naturally.
///
/// ```rust
/// use strata::{Error, Method, Request, Response, Router};
///
/// # async fn list(_: Request) -> Result<Response, Error> { Ok(Response::text("")) }
/// # async fn show(_: Request) -> Result<Response, Error> { Ok(Response::text("")) }
/// let users = Router::new("/users")
///     .get("", list)
///     .route("/{id}", [Method::GET, Method::HEAD], show);
///
/// let api = Router::new("/api").include(users, "/v1");
/// assert_eq!(api.routes().next().map(|(path, _)| path), Some("/api/v1/users"));
/// ```
pub struct Router {
    prefix: String,
    routes: Vec<Route>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Router {
    /// A router whose routes all live under `prefix`.
    pub fn new(prefix: &str) -> Self {
        Self { prefix: normalize_prefix(prefix), routes: Vec::new(), middleware: Vec::new() }
    }

    pub fn prefix(&self) -> &str { &self.prefix }

    /// Registers `handler` for every method in `methods` on `pattern`.
    ///
    /// Path parameters use `{name}` syntax; `{name:type}` is accepted and the
    /// type ignored.
    ///
    /// # Panics
    ///
    /// Panics if the pattern repeats a capture name or has an empty one.
    pub fn route(
        mut self,
        pattern: &str,
        methods: impl IntoIterator<Item = Method>,
        handler: impl Handler,
    ) -> Self {
        let handler = handler.into_boxed_handler();
        let methods = methods.into_iter().map(|m| (m, Arc::clone(&handler))).collect();
        let path = resolve(&self.prefix, pattern);
        self.push(path, methods);
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

    /// Adds router-level middleware. It travels with the router when included.
    pub fn layer(mut self, unit: impl Middleware) -> Self {
        self.middleware.push(Arc::new(unit));
        self
    }

    /// Mounts `child` under `self.prefix + extra_prefix + child.prefix`.
    ///
    /// Child routes are re-resolved from their unprefixed suffix, so a child
    /// that already absorbed its own includes is not prefixed twice. Child
    /// middleware is appended to ours.
    pub fn include(mut self, child: Router, extra_prefix: &str) -> Self {
        let mount = format!("{}{}{}", self.prefix, normalize_prefix(extra_prefix), child.prefix);
        for route in child.routes {
            let suffix = route.path.strip_prefix(child.prefix.as_str()).unwrap_or(&route.path);
            let path = resolve(&mount, suffix);
            self.push(path, route.methods);
        }
        self.middleware.extend(child.middleware);
        self
    }

    /// Finds the handler for `method` + `path` and the captured parameters.
    ///
    /// `None` covers both "no route for this path" and "route exists but not
    /// for this method".
    pub(crate) fn lookup(
        &self,
        method: &str,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let method = Method::from_bytes(method.as_bytes()).ok()?;
        self.routes.iter().find_map(|route| {
            let handler = route.methods.get(&method)?;
            let params = route.pattern.matches(path)?;
            Some((Arc::clone(handler), params))
        })
    }

    /// `(resolved path, methods)` for every route, in match order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, Vec<&Method>)> {
        self.routes.iter().map(|r| (r.path.as_str(), r.methods.keys().collect()))
    }

    pub(crate) fn take_middleware(&mut self) -> Vec<Arc<dyn Middleware>> {
        std::mem::take(&mut self.middleware)
    }

    fn push(&mut self, path: String, methods: HashMap<Method, BoxedHandler>) {
        let pattern = Pattern::compile(&path)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.routes.push(Route { path, pattern, methods });
    }
}

impl Default for Router {
    fn default() -> Self { Self::new("") }
}

/// Empty stays empty; anything else gets exactly one leading `/` and no
/// trailing `/`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// `prefix + pattern` as a rooted path without a trailing slash.
fn resolve(prefix: &str, pattern: &str) -> String {
    let pattern = pattern.trim().trim_end_matches('/');
    let pattern = pattern.trim_start_matches('/');
    let path = if pattern.is_empty() {
        prefix.to_owned()
    } else {
        format!("{prefix}/{pattern}")
    };
    if path.is_empty() { "/".to_owned() } else { path }
}
