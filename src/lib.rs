//! # strata
//!
//! A minimal HTTP micro-framework: ordered routing, onion middleware, and a
//! request/response model over an abstract gateway.
//!
//! ## The pieces
//!
//! - **Routing**: an ordered table of compiled patterns (`/users/{id}`),
//!   first match wins. Routers nest; prefixes are resolved once, at
//!   registration.
//! - **Middleware**: units wrap the matched handler in onion order and may
//!   rewrite the request, rewrite the response, or answer on their own.
//!   CORS, logging, timing, security headers, rate limiting, an auth gate
//!   and generic hooks ship in [`middleware`].
//! - **Requests** read their body lazily from the gateway and cache the raw
//!   bytes and the parsed JSON / form values.
//! - **Failures** travel up as [`Error`] and are rendered once, at the
//!   [`App`] boundary, as `{"error": ...}` JSON.
//!
//! The framework never touches a socket itself. [`gateway`] defines the wire
//! boundary and [`Server`] is a hyper-backed gateway for real traffic.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use strata::middleware::{Cors, Logging};
//! use strata::{App, Error, HttpError, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let users = Router::new("/users")
//!         .get("/{id}", get_user)
//!         .post("", create_user);
//!
//!     let app = App::new()
//!         .include_router(users, "/api")
//!         .add_middleware(Logging)
//!         .add_middleware(Cors::default());
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     let id = req.path_param("id").unwrap_or_default();
//!     Ok(Response::json(json!({ "id": id, "name": "alice" })))
//! }
//!
//! async fn create_user(req: Request) -> Result<(u16, Response), Error> {
//!     let body = req.json().await?;
//!     let Some(name) = body.get("name").and_then(|n| n.as_str()) else {
//!         return Err(HttpError::bad_request("name is required").into());
//!     };
//!     Ok((201, Response::json(json!({ "id": 99, "name": name }))))
//! }
//! ```

mod app;
mod config;
mod error;
mod handler;
mod headers;
mod pattern;
mod request;
mod response;
mod router;
mod server;

pub mod gateway;
pub mod middleware;

pub use app::App;
pub use config::{AppConfig, DEFAULT_MAX_BODY_BYTES};
pub use error::{Error, HttpError, default_detail};
pub use handler::{BoxFuture, Handler};
#[doc(hidden)]
pub use handler::{BoxedHandler, ErasedHandler};
pub use headers::Headers;
pub use http::Method;
pub use middleware::{Middleware, MiddlewareStack, Next};
pub use request::{QueryMap, Request};
pub use response::{Content, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
