//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! A route keeps one handler per HTTP method, and every handler is a
//! different concrete type. We hide them behind a trait object
//! (`dyn ErasedHandler`) so the routing table can store them uniformly:
//!
//! ```text
//! async fn hello(req: Request) -> Result<Response, Error> { … }   ← user writes this
//!        ↓ router.get("/", hello)
//! hello.into_boxed_handler()                                     ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                                     ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at dispatch time                            ← one vtable call
//!        ↓
//! Box::pin(async { hello(req).await.map(IntoResponse::into_response) })
//! ```
//!
//! Handlers return `Result`. An `Err` is not rendered here: it travels back
//! through the middleware chain and is converted once, at the app boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future.
///
/// `Send` lets tokio move it between worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Response, Error>>;
}

/// A type-erased handler shared across concurrent exchanges.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// You never implement this yourself. Any `async fn` (or closure returning a
/// future) with the shape
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, Error>
/// ```
///
/// satisfies it. The trait is sealed.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Response, Error>> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.map(IntoResponse::into_response) })
    }
}
