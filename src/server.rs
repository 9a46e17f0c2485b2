//! hyper gateway and graceful shutdown.
//!
//! The server is one gateway among many: it turns each hyper request into a
//! [`Scope`] plus a [`ChunkSource`] over the streaming body, runs
//! [`App::handle`], and folds the two frames it gets back into a hyper
//! response. The framework core never depends on this module.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Stops calling `listener.accept()`; no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::Error;
use crate::gateway::{Chunk, ChunkSource, Frame, Scope, ScopeKind};
use crate::handler::BoxFuture;

/// The HTTP server.
pub struct Server {
    listener: std::net::TcpListener,
}

impl Server {
    /// Binds `addr` (`host:port`). Use port `0` for an ephemeral port and
    /// read it back with [`local_addr`](Server::local_addr).
    ///
    /// ```rust,no_run
    /// use strata::Server;
    /// let server = Server::bind("0.0.0.0:3000")?;
    /// # Ok::<(), strata::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves `app` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Serves `app` until `signal` resolves, then drains in-flight
    /// connections.
    pub async fn serve_with_shutdown(
        self,
        app: App,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::from_std(self.listener)?;
        let addr = listener.local_addr()?;
        let app = Arc::new(app);

        info!(%addr, "strata listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| exchange(Arc::clone(&app), req, peer));

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("strata stopped");
        Ok(())
    }
}

// ── Exchange adapter ──────────────────────────────────────────────────────────

/// Runs one hyper request through the app. Failures are already rendered by
/// the app, so hyper never sees an error.
async fn exchange(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let scope = Scope {
        kind: ScopeKind::Http,
        method: parts.method.as_str().to_owned(),
        path: parts.uri.path().to_owned(),
        raw_query: parts.uri.query()
            .map(|q| Bytes::copy_from_slice(q.as_bytes()))
            .unwrap_or_default(),
        headers: parts.headers.iter()
            .map(|(k, v)| (Bytes::copy_from_slice(k.as_str().as_bytes()), Bytes::copy_from_slice(v.as_bytes())))
            .collect(),
        client: Some(peer),
    };

    let mut frames = Vec::new();
    if let Err(e) = app.handle(scope, IncomingBody(body), &mut frames).await {
        error!(%peer, "exchange failed: {e}");
    }
    Ok(into_http(frames))
}

/// Streams a hyper body as gateway chunks. Trailers are skipped.
struct IncomingBody(Incoming);

impl ChunkSource for IncomingBody {
    fn receive(&mut self) -> BoxFuture<'_, Result<Chunk, Error>> {
        Box::pin(async move {
            while let Some(frame) = self.0.frame().await {
                let frame = frame.map_err(|e| Error::Gateway(e.to_string()))?;
                if let Ok(data) = frame.into_data() {
                    return Ok(Chunk::part(data));
                }
            }
            Ok(Chunk::default())
        })
    }
}

fn into_http(frames: Vec<Frame>) -> http::Response<Full<Bytes>> {
    let mut res = http::Response::new(Full::default());
    for frame in frames {
        match frame {
            Frame::Start { status, headers } => {
                *res.status_mut() = StatusCode::from_u16(status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                for (name, value) in headers {
                    match (HeaderName::from_bytes(&name), HeaderValue::from_maybe_shared(value)) {
                        (Ok(name), Ok(value)) => {
                            res.headers_mut().append(name, value);
                        }
                        _ => warn!(name = %String::from_utf8_lossy(&name), "dropping invalid response header"),
                    }
                }
            }
            Frame::Body { bytes } => *res.body_mut() = Full::new(bytes),
        }
    }
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT on Unix, Ctrl-C elsewhere. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_fold_into_hyper_response() {
        let frames = vec![
            Frame::Start {
                status: 201,
                headers: vec![
                    (Bytes::from_static(b"content-type"), Bytes::from_static(b"text/plain")),
                    (Bytes::from_static(b"bad header"), Bytes::from_static(b"x")),
                ],
            },
            Frame::Body { bytes: Bytes::from_static(b"made") },
        ];
        let res = into_http(frames);
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers().get("content-type").unwrap(), "text/plain");
        assert_eq!(res.headers().len(), 1);
    }

    #[test]
    fn bind_rejects_garbage() {
        assert!(matches!(Server::bind("not an address"), Err(Error::Io(_))));
    }
}
