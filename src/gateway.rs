//! The wire boundary.
//!
//! The framework never touches a socket. A gateway (the hyper adapter in
//! [`Server`](crate::Server), a test harness, anything else) hands the
//! [`App`](crate::App) one [`Scope`] per exchange plus a pull-based
//! [`ChunkSource`] for the body, and receives exactly two [`Frame`]s back
//! through a [`FrameSink`]:
//!
//! ```text
//! gateway ── Scope + ChunkSource ──▶ App::handle ── Frame::Start, Frame::Body ──▶ FrameSink
//! ```

use std::collections::VecDeque;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::handler::BoxFuture;

/// What kind of exchange the gateway is delivering.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScopeKind {
    Http,
    WebSocket,
    Lifespan,
}

/// Descriptor of one inbound exchange.
#[derive(Clone, Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub method: String,
    pub path: String,
    pub raw_query: Bytes,
    pub headers: Vec<(Bytes, Bytes)>,
    /// Transport-reported peer address, when the gateway knows it.
    pub client: Option<SocketAddr>,
}

impl Scope {
    /// An HTTP scope with no query, no headers and no peer address.
    pub fn http(method: &str, path: &str) -> Self {
        Self {
            kind: ScopeKind::Http,
            method: method.to_owned(),
            path: path.to_owned(),
            raw_query: Bytes::new(),
            headers: Vec::new(),
            client: None,
        }
    }

    pub fn with_query(mut self, raw_query: impl Into<Bytes>) -> Self {
        self.raw_query = raw_query.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((
            Bytes::copy_from_slice(name.as_bytes()),
            Bytes::copy_from_slice(value.as_bytes()),
        ));
        self
    }

    pub fn with_client(mut self, client: SocketAddr) -> Self {
        self.client = Some(client);
        self
    }
}

/// One piece of a request body.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Chunk {
    pub bytes: Bytes,
    /// `false` on the final chunk.
    pub more: bool,
}

impl Chunk {
    /// A chunk with more to follow.
    pub fn part(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into(), more: true }
    }

    /// The final chunk.
    pub fn last(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into(), more: false }
    }
}

/// Outbound message. `App::handle` emits `Start` then `Body`, nothing else.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Frame {
    Start { status: u16, headers: Vec<(Bytes, Bytes)> },
    Body { bytes: Bytes },
}

/// Pull side of the request body stream.
pub trait ChunkSource: Send + 'static {
    fn receive(&mut self) -> BoxFuture<'_, Result<Chunk, Error>>;
}

/// Push side of the response.
pub trait FrameSink: Send {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<(), Error>>;
}

/// In-memory body: pops queued chunks, then reports end-of-stream.
impl ChunkSource for VecDeque<Chunk> {
    fn receive(&mut self) -> BoxFuture<'_, Result<Chunk, Error>> {
        let chunk = self.pop_front().unwrap_or_default();
        Box::pin(async move { Ok(chunk) })
    }
}

/// Channel-fed body. A dropped sender ends the stream.
impl ChunkSource for mpsc::Receiver<Chunk> {
    fn receive(&mut self) -> BoxFuture<'_, Result<Chunk, Error>> {
        Box::pin(async move { Ok(self.recv().await.unwrap_or_default()) })
    }
}

/// Collects frames in memory.
impl FrameSink for Vec<Frame> {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<(), Error>> {
        self.push(frame);
        Box::pin(async { Ok(()) })
    }
}

impl FrameSink for mpsc::Sender<Frame> {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            mpsc::Sender::send(self, frame)
                .await
                .map_err(|_| Error::Gateway("frame sink closed".to_owned()))
        })
    }
}
