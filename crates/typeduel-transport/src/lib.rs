//! Transport layer for typeduel.
//!
//! A player's browser holds one WebSocket per lobby. This crate accepts
//! those sockets, remembers the handshake request (the lobby lives in the
//! path, the ticket in the query) and moves raw frames. It knows nothing
//! about lobbies or messages.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod close;
mod error;
mod request;
#[cfg(feature = "websocket")]
mod websocket;

pub use close::CloseReason;
pub use error::TransportError;
pub use request::ConnectRequest;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one accepted socket for its whole life.
///
/// A player who reconnects gets a new id, which is how a lobby tells a
/// stale disconnect apart from the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts incoming player sockets.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next socket and completes its handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// One accepted socket.
///
/// `send` and `recv` may run at the same time from different tasks: the
/// writer task drains the outbound queue while the handler waits on
/// [`recv`](Connection::recv).
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next data frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the socket.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Sends a close frame carrying `reason`'s code and text.
    async fn close_with(&self, reason: CloseReason) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// The handshake request that opened this socket.
    fn request(&self) -> &ConnectRequest;
}
