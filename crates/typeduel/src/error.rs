//! Unified error type for the typeduel server.

use typeduel_lobby::{LobbyError, StoreError};
use typeduel_protocol::ProtocolError;
use typeduel_session::SessionError;
use typeduel_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TypeduelError {
    /// A transport-level error (bind, handshake, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connect credential was rejected.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A lobby-level error (not found, full, actor gone).
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// The persistence backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
