//! Error types for the lobby layer.

use typeduel_protocol::{LobbyId, PlayerId};

use crate::store::StoreError;

/// Errors that can occur during lobby operations.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The lobby does not exist.
    #[error("lobby {0} not found")]
    NotFound(LobbyId),

    /// No lobby uses this join code.
    #[error("no lobby with join code {0}")]
    UnknownJoinCode(String),

    /// The lobby already holds `max_players` members.
    #[error("lobby {0} is full")]
    LobbyFull(LobbyId),

    /// The player has no membership in this lobby.
    #[error("player {0} not in lobby {1}")]
    NotMember(PlayerId, LobbyId),

    /// The lobby's status does not allow this operation, e.g. joining a
    /// lobby whose race already started.
    #[error("invalid lobby state for this operation: {0}")]
    InvalidState(String),

    /// The lobby actor's command channel is full or closed.
    #[error("lobby {0} is unavailable")]
    Unavailable(LobbyId),

    /// Every generated join code collided with a listed lobby.
    #[error("could not allocate a free join code")]
    JoinCodeExhausted,

    #[error(transparent)]
    Store(#[from] StoreError),
}
