//! Application close codes sent when the server ends a connection.

use std::fmt;

/// Why the server is closing a connection.
///
/// Refusals during connection establishment each get their own code so
/// clients can tell a stale ticket from a lobby that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Normal shutdown.
    Normal,
    /// The connect credential was missing, malformed or expired.
    InvalidCredential,
    /// The credential named a user that does not exist.
    UnknownUser,
    /// The requested lobby does not exist.
    UnknownLobby,
    /// The user is not a member of the requested lobby.
    NotMember,
    /// Nothing was received within the idle window.
    IdleTimeout,
    /// A newer connection for the same player took over.
    Replaced,
    /// The server hit an unexpected failure.
    Internal,
}

impl CloseReason {
    /// The numeric WebSocket close code.
    pub fn code(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::Internal => 1011,
            Self::InvalidCredential => 4001,
            Self::UnknownUser => 4002,
            Self::UnknownLobby => 4003,
            Self::NotMember => 4004,
            Self::IdleTimeout => 4008,
            Self::Replaced => 4009,
        }
    }

    /// Short human-readable reason carried in the close frame.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Normal => "bye",
            Self::Internal => "internal error",
            Self::InvalidCredential => "invalid credential",
            Self::UnknownUser => "unknown user",
            Self::UnknownLobby => "unknown lobby",
            Self::NotMember => "not a member of this lobby",
            Self::IdleTimeout => "idle timeout",
            Self::Replaced => "replaced by a newer connection",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason(), self.code())
    }
}
