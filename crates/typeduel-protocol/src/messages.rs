//! The messages exchanged over a lobby connection.
//!
//! Every frame is a JSON object whose `type` field names the variant,
//! e.g. `{"type":"progress","chars":42,"wpm":61}`. Both directions are
//! closed enums: an inbound frame with an unknown `type` fails to decode
//! instead of being silently ignored, and every handler must match every
//! variant.

use serde::{Deserialize, Serialize};

use crate::{CumulativeStanding, PlayerId, QuizScore, QuizStanding, RaceResult};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// A message sent by a player to their lobby.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Sets the player's ready flag, or toggles it when `ready` is absent.
    Ready {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ready: Option<bool>,
    },

    /// Typing progress for the current race round.
    Progress { chars: u32, wpm: u32 },

    /// The player completed the passage.
    Finished { time: f64, wpm: u32, accuracy: f64 },

    /// A quiz answer naming one of the offered references.
    Answer {
        #[serde(rename = "ref")]
        reference: String,
    },

    /// Invites the lobby to a freshly created lobby.
    Rematch { join_code: String },

    /// Reply to a server [`ServerMessage::Ping`].
    Pong,
}

impl ClientMessage {
    /// The wire name of this message's `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Progress { .. } => "progress",
            Self::Finished { .. } => "finished",
            Self::Answer { .. } => "answer",
            Self::Rematch { .. } => "rematch",
            Self::Pong => "pong",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// A message pushed by the server to the players in a lobby.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    PlayerJoined {
        user_id: PlayerId,
        username: String,
    },
    PlayerLeft {
        user_id: PlayerId,
    },
    PlayerReady {
        user_id: PlayerId,
        ready: bool,
    },

    /// Seconds left before the round starts.
    Countdown {
        seconds: u32,
    },

    /// A race round begins. `start_time` is the server's round start in
    /// Unix milliseconds.
    RaceStart {
        verse_text: String,
        reference: String,
        start_time: u64,
        round: u32,
        total_rounds: u32,
    },

    /// Another player's progress, relayed as received.
    Progress {
        user_id: PlayerId,
        chars: u32,
        wpm: u32,
    },

    PlayerFinished {
        user_id: PlayerId,
        place: u32,
        time: f64,
        wpm: u32,
        accuracy: f64,
    },

    /// A race round finished and more rounds follow.
    RoundEnd {
        round: u32,
        total_rounds: u32,
        results: Vec<RaceResult>,
        cumulative: Vec<CumulativeStanding>,
    },

    /// The last race round finished.
    RaceEnd {
        results: Vec<RaceResult>,
        cumulative: Vec<CumulativeStanding>,
        total_rounds: u32,
    },

    /// A quiz question: which of `options` is `verse_text` from?
    Question {
        round: u32,
        total_rounds: u32,
        verse_text: String,
        options: Vec<String>,
    },

    PlayerLockedOut {
        user_id: PlayerId,
    },

    /// A quiz question was resolved. `winner_id` is `null` when every
    /// connected player answered wrong.
    RoundResult {
        round: u32,
        correct_ref: String,
        winner_id: Option<PlayerId>,
        scores: Vec<QuizScore>,
    },

    QuizEnd {
        results: Vec<QuizStanding>,
    },

    /// Relayed rematch invitation.
    Rematch {
        join_code: String,
        user_id: PlayerId,
    },

    /// Keepalive; clients answer with [`ClientMessage::Pong`].
    Ping,

    Error {
        detail: String,
    },
}

impl ServerMessage {
    /// Builds an [`Error`](Self::Error) message.
    pub fn error(detail: impl Into<String>) -> Self {
        Self::Error {
            detail: detail.into(),
        }
    }
}
