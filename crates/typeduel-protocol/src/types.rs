//! Identity newtypes and the result rows embedded in outbound messages.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player (a registered user).
///
/// `#[serde(transparent)]` keeps the wire form a plain number, so
/// `PlayerId(42)` is just `42` in JSON, which is what clients expect in
/// `user_id` fields.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a lobby (one race or quiz game instance).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Result rows
// ---------------------------------------------------------------------------

/// One player's outcome for a single race round.
///
/// Players who never finished the round carry `None` for place, time and
/// wpm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub user_id: PlayerId,
    pub username: String,
    pub place: Option<u32>,
    pub time: Option<f64>,
    pub wpm: Option<u32>,
}

/// A player's running totals across the rounds played so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeStanding {
    pub user_id: PlayerId,
    pub username: String,
    /// 1-based rank by average wpm.
    pub rank: u32,
    pub rounds_finished: u32,
    /// Sum of reported finish times, in seconds.
    pub total_time: f64,
    /// Reported wpm summed and divided by `rounds_finished`, rounded.
    pub average_wpm: u32,
}

/// A player's quiz tally, reported after every question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
    pub user_id: PlayerId,
    pub username: String,
    pub score: u32,
}

/// A ranked row in the final quiz standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizStanding {
    pub user_id: PlayerId,
    pub username: String,
    pub score: u32,
    /// 1-based position in the standings.
    pub rank: u32,
}
